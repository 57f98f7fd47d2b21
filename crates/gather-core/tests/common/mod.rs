#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use gather_core::auth::{
    ChallengeAuthenticator, CredentialStore, FileCredentialStore, KeyStore, MemoryKeyStore,
    SessionManager, SigningKeypair,
};
use rand::rngs::OsRng;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PUBLIC_PEM: &str =
    "-----BEGIN PUBLIC KEY-----\nMCowBQYDK2VwAyEAGb9ECWmEzf6FQbrBZ9w7lshQhqowtrbLDFw4rXAxZuE=\n-----END PUBLIC KEY-----";

pub const NONCE: &[u8] = b"challenge-nonce-0123456789";

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// A JWT-shaped token whose payload carries the given `exp`.
pub fn token_expiring_at(exp: i64) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(json!({"exp": exp, "sub": "agent"}).to_string()),
        URL_SAFE_NO_PAD.encode([7u8; 64])
    )
}

pub fn keypair() -> SigningKeypair {
    SigningKeypair::new(SigningKey::generate(&mut OsRng), PUBLIC_PEM)
}

pub fn session_for(
    server: &MockServer,
    home: &Path,
    keys: Arc<dyn KeyStore>,
) -> SessionManager {
    session_at(&server.uri(), home, keys)
}

pub fn session_at(base_url: &str, home: &Path, keys: Arc<dyn KeyStore>) -> SessionManager {
    let credentials: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(home));
    let authenticator =
        ChallengeAuthenticator::new(reqwest::Client::new(), base_url, Arc::clone(&credentials));
    SessionManager::new(keys, credentials, authenticator)
}

pub fn memory_keys(keypair: SigningKeypair) -> Arc<dyn KeyStore> {
    Arc::new(MemoryKeyStore::new(keypair))
}

/// Mount both login endpoints, expecting each to be hit `times` times.
pub async fn mount_login(server: &MockServer, issued_token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/agents/challenge"))
        .and(body_partial_json(json!({"public_key": PUBLIC_PEM})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"nonce": STANDARD.encode(NONCE)})),
        )
        .expect(times)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/agents/authenticate"))
        .and(body_partial_json(json!({"public_key": PUBLIC_PEM})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": issued_token,
            "agent_id": "agt_test"
        })))
        .expect(times)
        .mount(server)
        .await;
}

pub fn write_auth_file(home: &Path, contents: &str) {
    std::fs::write(home.join("auth.json"), contents).unwrap();
}

pub fn read_auth_file(home: &Path) -> Option<String> {
    std::fs::read_to_string(home.join("auth.json")).ok()
}

/// Serve a single connection that announces a 500-byte body, sends only
/// `partial_body` and hangs up. Returns the base URL.
pub fn serve_truncated_once(status_line: &str, partial_body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: 500\r\n\r\n{}",
        status_line, partial_body
    );
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        drain_request(&mut stream);
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        let _ = stream.shutdown(Shutdown::Both);
    });
    format!("http://{}", addr)
}

/// Read one request, headers and body, so closing the socket does not reset it.
fn drain_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// In-memory sink for formatted log output.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
