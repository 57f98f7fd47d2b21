use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::claims::{try_parse_claims, Claims};
use crate::api::ApiError;

/// Credential file name in the agent home
pub const CREDENTIAL_FILE: &str = "auth.json";

/// A session credential as returned by the authenticate endpoint.
///
/// Fields other than `token` are kept verbatim so the persisted file holds
/// the full server response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            extra: Map::new(),
        }
    }

    /// Build from an authenticate response body, requiring a string `token`.
    pub fn from_response(body: Value) -> Result<Self, ApiError> {
        match body {
            Value::Object(mut fields) => match fields.remove("token") {
                Some(Value::String(token)) => Ok(Self {
                    token,
                    extra: fields,
                }),
                Some(_) => Err(ApiError::MalformedServerResponse(
                    "`token` field is not a string".to_string(),
                )),
                None => Err(ApiError::MalformedServerResponse(
                    "response has no `token` field".to_string(),
                )),
            },
            other => Err(ApiError::MalformedServerResponse(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn claims(&self) -> Option<Claims> {
        try_parse_claims(&self.token)
    }

    /// Shortened token for display; never print the full bearer string.
    pub fn token_preview(&self) -> String {
        let prefix: String = self.token.chars().take(20).collect();
        format!("{}...", prefix)
    }
}

/// Persistence for the most recent session credential.
///
/// `load` never fails: a missing, unreadable or corrupt credential is the
/// same as having none.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<Credential>;

    /// Overwrite any previously stored credential.
    fn save(&self, credential: &Credential) -> Result<(), ApiError>;

    /// Forget the stored credential. Not an error if there is none.
    fn clear(&self) -> Result<(), ApiError>;
}

/// Stores the credential as pretty-printed JSON in `auth.json`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIAL_FILE)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Credential> {
        let path = self.path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No readable credential file");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(credential) => Some(credential),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Ignoring unparseable credential file");
                None
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), ApiError> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(credential)
            .map_err(|e| ApiError::Storage(std::io::Error::other(e)))?;
        std::fs::write(&path, contents)?;
        debug!(path = %path.display(), "Saved credential");
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store, mainly for tests. Counts writes so callers can check
/// that a failed authentication left the store untouched.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
    writes: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `save` calls that have succeeded
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credential> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, credential: &Credential) -> Result<(), ApiError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
