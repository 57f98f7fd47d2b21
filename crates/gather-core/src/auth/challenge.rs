use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::credentials::{Credential, CredentialStore};
use super::keys::SigningKeypair;
use crate::api::client::read_error_body;
use crate::api::{ApiError, RequestStage};

/// Endpoint that issues a nonce for a public key
pub const CHALLENGE_PATH: &str = "/api/agents/challenge";

/// Endpoint that exchanges a signed nonce for a bearer token
pub const AUTHENTICATE_PATH: &str = "/api/agents/authenticate";

#[derive(Debug, Serialize)]
struct ChallengeRequest<'a> {
    public_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChallengeResponse {
    nonce: String,
}

#[derive(Debug, Serialize)]
struct AuthenticateRequest<'a> {
    public_key: &'a str,
    signature: String,
}

/// Runs the two-step challenge-response login.
///
/// Each `authenticate` call performs exactly one challenge and one signed
/// exchange. Nothing is retried.
pub struct ChallengeAuthenticator {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl ChallengeAuthenticator {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Prove possession of `keypair` and return a fresh credential.
    ///
    /// The credential is persisted before it is returned; on any failure
    /// the store is left untouched.
    pub async fn authenticate(&self, keypair: &SigningKeypair) -> Result<Credential, ApiError> {
        let nonce = self.request_challenge(keypair.public_key_pem()).await?;
        debug!(nonce_len = nonce.len(), "Received challenge nonce");

        let signature = STANDARD.encode(keypair.sign(&nonce).to_bytes());
        let credential = self
            .submit_signature(keypair.public_key_pem(), signature)
            .await?;

        self.credentials.save(&credential)?;
        info!(token = %credential.token_preview(), "Authenticated, session credential saved");
        Ok(credential)
    }

    async fn request_challenge(&self, public_key: &str) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}{}", self.base_url, CHALLENGE_PATH);
        let response = self
            .client
            .post(&url)
            .json(&ChallengeRequest { public_key })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            warn!(status = status.as_u16(), "Challenge request rejected");
            return Err(ApiError::from_status(RequestStage::Challenge, status, &body));
        }

        let challenge: ChallengeResponse = response.json().await.map_err(|e| {
            ApiError::MalformedServerResponse(format!("challenge response: {}", e))
        })?;

        STANDARD
            .decode(challenge.nonce.as_bytes())
            .map_err(|e| ApiError::MalformedServerResponse(format!("challenge nonce: {}", e)))
    }

    async fn submit_signature(
        &self,
        public_key: &str,
        signature: String,
    ) -> Result<Credential, ApiError> {
        let url = format!("{}{}", self.base_url, AUTHENTICATE_PATH);
        let response = self
            .client
            .post(&url)
            .json(&AuthenticateRequest {
                public_key,
                signature,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            warn!(status = status.as_u16(), "Authentication rejected");
            return Err(ApiError::from_status(RequestStage::Authenticate, status, &body));
        }

        let body: Value = response.json().await.map_err(|e| {
            ApiError::MalformedServerResponse(format!("authenticate response: {}", e))
        })?;
        Credential::from_response(body)
    }
}
