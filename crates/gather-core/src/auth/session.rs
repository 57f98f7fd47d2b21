use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::challenge::ChallengeAuthenticator;
use super::claims::{TokenStatus, DEFAULT_REFRESH_MARGIN_SECS};
use super::credentials::{Credential, CredentialStore};
use super::keys::KeyStore;
use crate::api::ApiError;

/// Decides when the cached credential can be reused and renews it otherwise.
///
/// One manager is the only writer of the credential store within a process.
/// Nothing coordinates separate processes sharing the same store.
pub struct SessionManager {
    keys: Arc<dyn KeyStore>,
    credentials: Arc<dyn CredentialStore>,
    authenticator: ChallengeAuthenticator,
    refresh_margin_secs: i64,
}

impl SessionManager {
    pub fn new(
        keys: Arc<dyn KeyStore>,
        credentials: Arc<dyn CredentialStore>,
        authenticator: ChallengeAuthenticator,
    ) -> Self {
        Self {
            keys,
            credentials,
            authenticator,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
        }
    }

    /// Override the renewal margin. Negative values are treated as zero so
    /// an expired token is never reported valid.
    pub fn with_refresh_margin(mut self, secs: i64) -> Self {
        self.refresh_margin_secs = secs.max(0);
        self
    }

    pub fn refresh_margin_secs(&self) -> i64 {
        self.refresh_margin_secs
    }

    /// Return a token that stays valid past the refresh margin, running the
    /// challenge-response login when the cached one cannot be trusted.
    pub async fn get_valid_token(&self) -> Result<String, ApiError> {
        if let Some(cached) = self.credentials.load() {
            let status = TokenStatus::evaluate(&cached.token, now(), self.refresh_margin_secs);
            if status.is_valid() {
                debug!(token = %cached.token_preview(), "Reusing cached token");
                return Ok(cached.token);
            }
            debug!(?status, "Cached token needs refresh");
        } else {
            debug!("No cached credential");
        }

        Ok(self.refresh().await?.token)
    }

    /// Unconditionally authenticate and persist a new credential.
    pub async fn refresh(&self) -> Result<Credential, ApiError> {
        let keypair = self.keys.load_keypair()?;
        info!("Authenticating with challenge-response");
        self.authenticator.authenticate(&keypair).await
    }

    /// State of the cached credential, without touching the network.
    /// `None` when nothing usable is cached.
    pub fn status(&self) -> Option<TokenStatus> {
        self.credentials
            .load()
            .map(|cached| TokenStatus::evaluate(&cached.token, now(), self.refresh_margin_secs))
    }

    /// Drop the cached credential; the next call will re-authenticate.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.credentials.clear()?;
        info!("Cleared cached credential");
        Ok(())
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}
