//! API client for authenticated calls to the gather.is REST API.
//!
//! This module provides the `ApiClient` struct: it wires the file-backed
//! key and credential stores to a `SessionManager` and attaches the
//! resulting bearer token to every request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::auth::{
    ChallengeAuthenticator, CredentialStore, FileCredentialStore, FileKeyStore, SessionManager,
};
use crate::config::Config;

use super::error::truncate_body;
use super::{ApiError, RequestStage};

/// API client for gather.is.
/// Clone is cheap - reqwest::Client and the session are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Create a client backed by the key and credential files in the
    /// configured agent home.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let credentials: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(&config.home));
        let authenticator = ChallengeAuthenticator::new(
            client.clone(),
            config.base_url.as_str(),
            Arc::clone(&credentials),
        );
        let session = SessionManager::new(
            Arc::new(FileKeyStore::new(&config.home)),
            credentials,
            authenticator,
        )
        .with_refresh_margin(config.refresh_margin_secs);

        Ok(Self::with_session(client, &config.base_url, Arc::new(session)))
    }

    /// Create a client around an existing session, sharing the connection pool.
    pub fn with_session(client: Client, base_url: &str, session: Arc<SessionManager>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Perform an authenticated request and return the parsed JSON body.
    ///
    /// GET never sends a body. PUT sends `{}` when no body is given.
    /// A non-success status is logged with its body and returned as
    /// `ApiError::ApiRequestFailed`; nothing is retried.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let token = self.session.get_valid_token().await?;
        let url = format!("{}{}", self.base_url, path);

        let empty = json!({});
        let payload = if method == Method::GET {
            None
        } else if method == Method::PUT {
            Some(body.unwrap_or(&empty))
        } else {
            body
        };

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        debug!(%method, url = %url, "Sending API request");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            error!(status = status.as_u16(), "ERROR {}: {}", status.as_u16(), truncate_body(&body));
            return Err(ApiError::from_status(RequestStage::Api, status, &body));
        }

        // a body that fails mid-read is a failed call, not an empty result
        let text = response.text().await?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            ApiError::MalformedServerResponse(format!("{} {}: {}", method, path, e))
        })
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, &[], body).await
    }
}

/// Body of a rejected response, for diagnostics. A body that cannot be
/// read is reported as such rather than as an empty string.
pub(crate) async fn read_error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e))
}
