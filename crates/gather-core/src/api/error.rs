use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Key material unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Challenge request failed ({status}): {}", truncate_body(.body))]
    ChallengeRequestFailed { status: u16, body: String },

    #[error("Authentication rejected ({status}): {}", truncate_body(.body))]
    AuthenticationRejected { status: u16, body: String },

    #[error("Malformed server response: {0}")]
    MalformedServerResponse(String),

    #[error("API request failed ({status}): {}", truncate_body(.body))]
    ApiRequestFailed { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Failed to persist credential: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Which leg of the protocol a non-success response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Challenge,
    Authenticate,
    Api,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data.
/// The error variants keep the full body; only their rendering is cut.
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut cut = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
}

impl ApiError {
    pub fn from_status(stage: RequestStage, status: reqwest::StatusCode, body: &str) -> Self {
        let status = status.as_u16();
        let body = body.to_string();
        match stage {
            RequestStage::Challenge => ApiError::ChallengeRequestFailed { status, body },
            RequestStage::Authenticate => ApiError::AuthenticationRejected { status, body },
            RequestStage::Api => ApiError::ApiRequestFailed { status, body },
        }
    }

    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ChallengeRequestFailed { status, .. }
            | ApiError::AuthenticationRejected { status, .. }
            | ApiError::ApiRequestFailed { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
