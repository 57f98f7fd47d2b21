//! Local inspection of bearer token claims.
//!
//! Tokens are `header.payload.signature` with base64url segments. Only the
//! payload is read, and only to learn when the token expires; the signature
//! is the server's business.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default safety margin before `exp` at which a token is renewed.
/// Covers clock skew and requests that are still in flight when the
/// token would otherwise expire.
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 120;

/// base64url decoder for the payload segment. Padding is optional and
/// non-zero trailing bits from other encoders are accepted.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry instant, seconds since the Unix epoch
    pub exp: Option<f64>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Decode the payload segment of `token`.
///
/// Returns `None` for anything that is not a decodable JSON object; callers
/// treat that as "cannot confirm validity" and re-authenticate.
pub fn try_parse_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let decoded = PAYLOAD_ENGINE.decode(payload).ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Outcome of checking a cached token against the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenStatus {
    /// Expires comfortably after the margin; safe to use.
    Valid { exp: f64 },
    /// Expired or inside the renewal margin.
    Stale { exp: f64 },
    /// Claims could not be decoded or carry no `exp`.
    Unverifiable,
}

impl TokenStatus {
    /// Pure decision: `exp > now + margin` is the only way to be valid.
    pub fn evaluate(token: &str, now: i64, margin_secs: i64) -> Self {
        let threshold = now.saturating_add(margin_secs) as f64;
        match try_parse_claims(token).and_then(|claims| claims.exp) {
            Some(exp) if exp > threshold => TokenStatus::Valid { exp },
            Some(exp) => TokenStatus::Stale { exp },
            None => TokenStatus::Unverifiable,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TokenStatus::Valid { .. })
    }

    pub fn expires_at(&self) -> Option<f64> {
        match self {
            TokenStatus::Valid { exp } | TokenStatus::Stale { exp } => Some(*exp),
            TokenStatus::Unverifiable => None,
        }
    }

    /// Whole seconds until `exp`, floored at zero (for display)
    pub fn seconds_until_expiry(&self, now: i64) -> Option<i64> {
        self.expires_at()
            .map(|exp| (exp - now as f64).floor() as i64)
            .map(|secs| secs.max(0))
    }
}
