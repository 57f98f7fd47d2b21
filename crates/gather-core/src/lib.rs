//! gather-core - identity and session layer for a gather.is agent.
//!
//! The agent proves possession of an Ed25519 key through a challenge-response
//! exchange, caches the resulting bearer token in `auth.json`, and renews it
//! shortly before it expires. `ApiClient` hides all of that behind a single
//! authenticated `request` call.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError};
pub use auth::{Credential, SessionManager, TokenStatus};
pub use config::Config;
