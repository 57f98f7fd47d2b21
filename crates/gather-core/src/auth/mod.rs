//! Authentication module for the agent's identity and session.
//!
//! This module provides:
//! - `KeyStore`: Loads the Ed25519 signing keypair (`private.key`, `public.pem`)
//! - `CredentialStore`: Persists the last session credential (`auth.json`)
//! - `ChallengeAuthenticator`: Signs a server nonce to obtain a bearer token
//! - `SessionManager`: Reuses the cached token until 2 minutes before `exp`
//!
//! Storage is injected through traits so the lifecycle can run against
//! in-memory fakes.

pub mod challenge;
pub mod claims;
pub mod credentials;
pub mod keys;
pub mod session;

pub use challenge::ChallengeAuthenticator;
pub use claims::{try_parse_claims, Claims, TokenStatus, DEFAULT_REFRESH_MARGIN_SECS};
pub use credentials::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use keys::{FileKeyStore, KeyStore, MemoryKeyStore, SigningKeypair, PRIVATE_KEY_LEN};
pub use session::SessionManager;
