use std::fmt;
use std::path::{Path, PathBuf};

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use tracing::debug;

use crate::api::ApiError;

/// Private key file name in the agent home
pub const PRIVATE_KEY_FILE: &str = "private.key";

/// Public key file name in the agent home
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// Number of leading bytes of `private.key` that hold the Ed25519 seed.
/// Anything after this is ignored so keys stored in an extended layout
/// (seed followed by public key) still load.
pub const PRIVATE_KEY_LEN: usize = ed25519_dalek::SECRET_KEY_LENGTH;

/// The agent's long-lived signing identity.
///
/// The public key is kept in the exact text form it was provisioned with,
/// because the service binds sessions to that string.
#[derive(Clone)]
pub struct SigningKeypair {
    signing_key: SigningKey,
    public_key_pem: String,
}

impl SigningKeypair {
    pub fn new(signing_key: SigningKey, public_key_pem: impl Into<String>) -> Self {
        Self {
            signing_key,
            public_key_pem: public_key_pem.into(),
        }
    }

    /// Build a keypair from on-disk material: raw private key bytes and
    /// the public key text.
    pub fn from_key_material(private_key: &[u8], public_key_pem: &str) -> Result<Self, ApiError> {
        let seed: [u8; PRIVATE_KEY_LEN] = private_key
            .get(..PRIVATE_KEY_LEN)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| {
                ApiError::KeyUnavailable(format!(
                    "private key must be at least {} bytes, found {}",
                    PRIVATE_KEY_LEN,
                    private_key.len()
                ))
            })?;

        let public_key_pem = public_key_pem.trim();
        if public_key_pem.is_empty() {
            return Err(ApiError::KeyUnavailable("public key is empty".to_string()));
        }

        Ok(Self::new(SigningKey::from_bytes(&seed), public_key_pem))
    }

    /// Public key text exactly as presented to the service.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("signing_key", &"<redacted>")
            .field("public_key_pem", &self.public_key_pem)
            .finish()
    }
}

/// Source of the agent's signing keypair.
pub trait KeyStore: Send + Sync {
    /// Load the keypair. Called once per authentication attempt.
    fn load_keypair(&self) -> Result<SigningKeypair, ApiError>;
}

/// Reads `private.key` and `public.pem` from a directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }

    fn unavailable(path: &Path, err: std::io::Error) -> ApiError {
        ApiError::KeyUnavailable(format!("{}: {}", path.display(), err))
    }
}

impl KeyStore for FileKeyStore {
    fn load_keypair(&self) -> Result<SigningKeypair, ApiError> {
        let private_path = self.private_key_path();
        let private_key =
            std::fs::read(&private_path).map_err(|e| Self::unavailable(&private_path, e))?;

        let public_path = self.public_key_path();
        let public_key_pem =
            std::fs::read_to_string(&public_path).map_err(|e| Self::unavailable(&public_path, e))?;

        debug!(dir = %self.dir.display(), "Loaded signing keypair");
        SigningKeypair::from_key_material(&private_key, &public_key_pem)
    }
}

/// Holds a keypair in memory (for tests and embedding hosts that manage
/// their own key storage).
#[derive(Debug, Clone)]
pub struct MemoryKeyStore {
    keypair: SigningKeypair,
}

impl MemoryKeyStore {
    pub fn new(keypair: SigningKeypair) -> Self {
        Self { keypair }
    }
}

impl KeyStore for MemoryKeyStore {
    fn load_keypair(&self) -> Result<SigningKeypair, ApiError> {
        Ok(self.keypair.clone())
    }
}
