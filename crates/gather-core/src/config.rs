//! Agent configuration.
//!
//! Everything lives in the agent home directory (`~/.gather` unless
//! `GATHER_HOME` is set): the key files, the cached credential and an
//! optional `config.json`. `GATHER_BASE_URL` overrides the service URL.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::api::ApiError;
use crate::auth::DEFAULT_REFRESH_MARGIN_SECS;

/// Agent home directory name under the user's home
const APP_DIR: &str = ".gather";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Production service URL
pub const DEFAULT_BASE_URL: &str = "https://gather.is";

/// HTTP request timeout in seconds.
/// Bounds every call; the service itself never asks for longer.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on the renewal margin (one day)
pub const MAX_REFRESH_MARGIN_SECS: i64 = 86_400;

pub const HOME_ENV: &str = "GATHER_HOME";
pub const BASE_URL_ENV: &str = "GATHER_BASE_URL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub refresh_margin_secs: i64,
    #[serde(skip)]
    pub home: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            home: PathBuf::from(APP_DIR),
        }
    }
}

impl Config {
    /// Resolve the agent home from the environment, read its config file
    /// and apply environment overrides.
    pub fn load() -> Result<Self> {
        let home = match std::env::var_os(HOME_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => Self::default_home()?,
        };
        let mut config = Self::load_from(&home)?;
        config.apply_base_url_override(std::env::var(BASE_URL_ENV).ok());
        Ok(config)
    }

    /// Read `config.json` from `home`, falling back to defaults if absent.
    pub fn load_from(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE);
        let mut config: Self = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.home = home.to_path_buf();
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Reject settings that would break the session lifecycle: a negative
    /// margin would accept expired tokens, and a zero timeout fails every call.
    pub fn validate(&self) -> std::result::Result<(), ApiError> {
        if !(0..=MAX_REFRESH_MARGIN_SECS).contains(&self.refresh_margin_secs) {
            return Err(ApiError::Config(format!(
                "refresh_margin_secs must be between 0 and {}, got {}",
                MAX_REFRESH_MARGIN_SECS, self.refresh_margin_secs
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ApiError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply_base_url_override(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
    }

    pub fn default_home() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(APP_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.refresh_margin_secs, 120);
        assert_eq!(config.home, dir.path());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"base_url": "http://localhost:8080"}"#,
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.refresh_margin_secs, DEFAULT_REFRESH_MARGIN_SECS);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "not json").unwrap();
        assert!(Config::load_from(dir.path()).is_err());
    }

    #[test]
    fn test_out_of_range_margin_rejected() {
        for margin in ["9223372036854775807", "-1", "86401"] {
            let dir = tempdir().unwrap();
            std::fs::write(
                dir.path().join(CONFIG_FILE),
                format!(r#"{{"refresh_margin_secs": {}}}"#, margin),
            )
            .unwrap();

            let err = Config::load_from(dir.path()).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Config(_))),
                "margin {}: {:?}",
                margin,
                err
            );
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ApiError::Config(_))));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_base_url_override() {
        let mut config = Config::default();
        config.apply_base_url_override(Some("   ".to_string()));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);

        config.apply_base_url_override(Some(" http://127.0.0.1:3000 ".to_string()));
        assert_eq!(config.base_url, "http://127.0.0.1:3000");
    }
}
