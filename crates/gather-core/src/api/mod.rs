//! REST API client module for the gather.is service.
//!
//! This module provides the `ApiClient` for making authenticated calls to
//! any `/api/...` resource, and the `ApiError` taxonomy shared by the whole
//! crate.
//!
//! Every call asks the `SessionManager` for a valid bearer token first, so
//! callers never deal with authentication directly.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, RequestStage};
