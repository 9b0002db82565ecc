//! Error types for the Legacy Linter backend.

use thiserror::Error;

/// Errors raised below the orchestrator boundary.
///
/// None of these ever reach an HTTP caller directly: the orchestrator turns
/// every variant into an `error` envelope, and the HTTP layer maps storage
/// failures to a 500 with a short `detail` string.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No API credential was configured
    #[error("API Key is not configured")]
    Configuration,

    /// Remote endpoint answered with a non-2xx status
    #[error("remote API error ({status}): {body}")]
    Transport { status: u16, body: String },

    /// Remote endpoint answered 2xx but the body lacked the expected field
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// Connection, timeout or body-read failure inside reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Model output could not be parsed as JSON
    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// SQLite failure
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Password hashing backend failure
    #[error("password hashing error: {0}")]
    PasswordHash(String),

    /// Model output parsed but did not match any known envelope
    #[error("unexpected model response: {0}")]
    UnexpectedResponse(String),
}

impl ServiceError {
    /// HTTP status of a remote failure, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Transport { status, .. } => Some(*status),
            ServiceError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Startup configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid ORCHESTRATOR_MODE '{0}' (expected 'direct' or 'classifying')")]
    InvalidMode(String),

    #[error("invalid BIND_ADDR '{0}'")]
    InvalidBindAddr(String),
}
