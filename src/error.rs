//! Error types for the toolkit

use std::time::Duration;
use thiserror::Error;

/// Fleetsmith result type
pub type Result<T> = std::result::Result<T, FleetError>;

/// Errors that can occur while driving the compute API
#[derive(Error, Debug)]
pub enum FleetError {
    /// Authentication kept failing and the task gave up
    #[error("authentication failed after {attempts} attempts: {message}")]
    Auth {
        /// Attempts made before giving up
        attempts: usize,
        /// Last error reported by the auth endpoint
        message: String,
    },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        message: String,
    },

    /// The server reached a terminal failed state while building
    #[error("server build failed: {0}")]
    BuildFailed(String),

    /// Bounded wait expired
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FleetError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an API error from a status code and body
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}
