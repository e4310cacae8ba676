//! Error types for the SKK server
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == SKK Error Enum ==
/// Unified error type for the SKK server.
#[derive(Error, Debug)]
pub enum SkkError {
    /// Socket or listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport or status failure talking to the conversion backend
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend did not answer within the configured bound
    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with nothing to convert
    #[error("Backend returned an empty body")]
    EmptyResponse,

    /// Request frame could not be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Lookup task failed unexpectedly
    #[error("Internal error: {0}")]
    Internal(String),

    /// Invalid startup configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// == Result Type Alias ==
/// Convenience Result type for the SKK server.
pub type Result<T> = std::result::Result<T, SkkError>;
