//! Error types for the courier crate.

use std::io;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during client construction or HTTP operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Timeout string rejected at construction time.
    #[error("invalid timeout {value:?}: {reason}")]
    InvalidTimeout { value: String, reason: String },

    /// Connection or request execution error from the underlying transport.
    #[error("connection error: {0}")]
    Connection(String),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Total request deadline exceeded.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// NTLM negotiation error (malformed challenge, protocol violation).
    #[error("NTLM negotiation error: {0}")]
    Ntlm(String),

    /// Request assembly error.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create an invalid-timeout configuration error.
    pub fn invalid_timeout(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTimeout {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an NTLM negotiation error.
    pub fn ntlm(message: impl Into<String>) -> Self {
        Self::Ntlm(message.into())
    }
}
