//! Error types for the Loki client.

use thiserror::Error;

/// Errors that can occur when talking to a Loki host.
#[derive(Debug, Error)]
pub enum LokiError {
    /// The client was configured with an unusable endpoint or header.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A query argument was rejected before any request was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Loki answered with a non-success status.
    #[error("Loki returned status {status}: {body}")]
    Response { status: u16, body: String },

    /// The response body was not the JSON we expected.
    #[error("Failed to decode Loki response: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl LokiError {
    /// HTTP status carried by a [`LokiError::Response`], if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = LokiError> = std::result::Result<T, E>;
