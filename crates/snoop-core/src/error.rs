//! Error types for Snoop.
//!
//! A single error enum is shared by the registry, the heartbeat listener and
//! the client agent so every layer reports failures the same way.

use thiserror::Error;

/// Main error type for Snoop.
#[derive(Debug, Error)]
pub enum SnoopError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Channel errors
    #[error("Connection error for {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("Timed out after {timeout:?} talking to {endpoint}")]
    Timeout {
        endpoint: String,
        timeout: std::time::Duration,
    },

    // Payload errors
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Invalid descriptor field {field}: {message}")]
    InvalidDescriptor { field: String, message: String },

    // Query errors
    #[error("Service not found: {identity}")]
    NotFound { identity: String },

    #[error("Unexpected response from {endpoint}: HTTP {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Invalid URL {url}: {message}")]
    Url { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Snoop operations.
pub type Result<T> = std::result::Result<T, SnoopError>;

impl From<serde_json::Error> for SnoopError {
    fn from(err: serde_json::Error) -> Self {
        SnoopError::Decode {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SnoopError {
    /// Build a connection error for the given endpoint.
    pub fn connection(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SnoopError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        SnoopError::Config {
            message: message.into(),
        }
    }

    /// HTTP status code used when this error reaches the lookup API.
    pub fn status_code(&self) -> u16 {
        match self {
            SnoopError::NotFound { .. } => 404,

            SnoopError::Decode { .. }
            | SnoopError::InvalidDescriptor { .. }
            | SnoopError::Url { .. } => 400,

            SnoopError::Connection { .. }
            | SnoopError::Timeout { .. }
            | SnoopError::UnexpectedStatus { .. } => 502,

            _ => 500,
        }
    }

    /// Whether the failure is a channel problem that the next heartbeat may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SnoopError::Connection { .. } | SnoopError::Timeout { .. }
        )
    }
}
