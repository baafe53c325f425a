//! Error types for qagen.
//!
//! Three tiers of failure:
//! - Fatal: configuration and checkpoint/failure-log I/O
//! - Retryable: rate-limit signals from the backend (bounded backoff)
//! - Soft: any other backend error, absorbed as "no result" for that round

use thiserror::Error;

/// Top-level error type for qagen.
#[derive(Debug, Error)]
pub enum QagenError {
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Backend API error: {0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Chat-completion backend errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl QagenError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this is the distinguished rate-limit signal.
    ///
    /// Rate-limit errors are the only ones the caller retries; every other
    /// backend error is a soft failure for its round.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Result type alias for qagen.
pub type Result<T> = std::result::Result<T, QagenError>;
