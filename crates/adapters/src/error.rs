//! Adapter-level error type.

use thiserror::Error;

/// Errors returned by every capability call.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable`: the state is re-attempted with exponential back-off.
/// - `Fatal`    : the state fails immediately, no retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Transient failure (network, 5xx, throttling); worth trying again.
    #[error("retryable adapter error: {0}")]
    Retryable(String),

    /// Permanent failure (bad payload, missing parameter, 4xx contract error).
    #[error("fatal adapter error: {0}")]
    Fatal(String),
}

impl AdapterError {
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        // Builder errors mean a malformed request; retrying cannot help.
        if err.is_builder() {
            Self::Fatal(err.to_string())
        } else {
            Self::Retryable(err.to_string())
        }
    }
}
