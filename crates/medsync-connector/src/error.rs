//! Source adapter error types.
//!
//! Errors carry a transient/permanent classification so callers can
//! distinguish conditions worth retrying on a later pass from
//! configuration problems that need operator attention.

use thiserror::Error;

/// Error that can occur while talking to a source system.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Failed to establish a connection to the source system.
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// The source did not respond within the collection timeout.
    #[error("source timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The source system is temporarily unavailable.
    #[error("source unavailable: {message}")]
    Unavailable { message: String },

    /// Authentication with the source system failed.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// The adapter configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The source returned a payload the adapter could not interpret.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl ConnectorError {
    /// Create a connection failure error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(timeout_secs: u64) -> Self {
        Self::Timeout { timeout_secs }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Check whether this error is transient.
    ///
    /// Transient errors are expected to clear on a later pass without
    /// any configuration change.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed { .. }
                | ConnectorError::Timeout { .. }
                | ConnectorError::Unavailable { .. }
        )
    }
}

/// Result type for source adapter operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
