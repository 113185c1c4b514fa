//! Error types for the observability core.
//!
//! The hot recording path is deliberately infallible; errors here cover
//! construction, configuration, and notification delivery.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the observability core.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// Notification sink configuration was malformed.
    #[error("invalid sink configuration: {0}")]
    InvalidSinkConfig(String),

    /// A notification sink failed to deliver.
    #[error("sink {sink} failed to deliver: {reason}")]
    SinkDelivery { sink: String, reason: String },

    /// A health check exceeded its execution budget.
    #[error("health check {name} timed out after {timeout_ms}ms")]
    CheckTimeout { name: String, timeout_ms: u64 },

    /// No alert with the given id is currently active.
    #[error("no active alert with id {0}")]
    AlertNotFound(Uuid),

    /// Logging subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for observability operations.
pub type Result<T> = std::result::Result<T, ObservabilityError>;
