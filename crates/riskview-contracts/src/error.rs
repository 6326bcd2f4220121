//! Error types for the RiskView client engine.
//!
//! All fallible operations return `RiskViewResult<T>`. Recoverable errors are
//! contained at the query controller and preference store boundaries and
//! turned into state fields; nothing here is meant to cross an async boundary
//! uncaught.

use std::time::Duration;

use thiserror::Error;

/// The unified error type for the RiskView crates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskViewError {
    /// The network collaborator could not be reached or answered with a failure.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// A query key was rejected before dispatch (page out of range, empty id).
    ///
    /// No network call is made and the current state is left untouched.
    #[error("invalid query key: {reason}")]
    InvalidKey { reason: String },

    /// The preference value could not be written to or read from storage.
    ///
    /// Never fatal: the in-memory preference stays authoritative.
    #[error("preference persistence failed: {reason}")]
    Persistence { reason: String },

    /// A collaborator response did not match the expected payload shape.
    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },

    /// No response arrived within the configured fetch timeout.
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    /// User input failed a local check before submission.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the RiskView crates.
pub type RiskViewResult<T> = Result<T, RiskViewError>;
