//! Error types, one enum per failure domain.
//!
//! [`WatchpostError`] is the top-level error. Every crate in the workspace
//! converts its own error into it so that callers can propagate with `?`.

use crate::types::{AlertStatus, IncidentStatus};

/// Watchpost top-level error
#[derive(Debug, thiserror::Error)]
pub enum WatchpostError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Input rejected locally before any request was issued
    #[error("validation error: {0}")]
    Validation(String),

    /// Datastore request failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The action needs an operator identity and none was supplied
    #[error("not authenticated: an operator identity is required")]
    NotAuthenticated,

    /// Lifecycle transition rejected
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// The inference endpoint did not return a usable result
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A config value is out of range or malformed
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Datastore errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// The datastore could not be reached
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request reached the datastore but was rejected
    #[error("query failed: {0}")]
    Query(String),

    /// No row with the given id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

/// Lifecycle state machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// Alert transition outside the allowed table
    #[error("alert transition {from} -> {to} is not allowed")]
    AlertTransition { from: AlertStatus, to: AlertStatus },

    /// Incident transition outside the allowed table
    #[error("incident transition {from} -> {to} is not allowed")]
    IncidentTransition {
        from: IncidentStatus,
        to: IncidentStatus,
    },
}
