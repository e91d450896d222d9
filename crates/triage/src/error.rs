//! Triage error type
//!
//! [`TriageError`] covers every failure inside the triage crate.
//! `From<TriageError> for WatchpostError` lets callers propagate with `?`.

use watchpost_core::error::{ConfigError, LifecycleError, StorageError, WatchpostError};

/// Triage domain error
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// Input rejected before any request was issued
    #[error("validation error: {0}")]
    Validation(String),

    /// Datastore request failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An insert failed part-way through an upload.
    /// Files committed before the failure stay committed.
    #[error("upload aborted at '{file}' after {committed_files} committed file(s): {reason}")]
    UploadAborted {
        /// File whose insert failed
        file: String,
        /// Files committed before the failure
        committed_files: usize,
        reason: StorageError,
    },

    /// Transition outside the lifecycle table
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// The action needs an operator identity
    #[error("not authenticated: an operator identity is required")]
    NotAuthenticated,

    /// Inference endpoint failure (transport, status or body)
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    /// Rule file could not be loaded
    #[error("rule load error: {path}: {reason}")]
    RuleLoad { path: String, reason: String },

    /// Rule content is invalid
    #[error("rule validation error: rule '{rule}': {reason}")]
    RuleValidation { rule: String, reason: String },

    /// Configuration error
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TriageError> for WatchpostError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::Validation(msg) => WatchpostError::Validation(msg),
            TriageError::Storage(e) => WatchpostError::Storage(e),
            TriageError::UploadAborted { reason, .. } => WatchpostError::Storage(reason),
            TriageError::Lifecycle(e) => WatchpostError::Lifecycle(e),
            TriageError::NotAuthenticated => WatchpostError::NotAuthenticated,
            TriageError::AnalysisFailed(msg) => WatchpostError::Analysis(msg),
            TriageError::Io(e) => WatchpostError::Io(e),
            TriageError::Config { field, reason } => {
                WatchpostError::Config(ConfigError::InvalidValue { field, reason })
            }
            other @ (TriageError::RuleLoad { .. } | TriageError::RuleValidation { .. }) => {
                WatchpostError::Validation(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchpost_core::types::AlertStatus;

    #[test]
    fn upload_aborted_display() {
        let err = TriageError::UploadAborted {
            file: "auth.log".to_owned(),
            committed_files: 2,
            reason: StorageError::Connection("reset by peer".to_owned()),
        };
        let msg = err.to_string();
        assert!(msg.contains("auth.log"));
        assert!(msg.contains("2 committed"));
        assert!(msg.contains("reset by peer"));
    }

    #[test]
    fn converts_lifecycle_error() {
        let err: TriageError = LifecycleError::AlertTransition {
            from: AlertStatus::New,
            to: AlertStatus::Resolved,
        }
        .into();
        let top: WatchpostError = err.into();
        assert!(matches!(top, WatchpostError::Lifecycle(_)));
    }

    #[test]
    fn converts_not_authenticated() {
        let top: WatchpostError = TriageError::NotAuthenticated.into();
        assert!(matches!(top, WatchpostError::NotAuthenticated));
    }

    #[test]
    fn rule_errors_become_validation_errors() {
        let top: WatchpostError = TriageError::RuleValidation {
            rule: "ssh".to_owned(),
            reason: "invalid regex".to_owned(),
        }
        .into();
        assert!(matches!(top, WatchpostError::Validation(ref m) if m.contains("ssh")));
    }

    #[test]
    fn config_errors_keep_the_field() {
        let top: WatchpostError = TriageError::Config {
            field: "analysis.endpoint".to_owned(),
            reason: "no inference endpoint configured".to_owned(),
        }
        .into();
        assert!(matches!(
            top,
            WatchpostError::Config(ConfigError::InvalidValue { ref field, .. })
                if field == "analysis.endpoint"
        ));
    }
}
