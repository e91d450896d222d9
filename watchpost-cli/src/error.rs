//! CLI error type and exit code mapping

use watchpost_core::error::WatchpostError;
use watchpost_triage::TriageError;

/// CLI-specific error type.
///
/// `exit_code()` maps each variant to a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error.
    #[error("{0}")]
    Core(#[from] WatchpostError),
}

impl From<TriageError> for CliError {
    fn from(e: TriageError) -> Self {
        Self::Core(e.into())
    }
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                 |
    /// |------|-----------------------------------------|
    /// | 0    | Success                                 |
    /// | 1    | General / command / storage error       |
    /// | 2    | Configuration error                     |
    /// | 3    | Operator identity required              |
    /// | 4    | Input rejected (validation, lifecycle)  |
    /// | 5    | Analysis endpoint failure               |
    /// | 10   | IO error                                |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Io(_) => 10,
            Self::Core(core) => match core {
                WatchpostError::Config(_) => 2,
                WatchpostError::NotAuthenticated => 3,
                WatchpostError::Validation(_) | WatchpostError::Lifecycle(_) => 4,
                WatchpostError::Analysis(_) => 5,
                WatchpostError::Io(_) => 10,
                WatchpostError::Storage(_) => 1,
            },
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchpost_core::error::{ConfigError, LifecycleError, StorageError};
    use watchpost_core::types::AlertStatus;

    #[test]
    fn test_exit_code_config_error() {
        assert_eq!(CliError::Config("bad".to_owned()).exit_code(), 2);
        let core = WatchpostError::Config(ConfigError::FileNotFound {
            path: "watchpost.toml".to_owned(),
        });
        assert_eq!(CliError::Core(core).exit_code(), 2);
    }

    #[test]
    fn test_exit_code_not_authenticated() {
        let err: CliError = TriageError::NotAuthenticated.into();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_rejected_input() {
        let validation: CliError = TriageError::Validation("empty title".to_owned()).into();
        assert_eq!(validation.exit_code(), 4);

        let lifecycle: CliError = TriageError::Lifecycle(LifecycleError::AlertTransition {
            from: AlertStatus::New,
            to: AlertStatus::Resolved,
        })
        .into();
        assert_eq!(lifecycle.exit_code(), 4);
    }

    #[test]
    fn test_exit_code_analysis_failure() {
        let err: CliError = TriageError::AnalysisFailed("endpoint returned 502".to_owned()).into();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_exit_code_storage_error() {
        let err: CliError = TriageError::Storage(StorageError::Connection("down".to_owned())).into();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert_eq!(CliError::Io(io_err).exit_code(), 10);
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("execution failed".to_owned());
        assert_eq!(err.to_string(), "execution failed");
    }

    #[test]
    fn test_upload_abort_maps_to_storage() {
        let err: CliError = TriageError::UploadAborted {
            file: "b.log".to_owned(),
            committed_files: 1,
            reason: StorageError::Connection("reset".to_owned()),
        }
        .into();
        assert!(matches!(err, CliError::Core(WatchpostError::Storage(_))));
    }
}
