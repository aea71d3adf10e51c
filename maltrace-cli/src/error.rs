//! CLI-specific error types and exit code mapping

use maltrace_batch::BatchError;
use maltrace_core::error::MaltraceError;
use maltrace_detectors::DetectorError;
use maltrace_evaluation::EvaluationError;
use maltrace_event_hunter::HuntError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The batch task ended in the `failed` state.
    #[error("batch failed: {0}")]
    Batch(String),

    /// The batch completed but some files could not be analysed.
    #[error("batch completed with {count} item error(s)")]
    ItemErrors { count: usize },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from maltrace-core.
    #[error("{0}")]
    Core(#[from] MaltraceError),

    /// Hunt rule loading error.
    #[error("rule error: {0}")]
    Rule(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                 |
    /// |------|-----------------------------------------|
    /// | 0    | Success                                 |
    /// | 1    | General / command error                 |
    /// | 2    | Configuration error                     |
    /// | 4    | Batch completed with per-file errors    |
    /// | 10   | IO error                                |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(MaltraceError::Config(_)) => 2,
            Self::ItemErrors { .. } => 4,
            Self::Io(_) | Self::Core(MaltraceError::Io(_)) => 10,
            Self::Command(_)
            | Self::Batch(_)
            | Self::JsonSerialize(_)
            | Self::Core(_)
            | Self::Rule(_) => 1,
        }
    }
}

impl From<HuntError> for CliError {
    fn from(e: HuntError) -> Self {
        match e {
            HuntError::Config { .. } => Self::Config(e.to_string()),
            _ => Self::Rule(e.to_string()),
        }
    }
}

impl From<DetectorError> for CliError {
    fn from(e: DetectorError) -> Self {
        match e {
            DetectorError::Config { .. } => Self::Config(e.to_string()),
            _ => Self::Core(e.into()),
        }
    }
}

impl From<BatchError> for CliError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::Config { .. } => Self::Config(e.to_string()),
            _ => Self::Core(e.into()),
        }
    }
}

impl From<EvaluationError> for CliError {
    fn from(e: EvaluationError) -> Self {
        Self::Core(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maltrace_core::error::ConfigError;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_core_config_error() {
        let err = CliError::Core(MaltraceError::Config(ConfigError::FileNotFound {
            path: "maltrace.toml".to_owned(),
        }));
        assert_eq!(err.exit_code(), 2, "core config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_item_errors() {
        let err = CliError::ItemErrors { count: 3 };
        assert_eq!(err.exit_code(), 4, "item errors should return exit code 4");
        assert_eq!(err.to_string(), "batch completed with 3 item error(s)");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_batch_failure() {
        let err = CliError::Batch("cancelled".to_owned());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "batch failed: cancelled");
    }

    #[test]
    fn test_exit_code_rule_error() {
        let err = CliError::Rule("no rules".to_owned());
        assert_eq!(err.exit_code(), 1, "rule error should return exit code 1");
    }

    #[test]
    fn test_from_hunt_config_error() {
        let err: CliError = HuntError::Config {
            field: "max_rules".to_owned(),
            reason: "must be 1-100000".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_from_hunt_load_error() {
        let err: CliError = HuntError::RuleLoad {
            path: "/missing".to_owned(),
            reason: "failed to read directory".to_owned(),
        }
        .into();
        assert!(matches!(err, CliError::Rule(_)));
    }

    #[test]
    fn test_from_batch_not_found() {
        let err: CliError = BatchError::TaskNotFound {
            task_id: "abc".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_from_evaluation_io_error() {
        let err: CliError = EvaluationError::Io {
            path: "labels.csv".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        }
        .into();
        assert_eq!(err.exit_code(), 10, "ground truth read failure is an io error");
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("execution failed".to_owned());
        assert_eq!(err.to_string(), "execution failed");
    }
}
