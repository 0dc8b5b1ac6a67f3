//! Unified error types for the playbook crate.
//!
//! Store mutations never fail: unknown ids are skipped, not reported as
//! errors. The variants here cover the infrastructure around the store
//! (snapshot files, configuration, collaborator calls) and the stage
//! boundary where collaborator output is validated.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for playbook operations.
#[derive(Error, Debug)]
pub enum PlaybookError {
    /// I/O errors from history or snapshot file operations.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// The reasoning collaborator failed to produce a response.
    #[error("collaborator error: {message}")]
    Collaborator { message: String },

    /// A stage result did not match its expected schema.
    #[error("schema violation in {stage} output: {message}")]
    Schema { stage: String, message: String },

    /// Required cycle state was absent when a stage needed it.
    #[error("missing state: {what}")]
    MissingState { what: String },

    /// History not found in storage.
    #[error("history not found: {history_id}")]
    HistoryNotFound { history_id: String },

    /// History id cannot be used as a storage key.
    #[error("invalid history id '{history_id}': {reason}")]
    InvalidHistoryId { history_id: String, reason: String },

    /// A snapshot violates the entry/section consistency invariant.
    #[error("inconsistent snapshot: {message}")]
    InconsistentSnapshot { message: String },
}

/// A specialized Result type for playbook operations.
pub type Result<T> = std::result::Result<T, PlaybookError>;

impl PlaybookError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a collaborator error.
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
        }
    }

    /// Create a schema violation for the named stage.
    pub fn schema(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a missing state error.
    pub fn missing_state(what: impl Into<String>) -> Self {
        Self::MissingState { what: what.into() }
    }

    /// Create a history not found error.
    pub fn history_not_found(history_id: impl Into<String>) -> Self {
        Self::HistoryNotFound {
            history_id: history_id.into(),
        }
    }

    /// Create an invalid history id error.
    pub fn invalid_history_id(history_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHistoryId {
            history_id: history_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an inconsistent snapshot error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentSnapshot {
            message: message.into(),
        }
    }

    /// Whether this error signals an upstream wiring bug rather than a
    /// data-quality problem from the collaborator.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingState { .. } | Self::InconsistentSnapshot { .. }
        )
    }
}

impl From<io::Error> for PlaybookError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for PlaybookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Infrastructure failures around a cycle (such as unreadable config files)
/// should degrade to a safe default instead of aborting the caller.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }
}

/// Exit codes for the playbook CLI.
pub mod exit_codes {
    /// Command completed.
    pub const SUCCESS: i32 = 0;

    /// Command failed.
    pub const ERROR: i32 = 1;

    /// A cycle stopped early; completed stages were still persisted.
    pub const ABORTED: i32 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = PlaybookError::storage(
            "/tmp/history.json",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("storage error"));
        assert!(err.to_string().contains("/tmp/history.json"));
    }

    #[test]
    fn test_schema_error_display() {
        let err = PlaybookError::schema("critique", "missing field `key_insight`");
        assert_eq!(
            err.to_string(),
            "schema violation in critique output: missing field `key_insight`"
        );
    }

    #[test]
    fn test_missing_state_error_display() {
        let err = PlaybookError::missing_state("produce output");
        assert_eq!(err.to_string(), "missing state: produce output");
    }

    #[test]
    fn test_history_not_found_error_display() {
        let err = PlaybookError::history_not_found("math-101");
        assert_eq!(err.to_string(), "history not found: math-101");
    }

    #[test]
    fn test_invalid_history_id_display() {
        let err = PlaybookError::invalid_history_id("../x", "contains a path separator");
        assert_eq!(
            err.to_string(),
            "invalid history id '../x': contains a path separator"
        );
    }

    #[test]
    fn test_contract_violation() {
        assert!(PlaybookError::missing_state("playbook").is_contract_violation());
        assert!(PlaybookError::inconsistent("dangling id").is_contract_violation());
        assert!(!PlaybookError::schema("produce", "bad json").is_contract_violation());
        assert!(!PlaybookError::collaborator("timeout").is_contract_violation());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: PlaybookError = io_err.into();
        assert!(matches!(err, PlaybookError::Storage { .. }));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: PlaybookError = json_err.into();
        assert!(matches!(err, PlaybookError::Serde { .. }));
    }

    #[test]
    fn test_fail_open_default() {
        let result: Result<Vec<String>> = Err(PlaybookError::config("test"));
        let value = result.fail_open_default("test context");
        assert!(value.is_empty());
    }

    #[test]
    fn test_fail_open_success() {
        let result: Result<i32> = Ok(100);
        assert_eq!(result.fail_open_default("test context"), 100);
    }
}
