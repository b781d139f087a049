//! Error types for surveyledger.
//!
//! This module defines all error types used throughout the surveyledger crate.
//! Every variant maps onto a wire code so callables can report failures the
//! same way regardless of which layer raised them.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for surveyledger operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Request Errors ===
    /// The request payload was malformed (bad fingerprint, oversized answers, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of what was wrong with the input.
        message: String,
    },

    /// The caller did not present an identity.
    #[error("authentication required")]
    Unauthenticated,

    /// The caller is authenticated but not allowed to perform the operation.
    #[error("permission denied for '{uid}'")]
    PermissionDenied {
        /// The uid of the rejected caller.
        uid: String,
    },

    // === Transport Errors ===
    /// The backend could not be reached or failed before answering.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// An operation timed out. The outcome is unknown.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for surveyledger operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new invalid-argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new permission-denied error for the given uid.
    #[must_use]
    pub fn permission_denied(uid: impl Into<String>) -> Self {
        Self::PermissionDenied { uid: uid.into() }
    }

    /// Create a new unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a new timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is an authentication or authorization failure.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::PermissionDenied { .. })
    }

    /// Check if the caller may retry the same request.
    ///
    /// Retrying a submission is safe because the ledger deduplicates by
    /// fingerprint, so an ambiguous timeout can simply be re-sent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_)
                | Self::Timeout { .. }
                | Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::Io(_)
        )
    }

    /// The wire code reported to remote callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid-argument",
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied { .. } => "permission-denied",
            Self::Timeout { .. } => "deadline-exceeded",
            Self::Unavailable(_)
            | Self::DatabaseOpen { .. }
            | Self::DatabaseQuery(_)
            | Self::Io(_)
            | Self::DirectoryCreate { .. } => "unavailable",
            Self::DatabaseMigration { .. }
            | Self::ConfigLoad(_)
            | Self::ConfigValidation { .. }
            | Self::Json(_)
            | Self::Internal(_) => "internal",
        }
    }

    /// A message safe to show to the person filling in the survey.
    ///
    /// Never includes internal detail.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => {
                "Some answers could not be read. Please review the form and try again."
            }
            Self::Unauthenticated | Self::PermissionDenied { .. } => {
                "You are not allowed to change the survey settings."
            }
            _ => "We couldn't save your response. Please try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Unauthenticated;
        assert_eq!(err.to_string(), "authentication required");

        let err = Error::unavailable("connection reset");
        assert_eq!(err.to_string(), "backend unavailable: connection reset");
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = Error::invalid_argument("Invalid fingerprint");
        assert_eq!(err.to_string(), "invalid argument: Invalid fingerprint");
        assert_eq!(err.code(), "invalid-argument");
    }

    #[test]
    fn test_permission_denied_display() {
        let err = Error::permission_denied("clerk-7");
        assert!(err.to_string().contains("clerk-7"));
        assert!(err.is_permission_error());
        assert_eq!(err.code(), "permission-denied");
    }

    #[test]
    fn test_unauthenticated_is_permission_error() {
        assert!(Error::Unauthenticated.is_permission_error());
        assert!(!Error::internal("x").is_permission_error());
        assert_eq!(Error::Unauthenticated.code(), "unauthenticated");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::unavailable("down").is_recoverable());
        assert!(Error::timeout("submitSurvey").is_recoverable());
        assert!(!Error::invalid_argument("bad").is_recoverable());
        assert!(!Error::Unauthenticated.is_recoverable());
    }

    #[test]
    fn test_timeout_code() {
        let err = Error::timeout("submitSurvey");
        assert!(err.to_string().contains("submitSurvey"));
        assert_eq!(err.code(), "deadline-exceeded");
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = Error::internal("row 42 had a NULL fingerprint");
        assert!(!err.user_message().contains("row 42"));
        assert!(err.user_message().contains("try again"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
        assert_eq!(err.code(), "unavailable");
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
            assert_eq!(err.code(), "internal");
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "busy_timeout_ms must be greater than 0".to_string(),
        };
        assert!(err.to_string().contains("busy_timeout_ms"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
