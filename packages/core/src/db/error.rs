//! Database Error Types
//!
//! This module defines error types for database operations, providing
//! clear error handling for connection, initialization, and query failures.

use std::path::PathBuf;
use thiserror::Error;

/// Database operation errors
///
/// Covers all error cases for database connection, initialization,
/// and basic operations. Business-level failures (duplicate paths,
/// missing endpoints) are handled by service-layer error types.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A UNIQUE constraint rejected the write.
    ///
    /// The `full_path` uniqueness constraint is the ultimate guard against
    /// concurrent creates/renames computing the same path; callers translate
    /// this variant into a duplicate-path error rather than a generic SQL
    /// failure.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A row violates the endpoint structural invariants.
    ///
    /// Only reachable when decoding rows written by something other than this
    /// crate's constructors; never silently corrected.
    #[error("Invariant violation in stored row: {context}")]
    InvariantViolation { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant_violation(context: impl Into<String>) -> Self {
        Self::InvariantViolation {
            context: context.into(),
        }
    }

    /// Classify a libsql execution error, recognizing UNIQUE constraint
    /// violations from the SQLite error text.
    ///
    /// SQLite reports these as `UNIQUE constraint failed: <table>.<column>`;
    /// libsql surfaces the message through its error display. Anything else
    /// becomes a generic SQL execution error with the given context.
    pub fn classify_sql(context: &str, source: libsql::Error) -> Self {
        Self::classify_message(context, &source.to_string())
    }

    fn classify_message(context: &str, message: &str) -> Self {
        if let Some(constraint) = extract_unique_constraint(message) {
            return Self::UniqueViolation { constraint };
        }
        Self::sql_execution(format!("{}: {}", context, message))
    }

    /// Whether this error is a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Pull the constraint name out of a SQLite unique-violation message.
///
/// libsql wraps the SQLite text (`UNIQUE constraint failed: <table>.<column>`)
/// in its own error display, sometimes with backticks or trailing detail, so
/// the name is cut at the first delimiter after the marker.
fn extract_unique_constraint(message: &str) -> Option<String> {
    const MARKER: &str = "UNIQUE constraint failed: ";
    let idx = message.find(MARKER)?;
    let constraint = message[idx + MARKER.len()..]
        .split([',', ')', '\n', '`'])
        .next()
        .unwrap_or("")
        .trim();
    if constraint.is_empty() {
        None
    } else {
        Some(constraint.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unique_violation() {
        let err = DatabaseError::classify_message(
            "Failed to insert endpoint",
            "SQLite failure: `UNIQUE constraint failed: endpoints.full_path`",
        );
        assert!(err.is_unique_violation());
        match err {
            DatabaseError::UniqueViolation { constraint } => {
                assert_eq!(constraint, "endpoints.full_path");
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_other_errors_keep_context() {
        let err =
            DatabaseError::classify_message("Failed to insert endpoint", "no such table: endpoints");
        assert!(!err.is_unique_violation());
        assert!(err.to_string().contains("Failed to insert endpoint"));
    }
}
