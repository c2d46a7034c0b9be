//! Error types for the database helper.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Errors raised by the helper itself carry enough context to explain which
//! lifecycle rule was violated; errors reported by the backend are passed through
//! untouched.

use thiserror::Error;

/// Boxed error type used by drivers that are not built on sqlx.
pub type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database instance is disposed: cannot {operation}")]
    Disposed { operation: String },

    #[error("Transaction is not valid: {message}")]
    InvalidTransaction { message: String },

    #[error(
        "Transaction {ambient} is already open on this instance; cannot execute with transaction {supplied}"
    )]
    ConflictingTransaction { ambient: String, supplied: String },

    #[error("Transactions are only supported in singleton mode: cannot {operation}")]
    Mode { operation: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("{feature} is not supported by the {backend} driver")]
    Unsupported { feature: String, backend: String },

    /// Error reported by a sqlx-backed driver, unchanged.
    #[error(transparent)]
    Backend(#[from] sqlx::Error),

    /// Error reported by any other driver, unchanged.
    #[error(transparent)]
    Driver(BoxDynError),
}

impl DbError {
    /// Create a disposed error for the named operation.
    pub fn disposed(operation: impl Into<String>) -> Self {
        Self::Disposed {
            operation: operation.into(),
        }
    }

    /// Create an invalid transaction error.
    pub fn invalid_transaction(message: impl Into<String>) -> Self {
        Self::InvalidTransaction {
            message: message.into(),
        }
    }

    /// Create a conflicting transaction error from the two transaction ids.
    pub fn conflicting_transaction(ambient: impl Into<String>, supplied: impl Into<String>) -> Self {
        Self::ConflictingTransaction {
            ambient: ambient.into(),
            supplied: supplied.into(),
        }
    }

    /// Create a mode error for the named operation.
    pub fn mode(operation: impl Into<String>) -> Self {
        Self::Mode {
            operation: operation.into(),
        }
    }

    /// Create an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(feature: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
            backend: backend.into(),
        }
    }

    /// Wrap an error reported by a driver that is not built on sqlx.
    pub fn driver(err: impl Into<BoxDynError>) -> Self {
        Self::Driver(err.into())
    }

    /// Check if this error was reported by the backend rather than the helper.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Driver(_))
    }

    /// SQLSTATE (or vendor code) of a backend database error, if any.
    pub fn sql_state(&self) -> Option<String> {
        match self {
            Self::Backend(sqlx::Error::Database(db_err)) => db_err.code().map(|c| c.to_string()),
            _ => None,
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::disposed("execute a command");
        assert!(err.to_string().contains("disposed"));
        assert!(err.to_string().contains("execute a command"));
    }

    #[test]
    fn test_conflicting_transaction_names_both_ids() {
        let err = DbError::conflicting_transaction("tx_a", "tx_b");
        let message = err.to_string();
        assert!(message.contains("tx_a"));
        assert!(message.contains("tx_b"));
    }

    #[test]
    fn test_unsupported_display() {
        let err = DbError::unsupported("Stored procedures", "SQLite");
        assert_eq!(
            err.to_string(),
            "Stored procedures is not supported by the SQLite driver"
        );
    }

    #[test]
    fn test_backend_errors_pass_through() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(err.is_backend());
        assert_eq!(err.to_string(), sqlx::Error::RowNotFound.to_string());
        assert!(matches!(err, DbError::Backend(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_driver_error_pass_through() {
        let err = DbError::driver("disk full");
        assert!(err.is_backend());
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_helper_errors_are_not_backend() {
        assert!(!DbError::mode("begin a transaction").is_backend());
        assert!(!DbError::invalid_transaction("no transaction").is_backend());
        assert!(DbError::invalid_input("bad name").sql_state().is_none());
    }
}
