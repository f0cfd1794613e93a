//! Custom error types for the common library
//!
//! This module defines the database error type shared by every service
//! that talks to the portal database.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Returns true when the underlying error is a unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Returns true when the underlying error is a foreign key violation
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => db.is_foreign_key_violation(),
            _ => false,
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DatabaseError::Configuration("missing url".to_string());
        assert_eq!(err.to_string(), "Database configuration error: missing url");
        assert!(!err.is_unique_violation());
        assert!(!err.is_foreign_key_violation());
    }

    #[test]
    fn test_row_not_found_is_not_a_constraint_violation() {
        let err = DatabaseError::Query(SqlxError::RowNotFound);
        assert!(!err.is_unique_violation());
        assert!(err.to_string().starts_with("Database query error"));
    }
}
