//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError / ValidationError       │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  DbError (this module) ◄──────────── DbError::Domain                   │
//! │       │                                                                 │
//! │       ├── ConcurrencyConflict ──► retried by `retry::with_conflict_retry`│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller (web front office, seed binary)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Returning an error out of a transaction scope drops the `sqlx::Transaction`,
//! which rolls it back. Nothing is half-written.

use stockflow_core::{CoreError, ValidationError};
use thiserror::Error;

/// SQLite result codes that signal a lock conflict rather than a bad query:
/// SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_LOCKED_SHAREDCACHE (262),
/// SQLITE_BUSY_RECOVERY (261), SQLITE_BUSY_SNAPSHOT (517),
/// SQLITE_BUSY_TIMEOUT (773).
const LOCK_CONFLICT_CODES: [&str; 6] = ["5", "6", "261", "262", "517", "773"];

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database (for this tenant).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Deleting an entity that ledger records still reference.
    ///
    /// ## When This Occurs
    /// - Deleting a product that has inflows or outflows
    #[error("Cannot delete {entity} {id}: referenced by {referenced_by}")]
    ReferentialIntegrity {
        entity: String,
        id: String,
        referenced_by: String,
    },

    /// SQLite reported a lock conflict (busy/locked) that outlived the busy
    /// timeout. Safe to retry the whole transaction.
    #[error("Concurrent write conflict: {0}")]
    ConcurrencyConflict(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Business rule violation raised by stockflow-core.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a ReferentialIntegrity error.
    pub fn referenced(
        entity: impl Into<String>,
        id: impl Into<String>,
        referenced_by: impl Into<String>,
    ) -> Self {
        DbError::ReferentialIntegrity {
            entity: entity.into(),
            id: id.into(),
            referenced_by: referenced_by.into(),
        }
    }

    /// Returns true if retrying the failed transaction may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::ConcurrencyConflict(_))
    }

    /// Returns the validation error carried by a domain error, if any.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            DbError::Domain(CoreError::Validation(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → code / message decides:
///                                 busy, locked  → ConcurrencyConflict
///                                 UNIQUE        → UniqueViolation
///                                 FOREIGN KEY   → ForeignKeyViolation
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let lock_code = db_err
                    .code()
                    .map(|code| LOCK_CONFLICT_CODES.contains(&code.as_ref()))
                    .unwrap_or(false);

                if lock_code || msg.contains("database is locked") || msg.contains("is locked") {
                    DbError::ConcurrencyConflict(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_wraps_as_domain() {
        let err: DbError = ValidationError::QuoteWithoutExpiration.into();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::QuoteWithoutExpiration)
        ));
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_pool_timeout_maps_to_exhausted() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));
    }

    #[test]
    fn test_referenced_message() {
        let err = DbError::referenced("Product", "p1", "2 inflows, 1 outflow");
        assert_eq!(
            err.to_string(),
            "Cannot delete Product p1: referenced by 2 inflows, 1 outflow"
        );
    }
}
