//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError (service/mod.rs) ← DbError | CoreError at the boundary    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller maps to its transport (HTTP status, UI message, ...)            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! DbError is infra: unreachable datastore, exhausted pool, broken
//! constraint. These are the only errors a caller may retry (with bounded
//! backoff, at the transaction boundary). Business errors never pass
//! through this type.

use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context for
/// debugging and retry decisions.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second OPEN drawer for the same (operator, business day)
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: constraint violated")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Kardex entry referencing a non-existent product
    /// - Payment referencing a non-existent sale
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The database was locked by a concurrent writer (SQLITE_BUSY or a
    /// stale WAL snapshot). Transient: the transaction can be retried.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

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

    /// True for failures worth retrying with backoff (transient infra).
    ///
    /// Busy covers the common WAL multi-writer case: a transaction whose
    /// read snapshot went stale loses to the committed writer and can
    /// simply run again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::PoolExhausted | DbError::ConnectionFailed(_)
        )
    }
}

/// Classifies a SQLite database-level error message.
///
/// SQLite reports constraint and contention failures as message text:
/// - UNIQUE: `UNIQUE constraint failed: <table>.<column>`
/// - FK:     `FOREIGN KEY constraint failed`
/// - BUSY:   `database is locked` / `database table is locked` (error
///   codes 5 and 517 surface with these messages)
fn classify_database_message(msg: &str) -> DbError {
    if msg.contains("UNIQUE constraint failed") {
        let field = msg
            .split("UNIQUE constraint failed: ")
            .nth(1)
            .unwrap_or("unknown")
            .to_string();
        DbError::UniqueViolation { field }
    } else if msg.contains("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation {
            message: msg.to_string(),
        }
    } else if msg.contains("database is locked") || msg.contains("database table is locked") {
        DbError::Busy(msg.to_string())
    } else {
        DbError::QueryFailed(msg.to_string())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
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

            sqlx::Error::Database(db_err) => classify_database_message(db_err.message()),

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

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_extracts_field() {
        let err = classify_database_message(
            "UNIQUE constraint failed: cash_drawers.operator_id, cash_drawers.business_day",
        );
        match err {
            DbError::UniqueViolation { field } => {
                assert!(field.starts_with("cash_drawers.operator_id"));
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_foreign_key_violation() {
        let err = classify_database_message("FOREIGN KEY constraint failed");
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[test]
    fn test_locked_database_is_transient() {
        // A writer losing to a concurrent commit surfaces SQLITE_BUSY as
        // "database is locked"; that transaction is safe to run again.
        let err = classify_database_message("database is locked");
        assert!(matches!(err, DbError::Busy(_)));
        assert!(err.is_transient());

        let err = classify_database_message("database table is locked: products");
        assert!(err.is_transient());
    }

    #[test]
    fn test_plain_query_failure_not_transient() {
        let err = classify_database_message("no such table: ghosts");
        assert!(matches!(err, DbError::QueryFailed(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(DbError::PoolExhausted.is_transient());
        assert!(DbError::ConnectionFailed("refused".to_string()).is_transient());
        assert!(!DbError::not_found("Product", "p1").is_transient());
    }
}
