//! # Adapter Errors
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    From SQLite to the services                          │
//! │                                                                         │
//! │  sqlx::Error (constraint text, pool state)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← constraint / pool / decode categorisation     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (petal-checkout port)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CartError::Failed / OrderError::Failed ← operation name attached      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use petal_checkout::StoreError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// UNIQUE index violation, e.g. a second line for the same variant.
    #[error("Duplicate {field}")]
    UniqueViolation { field: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation, e.g. negative stock.
    #[error("Constraint violated: {message}")]
    CheckViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Runtime SQL error, including trigger aborts.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value that no longer parses (unknown enum text, bad JSON).
    #[error("Corrupt {column} value: {message}")]
    Decode { column: &'static str, message: String },

    #[error("No free connection in the pool")]
    PoolExhausted,

    #[error("SQLite error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn decode(column: &'static str, err: impl std::fmt::Display) -> Self {
        DbError::Decode {
            column,
            message: err.to_string(),
        }
    }
}

/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → by SQLite message (UNIQUE / FOREIGN KEY / CHECK)
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            DbError::UniqueViolation { .. }
            | DbError::ForeignKeyViolation { .. }
            | DbError::CheckViolation { .. } => StoreError::Conflict(err.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: StoreError = DbError::UniqueViolation {
            field: "cart_items.cart_id, cart_items.variant_id".to_string(),
        }
        .into();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err: StoreError = DbError::not_found("Cart", "c-1").into();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let err: StoreError = DbError::PoolExhausted.into();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
