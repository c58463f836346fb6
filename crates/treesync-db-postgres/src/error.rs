//! Error types for the PostgreSQL store.

use sqlx_core::error::Error as SqlxError;
use treesync_core::StoreError;

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is "undefined table" (42P01).
pub fn is_undefined_table(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNDEFINED_TABLE)
}

/// Errors specific to the PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Any error reported by sqlx.
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// `true` for failures to reach the server at all, as opposed to a
    /// statement the server rejected.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Database(
                SqlxError::Io(_)
                    | SqlxError::Tls(_)
                    | SqlxError::PoolTimedOut
                    | SqlxError::PoolClosed
                    | SqlxError::Configuration(_)
            )
        )
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Database(ref e) if is_undefined_table(e) => StoreError::query(
                "table customer_settings does not exist (enable storage.postgres.run_migrations)",
            ),
            ref e if e.is_connection() => StoreError::connection(e.to_string()),
            PostgresError::Database(e) => StoreError::query(e.to_string()),
            PostgresError::Migration(e) => StoreError::internal(format!("Migration error: {e}")),
            PostgresError::Config { message } => {
                StoreError::connection(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));

        let err = PostgresError::Migration("checksum mismatch".into());
        assert!(err.to_string().contains("Migration error"));
    }

    #[test]
    fn test_conversion_to_store_error() {
        let store_err: StoreError = PostgresError::config("bad port").into();
        assert!(matches!(store_err, StoreError::Connection { .. }));

        let store_err: StoreError = PostgresError::Database(SqlxError::PoolTimedOut).into();
        assert!(matches!(store_err, StoreError::Connection { .. }));

        let store_err: StoreError = PostgresError::Database(SqlxError::RowNotFound).into();
        assert!(matches!(store_err, StoreError::Query { .. }));

        let store_err: StoreError = PostgresError::Migration("boom".into()).into();
        assert!(matches!(store_err, StoreError::Internal { .. }));
    }
}
