use rusqlite::ffi;
use thiserror::Error;

use crate::database::DatabaseError;

/// Error type for repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// Connection pool error
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                RepositoryError::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "Record already exists".to_string()),
                )
            }
            _ => RepositoryError::Sqlite(error),
        }
    }
}

impl RepositoryError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        RepositoryError::NotFound(format!("{} {}", kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (v TEXT UNIQUE)", []).unwrap();
        conn.execute("INSERT INTO t (v) VALUES ('a')", []).unwrap();

        let err: RepositoryError = conn
            .execute("INSERT INTO t (v) VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[test]
    fn test_other_sqlite_errors_are_kept() {
        let conn = Connection::open_in_memory().unwrap();
        let err: RepositoryError = conn
            .execute("SELECT * FROM missing_table", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::Sqlite(_)));
    }
}
