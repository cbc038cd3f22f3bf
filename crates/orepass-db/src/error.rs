//! Database-specific error types and conversions.

use orepass_core::error::OrepassError;
use sqlx::error::ErrorKind;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("row decode failed: {0}")]
    Decode(String),

    #[error("unique constraint violated: {0}")]
    Unique(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKey(String),

    #[error("check constraint violated: {0}")]
    Check(String),
}

impl DbError {
    /// Classify a query error by constraint kind so the core taxonomy
    /// can distinguish conflicts from genuine storage failures.
    pub fn from_query(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            match db.kind() {
                ErrorKind::UniqueViolation => return DbError::Unique(db.message().to_string()),
                ErrorKind::ForeignKeyViolation => {
                    return DbError::ForeignKey(db.message().to_string());
                }
                ErrorKind::CheckViolation => return DbError::Check(db.message().to_string()),
                _ => {}
            }
        }
        DbError::Sqlx(err)
    }
}

impl From<DbError> for OrepassError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Unique(msg) => OrepassError::Conflict(msg),
            DbError::ForeignKey(msg) => OrepassError::NotFound {
                entity: "referenced record",
                id: msg,
            },
            DbError::Check(msg) => OrepassError::Validation(msg),
            other => OrepassError::Storage(other.to_string()),
        }
    }
}
