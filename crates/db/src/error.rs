//! Typed error type for the db crate.

use adapters::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Connection-level problems may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Sqlx(
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            )
        )
    }
}

impl From<DbError> for AdapterError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            AdapterError::Retryable(err.to_string())
        } else {
            AdapterError::Fatal(err.to_string())
        }
    }
}
