//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid stored row: {0}")]
    InvalidRow(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
