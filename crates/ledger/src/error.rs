use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to the database")]
    ConnectionError(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("Ledger operation failed")]
    OperationFailed(sqlx::Error),
    #[error("Ledger row {0} not found")]
    RowNotFound(crate::RowId),
    #[error("Ledger row {0} is already closed")]
    AlreadyClosed(crate::RowId),
    #[error("Stored row could not be decoded: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
