//! Error types for the snippet store
//!
//! A database that cannot be opened is logged and the store degrades to the
//! flat file backend. A database held by another process is waited on and
//! then reported as `Locked`, never degraded. Everything else propagates.

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The structured database could not be opened. Only used internally
    /// to trigger the fallback.
    #[error("Structured backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Another process holds the structured database
    #[error("Database is locked by another process: {0}")]
    Locked(String),

    #[error("Snippet with ID {0} not found")]
    NotFound(String),

    /// Import payload was not a JSON array of snippets
    #[error("Invalid snippet format: {0}")]
    Format(String),

    /// A structured-backend operation failed after the database was opened
    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Transaction(err.to_string())
    }
}

impl<E: std::fmt::Display> From<sled::transaction::TransactionError<E>> for StoreError {
    fn from(err: sled::transaction::TransactionError<E>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => StoreError::Transaction(e.to_string()),
            sled::transaction::TransactionError::Storage(e) => {
                StoreError::Transaction(e.to_string())
            }
        }
    }
}
