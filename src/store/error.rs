//! Store error types
//!
//! Defines all errors that can occur in the persistence layer.

use thiserror::Error;

/// Errors that can occur in the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite reported a failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O operation failed (creating the database directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An account with this email or username is already stored
    #[error("Account already exists")]
    AccountExists,

    /// A referenced category does not exist
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// A referenced post does not exist
    #[error("Post not found: {0}")]
    PostNotFound(i64),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Blocking task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
