//! Query error types
//!
//! Defines all error conditions that can occur during filter parsing and
//! query execution.

use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Filter expression parsing failed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Nonsensical option passed to a query builder
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
