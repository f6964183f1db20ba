//! Storage engine error types
//!
//! Defines all errors that can occur in the storage layer.

use crate::storage::types::SeriesId;
use thiserror::Error;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying key/value store failure
    #[error("Store error: {0}")]
    Store(#[from] rocksdb::Error),

    /// Serialization/deserialization failed (series metadata, postings)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected (wrong key length, bad prefix byte, etc.)
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Requested series does not exist
    #[error("Series not found: {0}")]
    SeriesNotFound(SeriesId),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
