//! Error types for store operations.

use crate::types::{LocalId, RowId};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while querying or applying a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// An operation referenced an entity that does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(LocalId),

    /// An operation referenced a row that does not exist.
    #[error("row not found: {0}")]
    RowNotFound(RowId),

    /// A back-reference did not point at an earlier create operation.
    #[error("invalid back-reference to operation {index}")]
    BadReference {
        /// Index of the referenced operation within the batch.
        index: usize,
    },

    /// The backing store rejected the batch.
    #[error("store rejected batch: {0}")]
    Rejected(String),
}
