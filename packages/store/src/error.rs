//! Errors raised by record store backends.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. `constraint` names the key.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: &'static str },

    /// A row the transaction expected to exist is gone.
    #[error("{entity} {id} not found")]
    Missing { entity: &'static str, id: i64 },

    /// Any failure inside the storage backend itself.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(e: impl std::fmt::Display) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
