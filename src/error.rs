// Firkinize — Top-level error types
//
// Aggregates errors from the store and database modules into a single
// error enum for the application boundary.

use thiserror::Error;

/// Top-level error type for all Firkinize operations.
#[derive(Debug, Error)]
pub enum FirkinizeError {
    #[error("Config store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::database::DatabaseError),
}

pub type Result<T> = std::result::Result<T, FirkinizeError>;
