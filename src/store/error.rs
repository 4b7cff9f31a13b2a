// Firkinize — Config store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Configuration not found: {0}")]
    NotFound(String),

    #[error("Failed to read {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("Config store transaction rejected: {0}")]
    Write(String),

    #[error("Key {0} was created concurrently by another writer")]
    Conflict(String),

    #[error("Config store client error: {0}")]
    Client(String),
}
