// Firkinize — Database error types
//
// Statement failures carry the statement's intent, never its SQL text,
// since GRANT statements embed a password.

use thiserror::Error;

use super::Intent;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Cannot reach database server: {0}")]
    Connection(String),

    #[error("Failed to {intent}: {reason}")]
    Exec { intent: Intent, reason: String },

    #[error("Cannot determine whether database {database} exists: {reason}")]
    AmbiguousExistence { database: String, reason: String },

    #[error("Invalid identifier {0:?}: only [A-Za-z0-9_-], up to 64 characters")]
    InvalidIdentifier(String),

    #[error("Invalid database server descriptor: {0}")]
    InvalidDescriptor(String),
}
