// Firkinize — Library root
//
// Re-exports the tenant, secret, store, database, provisioning, and CLI
// modules.

pub mod cli;
pub mod database;
pub mod error;
pub mod provision;
pub mod secret;
pub mod store;
pub mod tenant;

pub use error::{FirkinizeError, Result};
