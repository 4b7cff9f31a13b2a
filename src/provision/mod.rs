// Firkinize — Provisioning Module
//
// Idempotent provisioning of service identities (config store only) and
// service databases (database server + config store).

mod credential;
mod database;

pub use credential::{get_password, CredentialProvisioner};
pub use database::{DatabaseOutcome, DatabaseProvisioner, Existence};
