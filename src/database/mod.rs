// Firkinize — Database Module
//
// Contract for the relational server that hosts per-service databases,
// the statement builders the provisioner uses, and the MySQL adapter.
// A session is opened per top-level operation and closed when it ends.

mod error;
mod mysql;
pub mod sql;

use std::fmt;

use async_trait::async_trait;

use crate::secret::Password;
pub use error::DatabaseError;
pub use mysql::MySqlConnector;

// ─── Server descriptor ───────────────────────────────────────────────────────

/// Where and as whom to connect. Resolved from the config store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub host: String,
    pub port: u16,
    pub admin_user: String,
    pub admin_pass: Password,
}

// ─── Statements ──────────────────────────────────────────────────────────────

/// What a statement is for. Shown in logs and errors in place of the SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CheckSchema { database: String },
    CreateSchema { database: String },
    ShowGrants { user: String, host: String },
    GrantAll { database: String, user: String, host: String },
    ServerHostname,
}

impl Intent {
    /// Whether the statement text embeds a password.
    pub fn carries_secret(&self) -> bool {
        matches!(self, Intent::GrantAll { .. })
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::CheckSchema { database } => write!(f, "check existence of database {}", database),
            Intent::CreateSchema { database } => write!(f, "create database {}", database),
            Intent::ShowGrants { user, host } => write!(f, "read grants for '{}'@'{}'", user, host),
            Intent::GrantAll { database, user, host } => {
                write!(f, "grant privileges on {} to '{}'@'{}'", database, user, host)
            }
            Intent::ServerHostname => write!(f, "read server hostname"),
        }
    }
}

/// A SQL statement with positional string binds.
#[derive(Clone)]
pub struct Statement {
    sql: String,
    binds: Vec<String>,
    intent: Intent,
}

impl Statement {
    pub fn new(sql: impl Into<String>, binds: Vec<String>, intent: Intent) -> Self {
        Self {
            sql: sql.into(),
            binds,
            intent,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[String] {
        &self.binds
    }

    pub fn intent(&self) -> &Intent {
        &self.intent
    }
}

/// The SQL text may contain a password, so only the intent is shown.
impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("intent", &self.intent)
            .finish_non_exhaustive()
    }
}

/// Result rows, every column scanned as a string.
pub type Rows = Vec<Vec<String>>;

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Opens sessions against a database server.
#[async_trait]
pub trait SqlConnector: Send + Sync {
    async fn connect(
        &self,
        server: &ServerDescriptor,
    ) -> Result<Box<dyn SqlSession>, DatabaseError>;
}

/// A live connection to a database server.
#[async_trait]
pub trait SqlSession: Send {
    async fn exec(&mut self, statement: &Statement) -> Result<(), DatabaseError>;

    async fn query(&mut self, statement: &Statement) -> Result<Rows, DatabaseError>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<(), DatabaseError>;
}

// ─── In-Memory Server for Testing ────────────────────────────────────────────
