// Firkinize — MySQL adapter
//
// Opens one sqlx connection per session. Statements with binds go through
// the prepared-statement protocol; everything else (DDL, GRANT, SHOW) is
// sent as raw text since not every server accepts those as prepared.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Connection, Executor, Row};

use super::{DatabaseError, Rows, ServerDescriptor, SqlConnector, SqlSession, Statement};

/// Connects to MySQL / MariaDB servers.
#[derive(Debug, Default, Clone)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SqlConnector for MySqlConnector {
    async fn connect(
        &self,
        server: &ServerDescriptor,
    ) -> Result<Box<dyn SqlSession>, DatabaseError> {
        let options = MySqlConnectOptions::new()
            .host(&server.host)
            .port(server.port)
            .username(&server.admin_user)
            .password(server.admin_pass.expose());

        let conn = options
            .connect()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        tracing::debug!(host = %server.host, port = server.port, "Connected to database server");
        Ok(Box::new(MySqlSession { conn }))
    }
}

struct MySqlSession {
    conn: MySqlConnection,
}

/// Server-side rejections are statement errors; anything else means the
/// connection itself is unusable.
///
/// Server messages may quote the statement near the failure point, so for
/// statements that embed a password only the error code is kept.
fn classify(statement: &Statement, err: sqlx::Error) -> DatabaseError {
    match err {
        sqlx::Error::Database(db_err) => {
            let reason = if statement.intent().carries_secret() {
                match db_err.code() {
                    Some(code) => format!("server error {} (message withheld)", code),
                    None => "server error (message withheld)".to_string(),
                }
            } else {
                db_err.message().to_string()
            };
            DatabaseError::Exec {
                intent: statement.intent().clone(),
                reason,
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => DatabaseError::Exec {
            intent: statement.intent().clone(),
            reason: err.to_string(),
        },
        other => DatabaseError::Connection(other.to_string()),
    }
}

/// Scan every column as text. Some catalog columns come back as binary
/// strings, which are decoded lossily.
fn scan_row(row: &MySqlRow) -> Result<Vec<String>, sqlx::Error> {
    (0..row.len())
        .map(|i| match row.try_get::<String, _>(i) {
            Ok(value) => Ok(value),
            Err(_) => row
                .try_get::<Vec<u8>, _>(i)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        })
        .collect()
}

#[async_trait]
impl SqlSession for MySqlSession {
    async fn exec(&mut self, statement: &Statement) -> Result<(), DatabaseError> {
        let result = if statement.binds().is_empty() {
            self.conn.execute(sqlx::raw_sql(statement.sql())).await
        } else {
            let mut query = sqlx::query(statement.sql());
            for bind in statement.binds() {
                query = query.bind(bind.as_str());
            }
            query.execute(&mut self.conn).await
        };

        result.map(|_| ()).map_err(|e| classify(statement, e))
    }

    async fn query(&mut self, statement: &Statement) -> Result<Rows, DatabaseError> {
        let result = if statement.binds().is_empty() {
            self.conn.fetch_all(sqlx::raw_sql(statement.sql())).await
        } else {
            let mut query = sqlx::query(statement.sql());
            for bind in statement.binds() {
                query = query.bind(bind.as_str());
            }
            query.fetch_all(&mut self.conn).await
        };
        let rows = result.map_err(|e| classify(statement, e))?;

        rows.iter()
            .map(scan_row)
            .collect::<Result<Rows, _>>()
            .map_err(|e| classify(statement, e))
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        let session = *self;
        session
            .conn
            .close()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))
    }
}
