// Firkinize — SQL statement builders
//
// MariaDB / MySQL 5.7 dialect. Identifiers are validated before they are
// quoted; string literals are escaped. Each builder tags its statement
// with an `Intent` used for logging and error messages.

use super::{DatabaseError, Intent, Statement};
use crate::secret::Password;

const MAX_IDENTIFIER_LEN: usize = 64;

/// Accept only names that are safe to splice into SQL.
pub fn validate_identifier(name: &str) -> Result<&str, DatabaseError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(DatabaseError::InvalidIdentifier(name.to_string()))
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn account(user: &str, host: &str) -> String {
    format!("{}@{}", quote_literal(user), quote_literal(host))
}

/// Catalog lookup: one row when the schema exists, none otherwise.
pub fn schema_exists(database: &str) -> Result<Statement, DatabaseError> {
    let database = validate_identifier(database)?;
    Ok(Statement::new(
        "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
        vec![database.to_string()],
        Intent::CheckSchema {
            database: database.to_string(),
        },
    ))
}

pub fn create_schema(database: &str) -> Result<Statement, DatabaseError> {
    let database = validate_identifier(database)?;
    Ok(Statement::new(
        format!("CREATE DATABASE IF NOT EXISTS {}", quote_identifier(database)),
        Vec::new(),
        Intent::CreateSchema {
            database: database.to_string(),
        },
    ))
}

pub fn show_grants(user: &str, host: &str) -> Result<Statement, DatabaseError> {
    let user = validate_identifier(user)?;
    Ok(Statement::new(
        format!("SHOW GRANTS FOR {}", account(user, host)),
        Vec::new(),
        Intent::ShowGrants {
            user: user.to_string(),
            host: host.to_string(),
        },
    ))
}

pub fn grant_all(
    database: &str,
    user: &str,
    host: &str,
    password: &Password,
) -> Result<Statement, DatabaseError> {
    let database = validate_identifier(database)?;
    let user = validate_identifier(user)?;
    Ok(Statement::new(
        format!(
            "GRANT ALL PRIVILEGES ON {}.* TO {} IDENTIFIED BY {}",
            quote_identifier(database),
            account(user, host),
            quote_literal(password.expose())
        ),
        Vec::new(),
        Intent::GrantAll {
            database: database.to_string(),
            user: user.to_string(),
            host: host.to_string(),
        },
    ))
}

pub fn server_hostname() -> Statement {
    Statement::new("SELECT @@hostname", Vec::new(), Intent::ServerHostname)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("qbert").is_ok());
        assert!(validate_identifier("resmgr_db-2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a`; DROP DATABASE x").is_err());
        assert!(validate_identifier(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_schema_exists_binds_name() {
        let stmt = schema_exists("qbert").unwrap();
        assert!(stmt.sql().contains("information_schema.SCHEMATA"));
        assert_eq!(stmt.binds(), ["qbert".to_string()]);
    }

    #[test]
    fn test_create_schema_quotes_name() {
        let stmt = create_schema("qbert").unwrap();
        assert_eq!(stmt.sql(), "CREATE DATABASE IF NOT EXISTS `qbert`");
    }

    #[test]
    fn test_grant_statement_text() {
        let stmt = grant_all("qbert", "qbert", "%", &Password::new("abc")).unwrap();
        assert_eq!(
            stmt.sql(),
            "GRANT ALL PRIVILEGES ON `qbert`.* TO 'qbert'@'%' IDENTIFIED BY 'abc'"
        );
    }

    #[test]
    fn test_literals_are_escaped() {
        let stmt = grant_all("db", "u", "host'x", &Password::new("p'w\\")).unwrap();
        assert!(stmt.sql().contains("'host\\'x'"));
        assert!(stmt.sql().ends_with("'p\\'w\\\\'"));
    }

    #[test]
    fn test_statement_debug_hides_sql() {
        let stmt = grant_all("db", "u", "%", &Password::new("topsecret")).unwrap();
        let shown = format!("{:?} {}", stmt, stmt.intent());
        assert!(!shown.contains("topsecret"));
    }
}
