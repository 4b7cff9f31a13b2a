// Firkinize — Database Provisioner
//
// Creates a service's database and grants its user access from every host
// it may connect from, then records the outcome in the config store.
//
// The config store and the database server share no commit. Each step is
// idempotent on its own and the record is only written after the server
// side is confirmed, so a crash between the two leaves a state that the
// next run converges from. Provisioning is at-least-once and eventually
// consistent, never atomic across both backends.

use std::collections::BTreeSet;

use crate::database::{sql, DatabaseError, ServerDescriptor, SqlConnector, SqlSession};
use crate::secret::{Password, SecretGenerator};
use crate::store::{self, ConfigStore, KvOp, StoreError};
use crate::tenant::{field_key, TenantScope};

/// Hosts every database user is granted access from, besides the server's
/// own hostname.
const GRANT_HOSTS: [&str; 2] = ["localhost", "%"];

/// What `provision` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseOutcome {
    pub database: String,
    pub user: String,
    pub created: bool,
    pub grants_changed: bool,
    pub record_synced: bool,
}

/// Result of probing the catalog for a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    Absent,
}

pub struct DatabaseProvisioner<'a> {
    store: &'a dyn ConfigStore,
    secrets: &'a dyn SecretGenerator,
    connector: &'a dyn SqlConnector,
    tenant: &'a TenantScope,
}

impl<'a> DatabaseProvisioner<'a> {
    pub fn new(
        store: &'a dyn ConfigStore,
        secrets: &'a dyn SecretGenerator,
        connector: &'a dyn SqlConnector,
        tenant: &'a TenantScope,
    ) -> Self {
        Self {
            store,
            secrets,
            connector,
            tenant,
        }
    }

    /// Follow the tenant's `dbserver_key` pointer to the server's
    /// connection details. Every field must be present.
    pub async fn resolve_server(&self) -> crate::Result<ServerDescriptor> {
        let pointer = store::require(self.store, &self.tenant.dbserver_pointer_key()).await?;
        let pointer = pointer.trim_end_matches('/');

        let host = store::require(self.store, &field_key(pointer, "host")).await?;
        let port = store::require(self.store, &field_key(pointer, "port")).await?;
        let admin_user = store::require(self.store, &field_key(pointer, "admin_user")).await?;
        let admin_pass = store::require(self.store, &field_key(pointer, "admin_pass")).await?;

        let port = port.trim().parse::<u16>().map_err(|_| {
            DatabaseError::InvalidDescriptor(format!("port {:?} under {} is not a number", port, pointer))
        })?;

        Ok(ServerDescriptor {
            host,
            port,
            admin_user,
            admin_pass: Password::new(admin_pass),
        })
    }

    /// Create `database` unless the catalog already lists it. Returns
    /// whether a creation took place.
    pub async fn ensure_database(
        &self,
        session: &mut dyn SqlSession,
        database: &str,
    ) -> Result<bool, DatabaseError> {
        match probe_schema(session, database).await? {
            Existence::Exists => {
                tracing::debug!(database = %database, "Database already exists");
                Ok(false)
            }
            Existence::Absent => {
                session.exec(&sql::create_schema(database)?).await?;
                tracing::info!(database = %database, "Database created");
                Ok(true)
            }
        }
    }

    /// Grant `user` all privileges on `database` from localhost, any host,
    /// and the server's own hostname. Returns whether any host's grant set
    /// differs from what it was before.
    ///
    /// Grant listings that cannot be read are logged and never abort the
    /// loop: an unreadable "before" counts as no grants, an unreadable
    /// "after" counts as unchanged.
    pub async fn ensure_grants(
        &self,
        session: &mut dyn SqlSession,
        database: &str,
        user: &str,
        password: &Password,
    ) -> Result<bool, DatabaseError> {
        let mut changed = false;

        for host in grant_hosts(session).await {
            let before = observe_grants(session, user, &host).await?;
            session
                .exec(&sql::grant_all(database, user, &host, password)?)
                .await?;
            let after = observe_grants(session, user, &host).await?;

            match after {
                Some(after) if before.as_deref() != Some(after.as_str()) => {
                    tracing::debug!(user = %user, host = %host, "Grants changed");
                    changed = true;
                }
                Some(_) => tracing::debug!(user = %user, host = %host, "Grants unchanged"),
                None => tracing::warn!(user = %user, host = %host, "Grants not visible after GRANT, assuming unchanged"),
            }
        }

        Ok(changed)
    }

    /// Record the database's coordinates in the config store.
    pub async fn sync_record(
        &self,
        service: &str,
        user: &str,
        password: &Password,
        server: &ServerDescriptor,
    ) -> Result<(), StoreError> {
        let prefix = self.tenant.db_record_prefix(service);
        let port = server.port.to_string();
        let ops = [
            KvOp::set(field_key(&prefix, "name"), service),
            KvOp::set(field_key(&prefix, "user"), user),
            KvOp::set(field_key(&prefix, "password"), password.expose()),
            KvOp::set(field_key(&prefix, "host"), server.host.as_str()),
            KvOp::set(field_key(&prefix, "port"), port),
        ];

        self.store.transaction_write(&ops).await.map_err(|e| {
            tracing::error!(error = %e, "Can't write database record, please retry later");
            e
        })?;

        tracing::info!(service = %service, "Database record written");
        Ok(())
    }

    /// Make sure `service` has a database, `user` can reach it, and the
    /// config store describes it. Safe to re-run until it succeeds.
    ///
    /// The GRANT password is the recorded one when a record exists, else a
    /// freshly generated candidate. The record is rewritten only when the
    /// database was created, a grant set changed, or no record exists yet.
    #[tracing::instrument(skip_all, fields(service = %service, user = %user))]
    pub async fn provision(&self, service: &str, user: &str) -> crate::Result<DatabaseOutcome> {
        sql::validate_identifier(service)?;
        sql::validate_identifier(user)?;

        let server = self.resolve_server().await?;

        let candidate = self.secrets.generate();
        let record_key = field_key(&self.tenant.db_record_prefix(service), "password");
        let (password, recorded) = match self.store.get(&record_key).await? {
            Some(existing) => (Password::new(existing), true),
            None => (candidate, false),
        };

        let mut session = self.connector.connect(&server).await?;
        let result = self
            .provision_on(session.as_mut(), service, user, &password, &server, recorded)
            .await;

        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "Failed to close database connection");
        }

        let outcome = result?;
        if !outcome.record_synced {
            tracing::info!("Database already fully provisioned");
        }
        Ok(outcome)
    }

    async fn provision_on(
        &self,
        session: &mut dyn SqlSession,
        service: &str,
        user: &str,
        password: &Password,
        server: &ServerDescriptor,
        recorded: bool,
    ) -> crate::Result<DatabaseOutcome> {
        let created = self.ensure_database(session, service).await?;
        let grants_changed = self.ensure_grants(session, service, user, password).await?;

        // A missing record means the GRANTs just set an unrecorded password.
        let record_synced = created || grants_changed || !recorded;
        if record_synced {
            self.sync_record(service, user, password, server).await?;
        }

        Ok(DatabaseOutcome {
            database: service.to_string(),
            user: user.to_string(),
            created,
            grants_changed,
            record_synced,
        })
    }
}

/// Exact catalog lookup. A failed lookup cannot be told apart from an
/// unsupported one, so it is an error rather than "absent".
async fn probe_schema(
    session: &mut dyn SqlSession,
    database: &str,
) -> Result<Existence, DatabaseError> {
    match session.query(&sql::schema_exists(database)?).await {
        Ok(rows) if rows.is_empty() => Ok(Existence::Absent),
        Ok(_) => Ok(Existence::Exists),
        Err(DatabaseError::Exec { reason, .. }) => Err(DatabaseError::AmbiguousExistence {
            database: database.to_string(),
            reason,
        }),
        Err(e) => Err(e),
    }
}

/// The grant listing for one account, or `None` when the server would not
/// show it. Connection failures still abort.
async fn observe_grants(
    session: &mut dyn SqlSession,
    user: &str,
    host: &str,
) -> Result<Option<String>, DatabaseError> {
    match session.query(&sql::show_grants(user, host)?).await {
        Ok(rows) => Ok(Some(
            rows.into_iter()
                .map(|row| row.join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
        )),
        Err(DatabaseError::Exec { intent, reason }) => {
            tracing::warn!(intent = %intent, reason = %reason, "Grant query failed");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// `localhost`, `%`, and the server's own hostname, without duplicates.
async fn grant_hosts(session: &mut dyn SqlSession) -> Vec<String> {
    let mut hosts: Vec<String> = GRANT_HOSTS.iter().map(|h| h.to_string()).collect();

    match session.query(&sql::server_hostname()).await {
        Ok(rows) => {
            let own = rows.into_iter().next().and_then(|row| row.into_iter().next());
            match own {
                Some(name) if !name.is_empty() => hosts.push(name),
                _ => tracing::warn!("Server reported no hostname"),
            }
        }
        Err(e) => tracing::warn!(error = %e, "Can't read server hostname"),
    }

    let mut seen = BTreeSet::new();
    hosts.retain(|h| seen.insert(h.clone()));
    hosts
}

// ─── Tests ───────────────────────────────────────────────────────────────────
