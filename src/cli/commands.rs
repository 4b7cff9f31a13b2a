// Firkinize — CLI Command Handlers
//
// Each function handles one CLI subcommand. They build the provisioners
// from the shared tenant scope, config store, and secret generator. Only
// explicitly requested values are written to stdout; everything else goes
// to the log on stderr.

use crate::database::MySqlConnector;
use crate::error::Result;
use crate::provision::{self, CredentialProvisioner, DatabaseProvisioner};
use crate::secret::{RandomSecretGenerator, SecretGenerator};
use crate::store::{ConfigStore, ConsulSettings, ConsulStore};
use crate::tenant::TenantScope;

use super::{Cli, Commands};

/// Shared collaborators for one invocation.
struct Context {
    tenant: TenantScope,
    store: ConsulStore,
    secrets: RandomSecretGenerator<rand::rngs::StdRng>,
}

impl Context {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let settings = &cli.settings;
        let store = ConsulStore::new(&ConsulSettings {
            host_port: settings.consul_host_port.clone(),
            scheme: settings.consul_scheme.clone(),
            token: settings.consul_token.clone(),
        })?;

        Ok(Self {
            tenant: TenantScope::new(&settings.customer_id, &settings.region_id),
            store,
            secrets: RandomSecretGenerator::from_os_rng(),
        })
    }
}

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let ctx = Context::from_cli(&cli)?;
    tracing::debug!(
        customer = %ctx.tenant.customer_id(),
        region = %ctx.tenant.region_id(),
        "Config store client ready"
    );

    match cli.command {
        Commands::AddKeystone {
            service_name,
            ingress_suffix,
        } => cmd_add_keystone(&ctx.store, &ctx.secrets, &ctx.tenant, &service_name, &ingress_suffix).await,
        Commands::GetKeystone { service_name } => {
            cmd_get_keystone(&ctx.store, &ctx.tenant, &service_name).await
        }
        Commands::CreateDb {
            service_name,
            db_user,
        } => {
            let user = db_user.unwrap_or_else(|| service_name.clone());
            cmd_create_db(&ctx.store, &ctx.secrets, &ctx.tenant, &service_name, &user).await
        }
    }
}

// ─── Keystone ────────────────────────────────────────────────────────────────

async fn cmd_add_keystone(
    store: &dyn ConfigStore,
    secrets: &dyn SecretGenerator,
    tenant: &TenantScope,
    service: &str,
    ingress_suffix: &str,
) -> Result<()> {
    let provisioner = CredentialProvisioner::new(store, secrets, tenant);

    tracing::debug!("Adding keystone endpoint");
    provisioner.ensure_endpoint(service, ingress_suffix).await?;

    tracing::debug!("Adding keystone user");
    provisioner.ensure_user(service).await?;

    Ok(())
}

async fn cmd_get_keystone(store: &dyn ConfigStore, tenant: &TenantScope, service: &str) -> Result<()> {
    let password = provision::get_password(store, tenant, service).await?;
    println!("{}", password.expose());

    Ok(())
}

// ─── Database ────────────────────────────────────────────────────────────────

async fn cmd_create_db(
    store: &dyn ConfigStore,
    secrets: &dyn SecretGenerator,
    tenant: &TenantScope,
    service: &str,
    user: &str,
) -> Result<()> {
    let connector = MySqlConnector::new();
    let provisioner = DatabaseProvisioner::new(store, secrets, &connector, tenant);

    let outcome = provisioner.provision(service, user).await.map_err(|e| {
        tracing::error!("Error creating DB");
        e
    })?;

    tracing::debug!(
        created = outcome.created,
        grants_changed = outcome.grants_changed,
        record_synced = outcome.record_synced,
        "Database provisioning finished"
    );
    println!("db_name:  {}", outcome.database);

    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FirkinizeError;
    use crate::secret::mock::SequenceGenerator;
    use crate::store::mock::MemoryStore;

    #[tokio::test]
    async fn test_add_keystone_writes_endpoint_and_user() {
        let store = MemoryStore::with_values([("customers/c1/fqdn", "example.com")]);
        let secrets = SequenceGenerator::new();
        let tenant = TenantScope::new("c1", "r1");

        cmd_add_keystone(&store, &secrets, &tenant, "foo", "foo/v1").await.unwrap();

        assert_eq!(store.transactions(), 2);
        assert_eq!(
            store.value("customers/c1/keystone/users/foo/password"),
            Some(SequenceGenerator::nth(0))
        );
    }

    #[tokio::test]
    async fn test_add_keystone_stops_at_first_error() {
        let store = MemoryStore::new();
        let secrets = SequenceGenerator::new();
        let tenant = TenantScope::new("c1", "r1");

        let err = cmd_add_keystone(&store, &secrets, &tenant, "foo", "foo/v1")
            .await
            .unwrap_err();
        assert!(matches!(err, FirkinizeError::Store(_)));
        assert_eq!(secrets.calls(), 0, "The user step must not run after a failed endpoint");
    }

    #[tokio::test]
    async fn test_get_keystone_missing_password_fails() {
        let store = MemoryStore::new();
        let tenant = TenantScope::new("c1", "r1");

        assert!(cmd_get_keystone(&store, &tenant, "foo").await.is_err());
    }

    #[tokio::test]
    async fn test_get_keystone_reads_without_writing() {
        let store = MemoryStore::with_values([("customers/c1/keystone/users/foo/password", "pw-foo")]);
        let tenant = TenantScope::new("c1", "r1");

        cmd_get_keystone(&store, &tenant, "foo").await.unwrap();
        assert_eq!(store.transactions(), 0);
    }
}
