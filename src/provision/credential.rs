// Firkinize — Credential Provisioner
//
// Creates the keystone endpoint and service user for a service. Every
// write is a single config-store transaction, so replaying an operation
// with the same inputs converges to the same values.
//
// The global user record is the source of truth for the password; the
// region-scoped copy only mirrors it. A brand-new password is written with
// create-only semantics so two racing first-time calls cannot leave
// diverging copies behind.

use crate::secret::{Password, SecretGenerator};
use crate::store::{self, ConfigStore, KvOp, StoreError};
use crate::tenant::{field_key, TenantScope};

/// Project every service user belongs to.
const SERVICE_PROJECT: &str = "services";

/// Role every service user is granted.
const SERVICE_ROLE: &str = "admin";

pub struct CredentialProvisioner<'a> {
    store: &'a dyn ConfigStore,
    secrets: &'a dyn SecretGenerator,
    tenant: &'a TenantScope,
}

impl<'a> CredentialProvisioner<'a> {
    pub fn new(
        store: &'a dyn ConfigStore,
        secrets: &'a dyn SecretGenerator,
        tenant: &'a TenantScope,
    ) -> Self {
        Self {
            store,
            secrets,
            tenant,
        }
    }

    /// Point the service's internal and admin URLs at
    /// `https://{fqdn}/{url_suffix}`.
    #[tracing::instrument(skip_all, fields(service = %service))]
    pub async fn ensure_endpoint(&self, service: &str, url_suffix: &str) -> Result<(), StoreError> {
        tracing::debug!("Creating keystone endpoint");

        let fqdn = store::require(self.store, &self.tenant.fqdn_key()).await?;
        let url = format!("https://{}/{}", fqdn, url_suffix);
        let prefix = self.tenant.endpoint_prefix(service);

        let ops = [
            KvOp::set(field_key(&prefix, "internal_url"), url.as_str()),
            KvOp::set(field_key(&prefix, "admin_url"), url.as_str()),
            KvOp::set(field_key(&prefix, "type"), service),
        ];

        self.store.transaction_write(&ops).await.map_err(|e| {
            tracing::error!(error = %e, "Can't write service endpoint config, please retry later");
            e
        })?;

        tracing::info!(url = %url, "Service endpoint configured");
        Ok(())
    }

    /// Write the service user under both the global and the region prefix,
    /// reusing the global password when one exists.
    #[tracing::instrument(skip_all, fields(service = %service))]
    pub async fn ensure_user(&self, service: &str) -> Result<(), StoreError> {
        tracing::debug!("Creating keystone user");

        let password_key = field_key(&self.tenant.global_user_prefix(service), "password");

        let result = match self.store.get(&password_key).await? {
            Some(existing) => self.write_user(service, &Password::new(existing), false).await,
            None => {
                tracing::debug!("No existing password, generating one");
                let fresh = self.secrets.generate();
                self.write_user(service, &fresh, true).await
            }
        };

        match result {
            Err(StoreError::Conflict(key)) => {
                // Another writer created the password between our read and
                // our write. Adopt theirs.
                tracing::warn!(key = %key, "Password created concurrently, adopting the stored one");
                let winner = store::require(self.store, &password_key).await?;
                self.write_user(service, &Password::new(winner), false).await?;
            }
            other => other?,
        }

        tracing::info!("Keystone user configured");
        Ok(())
    }

    async fn write_user(
        &self,
        service: &str,
        password: &Password,
        fresh: bool,
    ) -> Result<(), StoreError> {
        let ops = user_ops(
            &self.tenant.global_user_prefix(service),
            &self.tenant.region_user_prefix(service),
            service,
            password,
            fresh,
        );

        self.store.transaction_write(&ops).await.map_err(|e| {
            if !matches!(e, StoreError::Conflict(_)) {
                tracing::error!(error = %e, "Can't write keystone user config, please retry later");
            }
            e
        })
    }
}

/// The service user's password from the global record. Read-only, so it
/// needs neither a provisioner nor a secret source.
pub async fn get_password(
    store: &dyn ConfigStore,
    tenant: &TenantScope,
    service: &str,
) -> Result<Password, StoreError> {
    let key = field_key(&tenant.global_user_prefix(service), "password");
    let value = store::require(store, &key).await.map_err(|e| {
        tracing::error!(service = %service, "Can't get keystone password");
        e
    })?;
    Ok(Password::new(value))
}

/// Field writes for both identity copies. A fresh password is written
/// create-only at the global prefix.
fn user_ops(
    global_prefix: &str,
    region_prefix: &str,
    service: &str,
    password: &Password,
    fresh: bool,
) -> Vec<KvOp> {
    let mut ops = Vec::with_capacity(8);
    for (prefix, is_global) in [(global_prefix, true), (region_prefix, false)] {
        ops.push(KvOp::set(field_key(prefix, "email"), service));

        let password_key = field_key(prefix, "password");
        if fresh && is_global {
            ops.push(KvOp::create(password_key, password.expose()));
        } else {
            ops.push(KvOp::set(password_key, password.expose()));
        }

        ops.push(KvOp::set(field_key(prefix, "project"), SERVICE_PROJECT));
        ops.push(KvOp::set(field_key(prefix, "role"), SERVICE_ROLE));
    }
    ops
}

// ─── Tests ───────────────────────────────────────────────────────────────────
