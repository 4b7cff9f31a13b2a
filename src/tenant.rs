// Firkinize — Tenant scope and key layout
//
// Every key a provisioning call reads or writes is derived here from the
// (customer, region) pair. The layout is shared with existing deployments
// and must stay bit-exact.

/// The `(customer, region)` pair that scopes all keys for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    customer_id: String,
    region_id: String,
    customer_prefix: String,
    region_prefix: String,
    services_prefix: String,
}

impl TenantScope {
    pub fn new(customer_id: impl Into<String>, region_id: impl Into<String>) -> Self {
        let customer_id = customer_id.into();
        let region_id = region_id.into();
        let customer_prefix = format!("customers/{}", customer_id);
        let region_prefix = format!("{}/regions/{}", customer_prefix, region_id);
        let services_prefix = format!("{}/services", region_prefix);

        Self {
            customer_id,
            region_id,
            customer_prefix,
            region_prefix,
            services_prefix,
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    /// `customers/{customer}`
    pub fn customer_prefix(&self) -> &str {
        &self.customer_prefix
    }

    /// `customers/{customer}/regions/{region}`
    pub fn region_prefix(&self) -> &str {
        &self.region_prefix
    }

    /// `customers/{customer}/regions/{region}/services`
    pub fn services_prefix(&self) -> &str {
        &self.services_prefix
    }

    pub fn fqdn_key(&self) -> String {
        format!("{}/fqdn", self.customer_prefix)
    }

    /// Pointer to the key-path describing the database server for this tenant.
    pub fn dbserver_pointer_key(&self) -> String {
        format!("{}/keystone/dbserver_key", self.customer_prefix)
    }

    /// Global (customer-wide) identity, the source of truth for the password.
    pub fn global_user_prefix(&self, service: &str) -> String {
        format!("{}/keystone/users/{}", self.customer_prefix, service)
    }

    /// Region-scoped mirror of the global identity.
    pub fn region_user_prefix(&self, service: &str) -> String {
        format!("{}/{}/keystone_user", self.services_prefix, service)
    }

    /// Note the region component is the full region prefix, not just its id.
    pub fn endpoint_prefix(&self, service: &str) -> String {
        format!(
            "{}/keystone/endpoints/{}/{}",
            self.customer_prefix, self.region_prefix, service
        )
    }

    pub fn db_record_prefix(&self, service: &str) -> String {
        format!("{}/{}/db", self.customer_prefix, service)
    }
}

/// Join a prefix and a field name into a full key.
pub fn field_key(prefix: &str, field: &str) -> String {
    format!("{}/{}", prefix, field)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantScope {
        TenantScope::new("c1", "r1")
    }

    #[test]
    fn test_prefixes_nest_under_customer() {
        let t = tenant();
        assert_eq!(t.customer_prefix(), "customers/c1");
        assert_eq!(t.region_prefix(), "customers/c1/regions/r1");
        assert_eq!(t.services_prefix(), "customers/c1/regions/r1/services");
    }

    #[test]
    fn test_identity_keys_match_deployed_layout() {
        let t = tenant();
        assert_eq!(t.fqdn_key(), "customers/c1/fqdn");
        assert_eq!(t.dbserver_pointer_key(), "customers/c1/keystone/dbserver_key");
        assert_eq!(
            field_key(&t.global_user_prefix("qbert"), "password"),
            "customers/c1/keystone/users/qbert/password"
        );
        assert_eq!(
            field_key(&t.region_user_prefix("qbert"), "email"),
            "customers/c1/regions/r1/services/qbert/keystone_user/email"
        );
    }

    #[test]
    fn test_endpoint_key_embeds_full_region_prefix() {
        let t = tenant();
        assert_eq!(
            field_key(&t.endpoint_prefix("qbert"), "internal_url"),
            "customers/c1/keystone/endpoints/customers/c1/regions/r1/qbert/internal_url"
        );
    }

    #[test]
    fn test_db_record_key() {
        let t = tenant();
        assert_eq!(
            field_key(&t.db_record_prefix("qbert"), "port"),
            "customers/c1/qbert/db/port"
        );
    }

    #[test]
    fn test_all_service_keys_fall_under_customer_prefix() {
        let t = tenant();
        let prefixes = [
            t.fqdn_key(),
            t.dbserver_pointer_key(),
            t.global_user_prefix("svc"),
            t.region_user_prefix("svc"),
            t.endpoint_prefix("svc"),
            t.db_record_prefix("svc"),
        ];
        for p in prefixes {
            assert!(p.starts_with("customers/c1/"), "{} escapes the tenant", p);
        }
    }
}
