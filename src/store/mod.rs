// Firkinize — Config Store Module
//
// Contract for the hierarchical key-value store holding tenant
// configuration, plus the Consul adapter that implements it.
// Reads treat an empty value exactly like an absent key. Writes go
// through all-or-nothing transactions.

mod consul;
mod error;

use async_trait::async_trait;

pub use consul::{ConsulSettings, ConsulStore};
pub use error::StoreError;

// ─── Operations ──────────────────────────────────────────────────────────────

/// One write inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    /// Unconditional write.
    Set { key: String, value: String },
    /// Write only if the key does not exist yet; otherwise the whole
    /// transaction is rolled back with `StoreError::Conflict`.
    Create { key: String, value: String },
}

impl KvOp {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        KvOp::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn create(key: impl Into<String>, value: impl Into<String>) -> Self {
        KvOp::Create {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            KvOp::Set { key, .. } | KvOp::Create { key, .. } => key,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            KvOp::Set { value, .. } | KvOp::Create { value, .. } => value,
        }
    }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the configuration store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read a scalar value. Returns `None` when the key is absent or empty.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Apply all `ops` atomically. Either every key is written or none is.
    async fn transaction_write(&self, ops: &[KvOp]) -> Result<(), StoreError>;
}

/// Read a key that must be present.
pub async fn require(store: &dyn ConfigStore, key: &str) -> Result<String, StoreError> {
    match store.get(key).await? {
        Some(value) => Ok(value),
        None => Err(StoreError::NotFound(key.to_string())),
    }
}

// ─── In-Memory Store for Testing ─────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::MemoryStore;
    use super::*;

    #[tokio::test]
    async fn test_empty_value_reads_as_absent() {
        let store = MemoryStore::with_values([("a", ""), ("b", "x")]);
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), Some("x".to_string()));
        assert_eq!(store.get("c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_require_reports_missing_key() {
        let store = MemoryStore::new();
        let err = require(&store, "customers/c1/fqdn").await.unwrap_err();
        match err {
            StoreError::NotFound(key) => assert_eq!(key, "customers/c1/fqdn"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_no_key_updated() {
        let store = MemoryStore::with_values([("k1", "old1"), ("k2", "old2")]);
        let before = store.snapshot();

        store.fail_next_transaction_at(2);
        let ops = vec![
            KvOp::set("k1", "new1"),
            KvOp::set("k2", "new2"),
            KvOp::set("k3", "new3"),
        ];
        let result = store.transaction_write(&ops).await;

        assert!(matches!(result, Err(StoreError::Write(_))));
        assert_eq!(store.snapshot(), before, "A rejected batch must not leak partial writes");
    }

    #[tokio::test]
    async fn test_create_conflicts_on_existing_key() {
        let store = MemoryStore::with_values([("k", "v")]);
        let result = store
            .transaction_write(&[KvOp::set("other", "x"), KvOp::create("k", "w")])
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(ref k)) if k == "k"));
        assert_eq!(store.value("k").as_deref(), Some("v"));
        assert_eq!(store.value("other"), None);
    }
}
