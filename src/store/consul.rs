// Firkinize — Consul KV adapter
//
// Implements `ConfigStore` on top of the Consul HTTP API:
//   GET /v1/kv/<key>?raw   single-value reads
//   PUT /v1/txn            atomic multi-key writes
//
// Transaction values are base64-encoded as the Consul API requires.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::{ConfigStore, KvOp, StoreError};

/// Header carrying the ACL token.
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Connection parameters for a Consul agent.
#[derive(Debug, Clone)]
pub struct ConsulSettings {
    /// `host:port` of the agent.
    pub host_port: String,
    /// `http` or `https`.
    pub scheme: String,
    pub token: Option<String>,
}

impl ConsulSettings {
    fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host_port.trim_end_matches('/'))
    }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TxnOp<'a> {
    #[serde(rename = "KV")]
    kv: TxnKv<'a>,
}

#[derive(Debug, Serialize)]
struct TxnKv<'a> {
    #[serde(rename = "Verb")]
    verb: &'static str,
    #[serde(rename = "Key")]
    key: &'a str,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "Index", skip_serializing_if = "Option::is_none")]
    index: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TxnResponse {
    #[serde(rename = "Errors", default)]
    errors: Option<Vec<TxnError>>,
}

#[derive(Debug, Deserialize)]
struct TxnError {
    #[serde(rename = "OpIndex", default)]
    op_index: usize,
    #[serde(rename = "What", default)]
    what: String,
}

/// Encode ops into the body of a `PUT /v1/txn` request.
fn build_txn_body(ops: &[KvOp]) -> Vec<TxnOp<'_>> {
    ops.iter()
        .map(|op| {
            let (verb, index) = match op {
                KvOp::Set { .. } => ("set", None),
                // cas with index 0 only succeeds when the key does not exist
                KvOp::Create { .. } => ("cas", Some(0)),
            };
            TxnOp {
                kv: TxnKv {
                    verb,
                    key: op.key(),
                    value: BASE64.encode(op.value()),
                    index,
                },
            }
        })
        .collect()
}

/// Turn a rolled-back transaction response into the matching error.
fn rollback_error(ops: &[KvOp], body: &str) -> StoreError {
    let parsed: TxnResponse = serde_json::from_str(body).unwrap_or_default();
    let errors = parsed.errors.unwrap_or_default();

    for e in &errors {
        if let Some(KvOp::Create { key, .. }) = ops.get(e.op_index) {
            return StoreError::Conflict(key.clone());
        }
    }

    let reasons: Vec<String> = errors
        .iter()
        .map(|e| format!("op {}: {}", e.op_index, e.what))
        .collect();
    if reasons.is_empty() {
        StoreError::Write("transaction rolled back".to_string())
    } else {
        StoreError::Write(reasons.join("; "))
    }
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct ConsulStore {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl ConsulStore {
    pub fn new(settings: &ConsulSettings) -> Result<Self, StoreError> {
        let address = settings.base_url();
        let base_url = Url::parse(&address)
            .map_err(|e| StoreError::Client(format!("invalid Consul address {}: {}", address, e)))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StoreError::Client(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(address = %base_url, "Consul client configured");

        Ok(Self {
            client,
            base_url,
            token: settings.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// `base_url` joined with `segments`, each percent-encoded on its own.
    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Client(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET` target for a single raw value. Slashes in `key` separate path
    /// segments; any other reserved character is escaped.
    fn kv_url(&self, key: &str) -> Result<Url, StoreError> {
        let mut url = self.endpoint(["v1", "kv"].into_iter().chain(key.split('/')))?;
        url.set_query(Some("raw"));
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }
}

#[async_trait]
impl ConfigStore for ConsulStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let url = self.kv_url(key)?;
        let read_err = |reason: String| StoreError::Read {
            key: key.to_string(),
            reason,
        };

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| read_err(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.text().await.map_err(|e| read_err(e.to_string()))?;
                Ok(Some(body).filter(|v| !v.is_empty()))
            }
            status => Err(read_err(format!("HTTP {}", status))),
        }
    }

    async fn transaction_write(&self, ops: &[KvOp]) -> Result<(), StoreError> {
        let url = self.endpoint(["v1", "txn"])?;
        let body = build_txn_body(ops);

        let response = self
            .authorize(self.client.put(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(ops = ops.len(), "Consul transaction committed");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return Err(rollback_error(ops, &text));
        }
        Err(StoreError::Write(format!("HTTP {}", status)))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_txn_body_encodes_values_and_verbs() {
        let ops = vec![
            KvOp::set("customers/c1/a", "https://example.com/foo"),
            KvOp::create("customers/c1/b", "secret"),
        ];
        let body = serde_json::to_value(build_txn_body(&ops)).unwrap();

        assert_eq!(
            body,
            json!([
                {"KV": {"Verb": "set", "Key": "customers/c1/a",
                        "Value": BASE64.encode("https://example.com/foo")}},
                {"KV": {"Verb": "cas", "Key": "customers/c1/b",
                        "Value": BASE64.encode("secret"), "Index": 0}},
            ])
        );
    }

    #[test]
    fn test_rollback_on_create_is_conflict() {
        let ops = vec![KvOp::set("a", "1"), KvOp::create("b", "2")];
        let body = r#"{"Results":null,"Errors":[{"OpIndex":1,"What":"failed to set key \"b\", index is stale"}]}"#;
        match rollback_error(&ops, body) {
            StoreError::Conflict(key) => assert_eq!(key, "b"),
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_rollback_on_set_is_write_error() {
        let ops = vec![KvOp::set("a", "1")];
        let body = r#"{"Errors":[{"OpIndex":0,"What":"permission denied"}]}"#;
        match rollback_error(&ops, body) {
            StoreError::Write(reason) => assert!(reason.contains("permission denied")),
            other => panic!("Expected Write, got {:?}", other),
        }
    }

    #[test]
    fn test_rollback_with_unparseable_body() {
        let err = rollback_error(&[KvOp::set("a", "1")], "not json");
        assert!(matches!(err, StoreError::Write(_)));
    }

    #[test]
    fn test_base_url_and_empty_token() {
        let settings = ConsulSettings {
            host_port: "consul.local:8500/".to_string(),
            scheme: "https".to_string(),
            token: Some(String::new()),
        };
        let store = ConsulStore::new(&settings).unwrap();
        assert_eq!(store.base_url.as_str(), "https://consul.local:8500/");
        assert!(store.token.is_none());
    }

    fn local_store() -> ConsulStore {
        ConsulStore::new(&ConsulSettings {
            host_port: "consul.local:8500".to_string(),
            scheme: "http".to_string(),
            token: None,
        })
        .unwrap()
    }

    #[test]
    fn test_kv_url_keeps_key_hierarchy() {
        let url = local_store().kv_url("customers/c1/keystone/users/foo/password").unwrap();
        assert_eq!(
            url.as_str(),
            "http://consul.local:8500/v1/kv/customers/c1/keystone/users/foo/password?raw"
        );
    }

    #[test]
    fn test_kv_url_escapes_reserved_characters() {
        let url = local_store().kv_url("customers/c1/svc#a?b/db/name").unwrap();
        assert_eq!(
            url.as_str(),
            "http://consul.local:8500/v1/kv/customers/c1/svc%23a%3Fb/db/name?raw"
        );
    }

    #[test]
    fn test_txn_url() {
        let url = local_store().endpoint(["v1", "txn"]).unwrap();
        assert_eq!(url.as_str(), "http://consul.local:8500/v1/txn");
    }

    #[test]
    fn test_unparseable_address_is_client_error() {
        let settings = ConsulSettings {
            host_port: "consul local:8500".to_string(),
            scheme: "http".to_string(),
            token: None,
        };
        assert!(matches!(ConsulStore::new(&settings), Err(StoreError::Client(_))));
    }
}
