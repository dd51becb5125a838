//! Registry façade (C8): namespaced key/value store layered on the
//! transport's KV primitives, JSON-encoded (spec.md §4.8).

use std::sync::Arc;

use serde_json::Value;

use crate::error::RegistryError;
use crate::transport::Transport;

/// A namespaced view over the shared registry. Cheap to construct;
/// `Client::registry(namespace)` hands one out per call.
pub struct Registry {
    transport: Arc<dyn Transport>,
    namespace: String,
    key_prefix: String,
}

impl Registry {
    pub(crate) fn new(transport: Arc<dyn Transport>, namespace: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            namespace: namespace.into(),
            key_prefix: key_prefix.into(),
        }
    }

    /// `<optional-prefix><namespace>.<key>`, or `<optional-prefix><key>`
    /// when the namespace is empty (spec.md §4.8, §6).
    fn compose(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            format!("{}{}", self.key_prefix, key)
        } else {
            format!("{}{}.{}", self.key_prefix, self.namespace, key)
        }
    }

    pub async fn put(&self, key: &str, value: &Value) -> Result<(), RegistryError> {
        let bytes = serde_json::to_vec(value).map_err(|e| RegistryError::Transport(
            crate::error::TransportError::Kv {
                op: "put",
                key: key.to_string(),
                reason: e.to_string(),
            },
        ))?;
        self.transport.kv_put(&self.compose(key), bytes).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Value, RegistryError> {
        match self.transport.kv_get(&self.compose(key)).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                RegistryError::Transport(crate::error::TransportError::Kv {
                    op: "get",
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }),
            None => Err(RegistryError::Missing { key: key.to_string() }),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        self.transport.kv_delete(&self.compose(key)).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, RegistryError> {
        Ok(self.transport.kv_exists(&self.compose(key)).await?)
    }
}
