//! Transport adapter (C1): a thin façade over a pub/sub + key/value
//! backend. Modeled on `mylm-core::agent::contract::transport::EventTransport`
//! — an async trait boundary with a boxed-dyn extension point — but
//! reshaped around publish/subscribe-by-pattern/kv, which is what
//! spec.md §4.1 actually requires (the teacher's trait is a queue-drain
//! shape; this one is a subscribe-with-callback shape, since dispatch
//! ownership in this spec lives in the adapter's reader context, not in
//! a pull loop).

mod in_memory;

pub use in_memory::InMemoryTransport;

use async_trait::async_trait;

use crate::error::TransportError;

/// A handle returned by `subscribe`, passed back to `unsubscribe`.
pub type SubscriptionHandle = u64;

/// Callback invoked from the transport's reader context for every
/// message matching a subscribed pattern. Implementations MUST NOT
/// block here (spec.md §4.3) — the dispatcher built on top of this
/// trait hands off to worker tasks immediately.
pub type OnMessage = std::sync::Arc<dyn Fn(&str, Vec<u8>) + Send + Sync>;

/// Pluggable pub/sub + key/value backend (spec.md §4.1).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError>;

    async fn subscribe(
        &self,
        pattern: &str,
        on_message: OnMessage,
    ) -> Result<SubscriptionHandle, TransportError>;

    /// Idempotent: unsubscribing an already-removed handle is not an error.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError>;

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, TransportError>;

    async fn kv_put(&self, key: &str, value: Vec<u8>) -> Result<(), TransportError>;

    async fn kv_delete(&self, key: &str) -> Result<(), TransportError>;

    async fn kv_exists(&self, key: &str) -> Result<bool, TransportError> {
        Ok(self.kv_get(key).await?.is_some())
    }
}
