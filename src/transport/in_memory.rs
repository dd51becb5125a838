//! In-memory pub/sub + KV transport.
//!
//! Suitable for single-process fleets, tests, and doctests. Grounded on
//! `mylm-core::agent::runtime::impls::in_memory_transport::InMemoryTransport`,
//! reshaped from a point-to-point queue into a broadcast-by-pattern hub
//! (closer to what a real pub/sub backend does) since spec.md requires
//! pattern subscriptions and fan-out to every matching subscriber, not a
//! single consumer draining a queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{OnMessage, SubscriptionHandle, Transport};
use crate::error::TransportError;
use crate::naming::glob_match;

struct Subscription {
    pattern: String,
    on_message: OnMessage,
}

/// A shared in-memory message bus. Clone is cheap; clones share state.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    inner: std::sync::Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    subs: RwLock<HashMap<SubscriptionHandle, Subscription>>,
    kv: RwLock<HashMap<String, Vec<u8>>>,
    next_handle: AtomicU64,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        // Snapshot matching callbacks before invoking them so a handler
        // that subscribes/unsubscribes doesn't deadlock on the read lock.
        let matching: Vec<OnMessage> = {
            let subs = self.inner.subs.read();
            subs.values()
                .filter(|s| glob_match(&s.pattern, channel))
                .map(|s| s.on_message.clone())
                .collect()
        };
        for callback in matching {
            callback(channel, bytes.clone());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        pattern: &str,
        on_message: OnMessage,
    ) -> Result<SubscriptionHandle, TransportError> {
        let handle = self.inner.next_handle.fetch_add(1, Ordering::SeqCst);
        self.inner.subs.write().insert(
            handle,
            Subscription {
                pattern: pattern.to_string(),
                on_message,
            },
        );
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError> {
        self.inner.subs.write().remove(&handle);
        Ok(())
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inner.kv.read().get(key).cloned())
    }

    async fn kv_put(&self, key: &str, value: Vec<u8>) -> Result<(), TransportError> {
        self.inner.kv.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn kv_delete(&self, key: &str) -> Result<(), TransportError> {
        self.inner.kv.write().remove(key);
        Ok(())
    }
}
