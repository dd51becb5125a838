//! Handler registry (C4): tables of user-registered callbacks keyed by
//! (kind, topic). Callback closures are boxed-future `Arc<dyn Fn>`
//! values, the same shape as `mylm-core`'s `ToolFn` in
//! `agent::runtime::impls::tool_registry::ToolRegistry`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::envelope::Metadata;

/// `broadcast`/`cast`/`group` handlers return unit-or-error; only
/// `request` handlers produce a response body (spec.md §4.4).
pub type EventHandler =
    Arc<dyn Fn(Metadata, Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub type RequestHandler =
    Arc<dyn Fn(Metadata, Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Four tables: broadcast, cast, request, group. Re-registration of a
/// (kind, topic) pair silently replaces the previous entry; there are
/// no wildcard topics.
#[derive(Default)]
pub struct HandlerRegistry {
    broadcast: RwLock<HashMap<String, EventHandler>>,
    cast: RwLock<HashMap<String, EventHandler>>,
    request: RwLock<HashMap<String, RequestHandler>>,
    group: RwLock<HashMap<String, EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_broadcast(&self, topic: impl Into<String>, handler: EventHandler) {
        self.broadcast.write().await.insert(topic.into(), handler);
    }

    pub async fn register_cast(&self, topic: impl Into<String>, handler: EventHandler) {
        self.cast.write().await.insert(topic.into(), handler);
    }

    pub async fn register_request(&self, topic: impl Into<String>, handler: RequestHandler) {
        self.request.write().await.insert(topic.into(), handler);
    }

    pub async fn register_group(&self, topic: impl Into<String>, handler: EventHandler) {
        self.group.write().await.insert(topic.into(), handler);
    }

    pub async fn lookup_broadcast(&self, topic: &str) -> Option<EventHandler> {
        self.broadcast.read().await.get(topic).cloned()
    }

    pub async fn lookup_cast(&self, topic: &str) -> Option<EventHandler> {
        self.cast.read().await.get(topic).cloned()
    }

    pub async fn lookup_request(&self, topic: &str) -> Option<RequestHandler> {
        self.request.read().await.get(topic).cloned()
    }

    pub async fn lookup_group(&self, topic: &str) -> Option<EventHandler> {
        self.group.read().await.get(topic).cloned()
    }
}
