//! Group manager (C7): lifecycle of membership in at-most-one secure
//! group (spec.md §4.7). Subscription lifecycle is coordinated with a
//! `Transport`, which is passed in by the caller rather than owned here
//! (mirrors `request`/`contract` keeping transport ownership in
//! `Client`).

use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::naming;
use crate::transport::{SubscriptionHandle, Transport};

struct GroupMembership {
    group_id: String,
    subscription_handle: SubscriptionHandle,
}

/// A single mutex-protected slot: joins/leaves are linearizable
/// (spec.md §5).
#[derive(Default)]
pub struct GroupManager {
    state: Mutex<Option<GroupMembership>>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `group_id`, leaving any previously-active group first.
    /// Idempotent if already a member of `group_id`.
    pub async fn join<T: Transport + ?Sized>(
        &self,
        transport: &T,
        on_message: crate::transport::OnMessage,
        group_id: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.as_ref() {
            if existing.group_id == group_id {
                return Ok(());
            }
            transport.unsubscribe(existing.subscription_handle).await?;
        }

        let handle = transport
            .subscribe(&naming::group_pattern(group_id), on_message)
            .await?;

        *state = Some(GroupMembership {
            group_id: group_id.to_string(),
            subscription_handle: handle,
        });
        Ok(())
    }

    /// Leave the active group, if any. Idempotent.
    pub async fn leave<T: Transport + ?Sized>(&self, transport: &T) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.take() {
            transport.unsubscribe(existing.subscription_handle).await?;
        }
        Ok(())
    }

    pub async fn current_group(&self) -> Option<String> {
        self.state.lock().await.as_ref().map(|g| g.group_id.clone())
    }

    pub async fn in_group(&self) -> bool {
        self.state.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use std::sync::Arc;

    fn noop() -> crate::transport::OnMessage {
        Arc::new(|_c, _b| {})
    }

    #[tokio::test]
    async fn join_then_switch_leaves_previous_channel() {
        let transport = InMemoryTransport::new();
        let mgr = GroupManager::new();

        mgr.join(&transport, noop(), "g1").await.unwrap();
        assert_eq!(mgr.current_group().await, Some("g1".to_string()));

        mgr.join(&transport, noop(), "g2").await.unwrap();
        assert_eq!(mgr.current_group().await, Some("g2".to_string()));
    }

    #[tokio::test]
    async fn join_same_group_is_idempotent() {
        let transport = InMemoryTransport::new();
        let mgr = GroupManager::new();

        mgr.join(&transport, noop(), "g1").await.unwrap();
        mgr.join(&transport, noop(), "g1").await.unwrap();
        assert_eq!(mgr.current_group().await, Some("g1".to_string()));
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let transport = InMemoryTransport::new();
        let mgr = GroupManager::new();

        mgr.leave(&transport).await.unwrap();
        assert!(!mgr.in_group().await);

        mgr.join(&transport, noop(), "g1").await.unwrap();
        mgr.leave(&transport).await.unwrap();
        mgr.leave(&transport).await.unwrap();
        assert!(!mgr.in_group().await);
    }
}
