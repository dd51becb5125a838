//! Request/response coordinator (C5): correlation table, deadline
//! handling, and fan-out aggregation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Notify, RwLock};

use crate::envelope::ErrorPayload;

/// The outcome recorded for one target of a `request`/`map` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Payload(Value),
    HandlerError(ErrorPayload),
    Timeout,
}

impl ResponseOutcome {
    pub fn from_payload(payload: Value) -> Self {
        match ErrorPayload::from_value(&payload) {
            Some(err) => ResponseOutcome::HandlerError(err),
            None => ResponseOutcome::Payload(payload),
        }
    }
}

/// Bookkeeping for one in-flight correlation ID (spec.md §3 "Pending request").
pub struct Pending {
    expected: usize,
    results: Mutex<HashMap<String, ResponseOutcome>>,
    notify: Notify,
    cancelled: AtomicBool,
}

impl Pending {
    fn is_complete(&self) -> bool {
        self.results.lock().len() >= self.expected
    }

    /// Whether this entry was cancelled by a client shutdown rather than
    /// completing or timing out normally (spec.md §5).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Correlation table: concurrent-safe map of in-flight requests.
#[derive(Default)]
pub struct RequestCoordinator {
    pending: RwLock<HashMap<String, Arc<Pending>>>,
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a pending entry with `expected_count` targets
    /// (1 for a single request, N for a fan-out `map`).
    pub async fn register(&self, correlation_id: String, expected: usize) -> Arc<Pending> {
        let pending = Arc::new(Pending {
            expected,
            results: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            cancelled: AtomicBool::new(false),
        });
        self.pending
            .write()
            .await
            .insert(correlation_id, pending.clone());
        pending
    }

    /// Record an inbound `response` envelope. Only the first response
    /// per (correlation, from) is kept; later duplicates are dropped
    /// silently (spec.md §4.5). Responses for an unknown or already
    /// completed correlation id are dropped silently (expired or never
    /// existed).
    pub async fn record_response(&self, correlation_id: &str, from: &str, outcome: ResponseOutcome) {
        let pending = {
            let table = self.pending.read().await;
            match table.get(correlation_id) {
                Some(p) => p.clone(),
                None => return,
            }
        };
        {
            let mut results = pending.results.lock();
            if results.contains_key(from) {
                return;
            }
            results.insert(from.to_string(), outcome);
        }
        pending.notify.notify_one();
    }

    /// Wait until every expected response has arrived or `timeout`
    /// elapses, then remove the entry and return what was collected.
    /// Missing targets are not filled in here — callers fill them with
    /// `ResponseOutcome::Timeout` for the identities that never answered.
    pub async fn wait(
        &self,
        correlation_id: &str,
        pending: Arc<Pending>,
        timeout: Duration,
    ) -> HashMap<String, ResponseOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            if pending.is_complete() || pending.is_cancelled() {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if tokio::time::timeout(remaining, pending.notify.notified())
                .await
                .is_err()
            {
                break;
            }
        }
        self.pending.write().await.remove(correlation_id);
        pending.results.lock().clone()
    }

    /// Cancel every pending request (spec.md §5 shutdown semantics):
    /// marks each entry cancelled and wakes its waiter immediately rather
    /// than leaving it to time out on its own. Callers blocked in
    /// [`RequestCoordinator::wait`] observe this via
    /// [`Pending::is_cancelled`] and surface `RequestOutcome::Shutdown`
    /// for every target that hadn't already answered.
    pub async fn drain(&self) {
        let mut table = self.pending.write().await;
        for pending in table.values() {
            pending.cancelled.store(true, Ordering::Release);
            pending.notify.notify_one();
        }
        table.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn single_request_completes_on_response() {
        let coord = RequestCoordinator::new();
        let pending = coord.register("c1".into(), 1).await;

        coord
            .record_response("c1", "bob", ResponseOutcome::Payload(json!({"ok": true})))
            .await;

        let results = coord
            .wait("c1", pending, Duration::from_secs(1))
            .await;

        assert_eq!(
            results.get("bob"),
            Some(&ResponseOutcome::Payload(json!({"ok": true})))
        );
    }

    #[tokio::test]
    async fn timeout_with_no_response_returns_empty() {
        let coord = RequestCoordinator::new();
        let pending = coord.register("c2".into(), 1).await;

        let results = coord
            .wait("c2", pending, Duration::from_millis(20))
            .await;

        assert!(results.is_empty());
        // entry was cleaned up
        assert!(coord.pending.read().await.get("c2").is_none());
    }

    #[tokio::test]
    async fn duplicate_responses_keep_only_first() {
        let coord = RequestCoordinator::new();
        let pending = coord.register("c3".into(), 1).await;

        coord
            .record_response("c3", "bob", ResponseOutcome::Payload(json!(1)))
            .await;
        coord
            .record_response("c3", "bob", ResponseOutcome::Payload(json!(2)))
            .await;

        let results = coord.wait("c3", pending, Duration::from_secs(1)).await;
        assert_eq!(results.get("bob"), Some(&ResponseOutcome::Payload(json!(1))));
    }

    #[tokio::test]
    async fn late_response_after_completion_is_dropped() {
        let coord = RequestCoordinator::new();
        let pending = coord.register("c4".into(), 1).await;
        coord
            .record_response("c4", "bob", ResponseOutcome::Payload(json!(1)))
            .await;
        let _ = coord.wait("c4", pending, Duration::from_secs(1)).await;

        // correlation id no longer tracked; this must not panic and must
        // have no observable effect.
        coord
            .record_response("c4", "carol", ResponseOutcome::Payload(json!(2)))
            .await;
    }

    #[tokio::test]
    async fn fan_out_waits_for_all_targets() {
        let coord = RequestCoordinator::new();
        let pending = coord.register("c5".into(), 2).await;

        coord
            .record_response("c5", "bob", ResponseOutcome::Payload(json!(1)))
            .await;
        coord
            .record_response("c5", "carol", ResponseOutcome::Payload(json!(2)))
            .await;

        let results = coord.wait("c5", pending, Duration::from_secs(1)).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn drain_wakes_waiters_immediately_instead_of_timing_out() {
        let coord = Arc::new(RequestCoordinator::new());
        let pending = coord.register("c6".into(), 1).await;

        let waiter = {
            let coord = coord.clone();
            let pending = pending.clone();
            tokio::spawn(async move { coord.wait("c6", pending, Duration::from_secs(30)).await })
        };

        // give the waiter a chance to start polling before draining.
        tokio::time::sleep(Duration::from_millis(5)).await;
        coord.drain().await;

        let results = tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("drain should wake the waiter well before its 30s timeout")
            .unwrap();

        assert!(results.is_empty());
        assert!(pending.is_cancelled());
    }
}
