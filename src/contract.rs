//! Contract auctioneer (C6): two-phase sealed-bid, single-winner task
//! assignment with a deadline (spec.md §4.6).

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::RwLock;

use crate::envelope::Metadata;

/// What a bidder's `on_open` callback decides. `Decline` is a sentinel
/// distinct from `Bid(0.0)` (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BidDecision {
    Bid(f64),
    Decline,
}

/// Bidder-side callbacks for one contract topic.
pub type OnOpen = Arc<dyn Fn(Metadata) -> BidDecision + Send + Sync>;
pub type OnWin = Arc<dyn Fn(Metadata) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
pub struct ContractHandler {
    pub on_open: OnOpen,
    pub on_win: OnWin,
}

/// Bidder-side registry: topic -> (on_open, on_win). One entry per topic,
/// re-registration replaces (mirrors C4's handler tables).
#[derive(Default)]
pub struct ContractRegistry {
    handlers: RwLock<HashMap<String, ContractHandler>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, topic: impl Into<String>, handler: ContractHandler) {
        self.handlers.write().await.insert(topic.into(), handler);
    }

    pub async fn lookup(&self, topic: &str) -> Option<ContractHandler> {
        self.handlers.read().await.get(topic).cloned()
    }
}

/// Options for `collect_bids` (spec.md §4.6).
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    pub valid_bidders: Option<HashSet<String>>,
    pub min_bid: f64,
    pub deadline: Option<Duration>,
}

/// Auctioneer-side bookkeeping for one open contract.
struct OpenContract {
    valid_bidders: Option<HashSet<String>>,
    min_bid: f64,
    bids: Mutex<Vec<(String, f64, Instant)>>,
}

impl OpenContract {
    fn accepts(&self, from: &str, value: f64) -> bool {
        if value < self.min_bid {
            return false;
        }
        match &self.valid_bidders {
            Some(set) => set.contains(from),
            None => true,
        }
    }
}

/// Pick the winner: highest bid value; tie-break by earliest arrival;
/// further ties by lexicographic `from` (spec.md §4.6).
fn pick_winner(bids: &[(String, f64, Instant)]) -> Option<(String, f64)> {
    bids.iter()
        .min_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .reverse()
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.0.cmp(&b.0))
        })
        .map(|(from, value, _)| (from.clone(), *value))
}

/// Collects `bid_submit` envelopes for open contracts and resolves
/// winners at their deadline.
#[derive(Default)]
pub struct AuctionCoordinator {
    open: RwLock<HashMap<String, Arc<OpenContract>>>,
}

impl AuctionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, correlation_id: String, options: &CollectOptions) {
        let contract = Arc::new(OpenContract {
            valid_bidders: options.valid_bidders.clone(),
            min_bid: options.min_bid,
            bids: Mutex::new(Vec::new()),
        });
        self.open.write().await.insert(correlation_id, contract);
    }

    /// Record an inbound `bid_submit`. Ineligible bids (wrong bidder,
    /// below `min_bid`) are ignored, as are bids for an unknown or
    /// already-closed correlation id.
    pub async fn record_bid(&self, correlation_id: &str, from: &str, value: f64) {
        let contract = {
            let table = self.open.read().await;
            match table.get(correlation_id) {
                Some(c) => c.clone(),
                None => return,
            }
        };
        if !contract.accepts(from, value) {
            return;
        }
        contract
            .bids
            .lock()
            .push((from.to_string(), value, Instant::now()));
    }

    /// Wait out the bidding window, then remove the contract and return
    /// its winner, if any (spec.md: "no eligible bids" is not an error,
    /// just an empty/no-winner outcome).
    pub async fn resolve(&self, correlation_id: &str, deadline: Duration) -> Option<(String, f64)> {
        tokio::time::sleep(deadline).await;
        let contract = self.open.write().await.remove(correlation_id)?;
        let bids = contract.bids.lock().clone();
        pick_winner(&bids)
    }

    pub async fn drain(&self) {
        self.open.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_bids_means_no_winner() {
        let coord = AuctionCoordinator::new();
        coord
            .register("c1".into(), &CollectOptions::default())
            .await;
        let winner = coord.resolve("c1", Duration::from_millis(10)).await;
        assert!(winner.is_none());
    }

    #[tokio::test]
    async fn highest_bid_wins() {
        let coord = AuctionCoordinator::new();
        coord
            .register("c2".into(), &CollectOptions::default())
            .await;
        coord.record_bid("c2", "alice", 0.3).await;
        coord.record_bid("c2", "bob", 0.9).await;

        let winner = coord.resolve("c2", Duration::from_millis(10)).await;
        assert_eq!(winner, Some(("bob".to_string(), 0.9)));
    }

    #[tokio::test]
    async fn tie_break_by_earliest_arrival() {
        let coord = AuctionCoordinator::new();
        coord
            .register("c3".into(), &CollectOptions::default())
            .await;
        coord.record_bid("c3", "bob", 0.5).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        coord.record_bid("c3", "carol", 0.5).await;

        let winner = coord.resolve("c3", Duration::from_millis(10)).await;
        assert_eq!(winner, Some(("bob".to_string(), 0.5)));
    }

    #[tokio::test]
    async fn ineligible_bids_are_excluded() {
        let mut valid = HashSet::new();
        valid.insert("bob".to_string());
        let options = CollectOptions {
            valid_bidders: Some(valid),
            min_bid: 0.2,
            deadline: None,
        };

        let coord = AuctionCoordinator::new();
        coord.register("c4".into(), &options).await;
        coord.record_bid("c4", "alice", 0.99).await; // not in valid_bidders
        coord.record_bid("c4", "bob", 0.1).await; // below min_bid
        coord.record_bid("c4", "bob", 0.5).await; // eligible

        let winner = coord.resolve("c4", Duration::from_millis(10)).await;
        assert_eq!(winner, Some(("bob".to_string(), 0.5)));
    }
}
