//! Client configuration: pure data, no executors or transport handles,
//! following the "pure config struct + builder" shape of
//! `mylm-core::agent::contract::config::KernelConfig`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default request timeout (spec.md §6): 5s.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default contract bidding window (spec.md §6): 2s.
pub const DEFAULT_CONTRACT_DEADLINE: Duration = Duration::from_secs(2);

/// Recommended minimum dispatch queue bound (spec.md §5).
pub const DEFAULT_DISPATCH_QUEUE_BOUND: usize = 1024;

/// Configuration for a [`crate::Client`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// This client's identity string (spec.md §3).
    pub identity: String,

    /// Default timeout for `request`/`map` when the caller doesn't
    /// override it.
    pub request_timeout: Duration,

    /// Default bidding window for `collect_bids`.
    pub contract_deadline: Duration,

    /// Number of worker tasks the dispatcher uses to run handlers.
    /// `0` means "use available parallelism".
    pub workers: usize,

    /// Bound of the inbound dispatch queue (spec.md §5 backpressure).
    pub dispatch_queue_bound: usize,

    /// Prefix prepended to registry keys when no namespace is given
    /// (spec.md §4.8, §6).
    pub registry_key_prefix: String,
}

impl ClientConfig {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            contract_deadline: DEFAULT_CONTRACT_DEADLINE,
            workers: 0,
            dispatch_queue_bound: DEFAULT_DISPATCH_QUEUE_BOUND,
            registry_key_prefix: String::new(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_contract_deadline(mut self, deadline: Duration) -> Self {
        self.contract_deadline = deadline;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_dispatch_queue_bound(mut self, bound: usize) -> Self {
        self.dispatch_queue_bound = bound;
        self
    }

    pub fn with_registry_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.registry_key_prefix = prefix.into();
        self
    }

    pub(crate) fn worker_count(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.workers
        }
    }
}
