//! Public `Client` API: the single entry point tying naming, transport,
//! dispatch, handler tables, request/response, auctions, groups, and the
//! registry together (spec.md §6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::contract::{
    AuctionCoordinator, BidDecision, CollectOptions, ContractHandler, ContractRegistry, OnOpen, OnWin,
};
use crate::dispatcher::{DispatchContext, Dispatcher};
use crate::envelope::{Envelope, Kind, Metadata, ALIVE_TOPIC};
use crate::error::{ClientError, NotInGroup, RequestOutcome};
use crate::group::GroupManager;
use crate::handlers::{EventHandler, HandlerRegistry, RequestHandler};
use crate::ids::new_correlation_id;
use crate::naming;
use crate::registry::Registry;
use crate::request::{RequestCoordinator, ResponseOutcome};
use crate::transport::Transport;

/// Outcome of a single target in a `request`/`map` call (spec.md §4.5).
pub type ResponseResult = Result<Value, RequestOutcome>;

/// A client's connection to the fabric. Cloning is cheap: all state
/// lives behind `Arc`, so a clone observes the same subscriptions,
/// pending requests, and group membership as the original.
#[derive(Clone)]
pub struct Client {
    identity: String,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    handlers: Arc<HandlerRegistry>,
    requests: Arc<RequestCoordinator>,
    contracts: Arc<ContractRegistry>,
    auctions: Arc<AuctionCoordinator>,
    groups: Arc<GroupManager>,
    dispatcher: Arc<Dispatcher>,
    self_subscriptions: Arc<Vec<crate::transport::SubscriptionHandle>>,
}

impl Client {
    /// Connect to the fabric: subscribe to the broadcast channel and
    /// this identity's own channel, start the dispatcher's worker pool,
    /// and register the reserved `__alive__` liveness handler
    /// (spec.md §9 open question: `alive?` is answered automatically,
    /// not by user code).
    pub async fn connect(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ClientError> {
        let identity = config.identity.clone();
        let handlers = Arc::new(HandlerRegistry::new());
        let requests = Arc::new(RequestCoordinator::new());
        let contracts = Arc::new(ContractRegistry::new());
        let auctions = Arc::new(AuctionCoordinator::new());
        let groups = Arc::new(GroupManager::new());

        let ctx = Arc::new(DispatchContext {
            identity: identity.clone(),
            handlers: handlers.clone(),
            requests: requests.clone(),
            contracts: contracts.clone(),
            auctions: auctions.clone(),
            transport: transport.clone(),
        });
        let dispatcher = Arc::new(Dispatcher::start(
            config.dispatch_queue_bound,
            config.worker_count(),
            ctx,
        ));

        handlers
            .register_request(
                ALIVE_TOPIC,
                Arc::new(|_meta, _payload| Box::pin(async { Ok(Value::Bool(true)) })),
            )
            .await;

        let on_message = dispatcher.on_message();
        let public = transport
            .subscribe(&naming::public_pattern(), on_message.clone())
            .await?;
        let own = transport
            .subscribe(&naming::identity_pattern(&identity), on_message)
            .await?;

        Ok(Self {
            identity,
            config,
            transport,
            handlers,
            requests,
            contracts,
            auctions,
            groups,
            dispatcher,
            self_subscriptions: Arc::new(vec![public, own]),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    async fn publish(&self, channel: &str, envelope: Envelope) -> Result<(), ClientError> {
        let bytes = envelope
            .encode()
            .map_err(|e| crate::error::TransportError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;
        self.transport.publish(channel, bytes).await?;
        Ok(())
    }

    /// Fire-and-forget broadcast to every subscriber of `topic`.
    pub async fn broadcast(&self, topic: &str, payload: Value) -> Result<(), ClientError> {
        let envelope = Envelope::new(Kind::Broadcast, topic, self.identity.as_str(), payload);
        self.publish(&naming::public(topic), envelope).await
    }

    /// Fire-and-forget message addressed to one identity.
    pub async fn cast(&self, to: &str, topic: &str, payload: Value) -> Result<(), ClientError> {
        let envelope = Envelope::new(Kind::Cast, topic, self.identity.as_str(), payload).to(to);
        self.publish(&naming::identity(to, topic), envelope).await
    }

    /// Send a request to one identity and wait for its response, up to
    /// `timeout` (or `config.request_timeout` via [`Client::request`]).
    pub async fn request_with_timeout(
        &self,
        to: &str,
        topic: &str,
        payload: Value,
        timeout: Duration,
    ) -> ResponseResult {
        let mut results = self.map_with_timeout(&[to.to_string()], topic, payload, timeout).await;
        results
            .remove(to)
            .unwrap_or(Err(RequestOutcome::Timeout))
    }

    /// [`Client::request_with_timeout`] using the configured default timeout.
    pub async fn request(&self, to: &str, topic: &str, payload: Value) -> ResponseResult {
        self.request_with_timeout(to, topic, payload, self.config.request_timeout)
            .await
    }

    /// Fan out a request to every identity in `targets` and collect
    /// responses (or timeouts) for all of them (spec.md §4.5).
    pub async fn map_with_timeout(
        &self,
        targets: &[String],
        topic: &str,
        payload: Value,
        timeout: Duration,
    ) -> HashMap<String, ResponseResult> {
        if targets.is_empty() {
            return HashMap::new();
        }

        let correlation_id = new_correlation_id();
        let pending = self.requests.register(correlation_id.clone(), targets.len()).await;

        // Publish failures are per-target and must surface to the caller
        // (spec.md §7: "transport errors on publish are returned to the
        // caller synchronously") rather than degrade into an indistinct
        // Timeout once the deadline passes.
        let mut publish_failures: HashMap<String, String> = HashMap::new();
        for target in targets {
            let envelope = Envelope::new(Kind::Request, topic, self.identity.as_str(), payload.clone())
                .to(target.as_str())
                .correlation_id(correlation_id.clone());
            let channel = naming::identity(target, topic);
            if let Err(e) = self.publish(&channel, envelope).await {
                publish_failures.insert(target.clone(), e.to_string());
            }
        }

        let collected = self.requests.wait(&correlation_id, pending.clone(), timeout).await;
        let cancelled = pending.is_cancelled();

        targets
            .iter()
            .map(|target| {
                let outcome = match collected.get(target) {
                    Some(ResponseOutcome::Payload(v)) => Ok(v.clone()),
                    Some(ResponseOutcome::HandlerError(payload)) => {
                        Err(RequestOutcome::from_error_payload(payload))
                    }
                    None => match publish_failures.get(target) {
                        Some(reason) => Err(RequestOutcome::TransportFailure {
                            reason: reason.clone(),
                        }),
                        None if cancelled => Err(RequestOutcome::Shutdown),
                        None => Err(RequestOutcome::Timeout),
                    },
                };
                (target.clone(), outcome)
            })
            .collect()
    }

    pub async fn map(&self, targets: &[String], topic: &str, payload: Value) -> HashMap<String, ResponseResult> {
        self.map_with_timeout(targets, topic, payload, self.config.request_timeout)
            .await
    }

    /// Join a named group, leaving any group this client currently
    /// belongs to (spec.md §4.7: membership in at most one group).
    pub async fn join_group(&self, group_id: &str) -> Result<(), ClientError> {
        let on_message = self.dispatcher.on_message();
        self.groups
            .join(self.transport.as_ref(), on_message, group_id)
            .await?;
        Ok(())
    }

    pub async fn leave_group(&self) -> Result<(), ClientError> {
        self.groups.leave(self.transport.as_ref()).await?;
        Ok(())
    }

    pub async fn current_group(&self) -> Option<String> {
        self.groups.current_group().await
    }

    pub async fn in_group(&self) -> bool {
        self.groups.in_group().await
    }

    /// Broadcast to the client's active group. Fails with
    /// [`ClientError::NotInGroup`] if no group is active.
    pub async fn group_broadcast(&self, topic: &str, payload: Value) -> Result<(), ClientError> {
        let group_id = self.groups.current_group().await.ok_or(NotInGroup)?;
        let envelope = Envelope::new(Kind::GroupMsg, topic, self.identity.as_str(), payload);
        self.publish(&naming::group(&group_id, topic), envelope).await
    }

    pub async fn on_broadcast(&self, topic: impl Into<String>, handler: EventHandler) {
        self.handlers.register_broadcast(topic, handler).await;
    }

    pub async fn on_cast(&self, topic: impl Into<String>, handler: EventHandler) {
        self.handlers.register_cast(topic, handler).await;
    }

    pub async fn on_request(&self, topic: impl Into<String>, handler: RequestHandler) {
        self.handlers.register_request(topic, handler).await;
    }

    pub async fn on_group(&self, topic: impl Into<String>, handler: EventHandler) {
        self.handlers.register_group(topic, handler).await;
    }

    /// Register as a bidder for contracts opened on `topic`.
    pub async fn on_contract(&self, topic: impl Into<String>, on_open: OnOpen, on_win: OnWin) {
        self.contracts
            .register(topic, ContractHandler { on_open, on_win })
            .await;
    }

    /// Open a sealed-bid auction on `topic`, wait out `options.deadline`
    /// (or the configured default), and award the winner (spec.md §4.6).
    /// Returns `Ok(None)` if no eligible bids arrived — that's a normal
    /// empty outcome, not an error. Fails with `Err` only if publishing
    /// the `bid_open` envelope itself fails (spec.md §7); the winner's
    /// `bid_award` is best-effort, matching `group_broadcast`'s and other
    /// publish-and-move-on calls elsewhere in this client.
    pub async fn collect_bids(
        &self,
        topic: &str,
        options: CollectOptions,
    ) -> Result<Option<(String, f64)>, ClientError> {
        let correlation_id = new_correlation_id();
        let deadline = options.deadline.unwrap_or(self.config.contract_deadline);
        self.auctions.register(correlation_id.clone(), &options).await;

        let open = Envelope::new(Kind::BidOpen, topic, self.identity.as_str(), Value::Null)
            .correlation_id(correlation_id.clone());
        self.publish(&naming::public(topic), open).await?;

        let winner = self.auctions.resolve(&correlation_id, deadline).await;

        if let Some((ref winner_id, _)) = winner {
            let award = Envelope::new(Kind::BidAward, topic, self.identity.as_str(), Value::Null)
                .to(winner_id.as_str())
                .correlation_id(correlation_id);
            let _ = self.publish(&naming::identity(winner_id, topic), award).await;
        }

        Ok(winner)
    }

    /// A namespaced view over the shared key/value registry (spec.md §4.8).
    pub fn registry(&self, namespace: &str) -> Registry {
        Registry::new(self.transport.clone(), namespace, self.config.registry_key_prefix.clone())
    }

    /// Probe whether `identity` answers the reserved liveness request
    /// within `timeout` (spec.md §9).
    pub async fn alive(&self, identity: &str, timeout: Duration) -> bool {
        matches!(
            self.request_with_timeout(identity, ALIVE_TOPIC, Value::Null, timeout).await,
            Ok(_)
        )
    }

    /// Whether this client has an active subscription to the fabric.
    pub fn connected(&self) -> bool {
        !self.self_subscriptions.is_empty()
    }

    /// Tear down: unsubscribe everything, cancel in-flight requests and
    /// auctions as shutdown, and stop the dispatcher's worker pool
    /// (spec.md §5).
    pub async fn shutdown(self) {
        for handle in self.self_subscriptions.iter() {
            let _ = self.transport.unsubscribe(*handle).await;
        }
        let _ = self.groups.leave(self.transport.as_ref()).await;
        self.requests.drain().await;
        self.auctions.drain().await;

        if let Ok(dispatcher) = Arc::try_unwrap(self.dispatcher) {
            dispatcher.shutdown().await;
        }
    }
}

/// Helper for building an `on_open`/`on_win` pair from plain closures,
/// matching the `Arc<dyn Fn>` shape [`Client::on_contract`] expects.
pub fn bid_decision(f: impl Fn(Metadata) -> BidDecision + Send + Sync + 'static) -> OnOpen {
    Arc::new(f)
}

pub fn on_win<F>(f: impl Fn(Metadata) -> F + Send + Sync + 'static) -> OnWin
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    Arc::new(move |meta| -> BoxFuture<'static, ()> { Box::pin(f(meta)) })
}
