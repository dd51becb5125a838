//! Dispatcher (C3): the single inbound pump. Decodes envelopes, routes
//! them to the right handler table or coordinator, and runs handlers on
//! a worker pool distinct from the transport's reader context
//! (spec.md §4.3).

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::contract::{AuctionCoordinator, ContractRegistry};
use crate::envelope::{Envelope, ErrorPayload, Kind, Metadata, RESPONSE_TOPIC};
use crate::handlers::HandlerRegistry;
use crate::naming;
use crate::request::{RequestCoordinator, ResponseOutcome};
use crate::transport::{OnMessage, Transport};

/// Shared, read-mostly context every worker needs to process a message.
/// Cloned cheaply (everything inside is an `Arc`).
pub struct DispatchContext {
    pub identity: String,
    pub handlers: Arc<HandlerRegistry>,
    pub requests: Arc<RequestCoordinator>,
    pub contracts: Arc<ContractRegistry>,
    pub auctions: Arc<AuctionCoordinator>,
    pub transport: Arc<dyn Transport>,
}

/// Owns the bounded inbound queue and the worker pool draining it.
pub struct Dispatcher {
    tx: mpsc::Sender<(String, Vec<u8>)>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn start(queue_bound: usize, worker_count: usize, ctx: Arc<DispatchContext>) -> Self {
        let (tx, rx) = mpsc::channel(queue_bound.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..worker_count.max(1))
            .map(|_| {
                let rx = rx.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    loop {
                        let next = { rx.lock().await.recv().await };
                        match next {
                            Some((channel, bytes)) => process_message(&ctx, &channel, bytes).await,
                            None => break,
                        }
                    }
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// A callback suitable for `Transport::subscribe`. The transport's
    /// reader context calls this; it only enqueues, never blocks on
    /// user code.
    pub fn on_message(&self) -> OnMessage {
        let tx = self.tx.clone();
        Arc::new(move |channel: &str, bytes: Vec<u8>| {
            if tx.try_send((channel.to_string(), bytes)).is_err() {
                tracing::warn!(channel, "dispatch queue overflow, dropping message");
            }
        })
    }

    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn process_message(ctx: &DispatchContext, channel: &str, bytes: Vec<u8>) {
    let envelope = match Envelope::decode(&bytes) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!(channel, error = %e, "dropping malformed envelope");
            return;
        }
    };

    match envelope.kind {
        Kind::Broadcast => dispatch_event(ctx, &envelope, Table::Broadcast, true).await,
        Kind::Cast => dispatch_event(ctx, &envelope, Table::Cast, false).await,
        Kind::GroupMsg => dispatch_event(ctx, &envelope, Table::Group, true).await,
        Kind::Request => handle_request(ctx, &envelope).await,
        Kind::Response => handle_response(ctx, &envelope).await,
        Kind::BidOpen => handle_bid_open(ctx, &envelope).await,
        Kind::BidSubmit => handle_bid_submit(ctx, &envelope).await,
        Kind::BidAward => handle_bid_award(ctx, &envelope).await,
    }
}

enum Table {
    Broadcast,
    Cast,
    Group,
}

async fn dispatch_event(ctx: &DispatchContext, envelope: &Envelope, table: Table, filter_self: bool) {
    if filter_self && envelope.from == ctx.identity {
        return;
    }

    let handler = match table {
        Table::Broadcast => ctx.handlers.lookup_broadcast(&envelope.topic).await,
        Table::Cast => ctx.handlers.lookup_cast(&envelope.topic).await,
        Table::Group => ctx.handlers.lookup_group(&envelope.topic).await,
    };

    let Some(handler) = handler else { return };
    let meta = Metadata::from_envelope(envelope);
    if let Err(e) = handler(meta, envelope.payload.clone()).await {
        tracing::warn!(
            topic = %envelope.topic,
            from = %envelope.from,
            error = %e,
            "handler error"
        );
    }
}

async fn handle_request(ctx: &DispatchContext, envelope: &Envelope) {
    let Some(handler) = ctx.handlers.lookup_request(&envelope.topic).await else {
        tracing::debug!(topic = %envelope.topic, "no request handler registered");
        return;
    };

    let meta = Metadata::from_envelope(envelope);
    let response_payload = match handler(meta, envelope.payload.clone()).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(topic = %envelope.topic, error = %e, "request handler failed");
            ErrorPayload::new("HandlerError", e.to_string()).to_value()
        }
    };

    let response = Envelope::new(Kind::Response, RESPONSE_TOPIC, ctx.identity.as_str(), response_payload)
        .to(envelope.from.as_str());
    let response = match &envelope.correlation_id {
        Some(id) => response.correlation_id(id.clone()),
        None => response,
    };

    let channel = naming::identity(&envelope.from, RESPONSE_TOPIC);
    if let Ok(bytes) = response.encode() {
        if let Err(e) = ctx.transport.publish(&channel, bytes).await {
            tracing::warn!(channel, error = %e, "failed to publish response");
        }
    }
}

async fn handle_response(ctx: &DispatchContext, envelope: &Envelope) {
    let Some(correlation_id) = &envelope.correlation_id else {
        return;
    };
    let outcome = ResponseOutcome::from_payload(envelope.payload.clone());
    ctx.requests
        .record_response(correlation_id, &envelope.from, outcome)
        .await;
}

async fn handle_bid_open(ctx: &DispatchContext, envelope: &Envelope) {
    let Some(handler) = ctx.contracts.lookup(&envelope.topic).await else {
        return;
    };
    let meta = Metadata::from_envelope(envelope);
    let decision = (handler.on_open)(meta);

    let value = match decision {
        crate::contract::BidDecision::Bid(v) => v,
        crate::contract::BidDecision::Decline => return,
    };

    let Some(correlation_id) = &envelope.correlation_id else {
        return;
    };

    let bid = Envelope::new(Kind::BidSubmit, envelope.topic.as_str(), ctx.identity.as_str(), Value::from(value))
        .to(envelope.from.as_str())
        .correlation_id(correlation_id.clone());

    let channel = naming::identity(&envelope.from, &envelope.topic);
    if let Ok(bytes) = bid.encode() {
        if let Err(e) = ctx.transport.publish(&channel, bytes).await {
            tracing::warn!(channel, error = %e, "failed to publish bid");
        }
    }
}

async fn handle_bid_submit(ctx: &DispatchContext, envelope: &Envelope) {
    let Some(correlation_id) = &envelope.correlation_id else {
        return;
    };
    let Some(value) = envelope.payload.as_f64() else {
        tracing::warn!(from = %envelope.from, "dropping bid with non-numeric value");
        return;
    };
    ctx.auctions
        .record_bid(correlation_id, &envelope.from, value)
        .await;
}

async fn handle_bid_award(ctx: &DispatchContext, envelope: &Envelope) {
    let Some(handler) = ctx.contracts.lookup(&envelope.topic).await else {
        return;
    };
    let meta = Metadata::from_envelope(envelope);
    (handler.on_win)(meta).await;
}
