//! A client-side messaging fabric for coordinating game-automation
//! fleets over a pub/sub + key/value transport: addressing (broadcast,
//! per-identity, group), request/response with correlation and
//! timeouts, sealed-bid single-winner contract auctions, and a
//! namespaced registry.
//!
//! The transport itself is abstract (see [`Transport`]); this crate
//! ships [`InMemoryTransport`] for single-process use and tests. A real
//! deployment plugs in an adapter over Redis, NATS, or similar.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gs_mesh::{Client, ClientConfig, InMemoryTransport, Transport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
//! let alice = Client::connect(ClientConfig::new("alice"), transport.clone()).await?;
//! let bob = Client::connect(ClientConfig::new("bob"), transport).await?;
//!
//! bob.on_request("heal_me", Arc::new(|_meta, payload| {
//!     Box::pin(async move { Ok(payload) })
//! })).await;
//!
//! let result = alice.request("bob", "heal_me", serde_json::json!(10)).await;
//! assert_eq!(result, Ok(serde_json::json!(10)));
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod contract;
mod dispatcher;
mod envelope;
mod error;
mod group;
mod handlers;
mod ids;
mod naming;
mod registry;
mod request;
mod transport;

pub use client::{bid_decision, on_win, Client, ResponseResult};
pub use config::ClientConfig;
pub use contract::{BidDecision, CollectOptions, OnOpen, OnWin};
pub use envelope::Metadata;
pub use error::{ClientError, NotInGroup, RegistryError, RequestOutcome, TransportError};
pub use handlers::{EventHandler, RequestHandler};
pub use registry::Registry;
pub use request::ResponseOutcome;
pub use transport::{InMemoryTransport, OnMessage, SubscriptionHandle, Transport};
