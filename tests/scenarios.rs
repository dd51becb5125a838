//! End-to-end scenarios against `InMemoryTransport`, one per literal
//! scenario in the coordination-fabric specification.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gs_mesh::{Client, ClientConfig, InMemoryTransport, Transport};
use serde_json::json;

async fn connect(identity: &str, transport: Arc<dyn Transport>) -> Client {
    Client::connect(ClientConfig::new(identity), transport)
        .await
        .expect("connect")
}

/// S1 — broadcast fan-out: every other client's handler fires with the
/// right payload and sender; the broadcaster's own handler does not.
#[tokio::test]
async fn s1_broadcast_fan_out() {
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let a = connect("A", transport.clone()).await;
    let b = connect("B", transport.clone()).await;
    let c = connect("C", transport.clone()).await;

    let a_hits = Arc::new(AtomicUsize::new(0));
    let b_hits = Arc::new(AtomicUsize::new(0));
    let c_hits = Arc::new(AtomicUsize::new(0));

    for (client, counter) in [(&a, &a_hits), (&b, &b_hits), (&c, &c_hits)] {
        let counter = counter.clone();
        client
            .on_broadcast(
                "hello",
                Arc::new(move |meta, payload| {
                    let counter = counter.clone();
                    Box::pin(async move {
                        assert_eq!(meta.from, "A");
                        assert_eq!(payload, json!({"n": 1}));
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .await;
    }

    a.broadcast("hello", json!({"n": 1})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(a_hits.load(Ordering::SeqCst), 0);
    assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    assert_eq!(c_hits.load(Ordering::SeqCst), 1);
}

/// S2 — request/response happy path.
#[tokio::test]
async fn s2_request_response_happy_path() {
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let b = connect("B", transport.clone()).await;
    b.on_request(
        "status",
        Arc::new(|_meta, _payload| Box::pin(async { Ok(json!({"ok": true})) })),
    )
    .await;

    let a = connect("A", transport).await;
    let result = a
        .request_with_timeout("B", "status", json!({}), Duration::from_secs(1))
        .await;
    assert_eq!(result, Ok(json!({"ok": true})));
}

/// S3 — request timeout when the target has no handler for the topic.
#[tokio::test]
async fn s3_request_timeout() {
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let _b = connect("B", transport.clone()).await;
    let a = connect("A", transport).await;

    let result = a
        .request_with_timeout("B", "status", json!({}), Duration::from_millis(100))
        .await;
    assert_eq!(result, Err(gs_mesh::RequestOutcome::Timeout));
}

/// S4 — fan-out map: only responders answer, the rest time out.
#[tokio::test]
async fn s4_fan_out_map() {
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let b = connect("B", transport.clone()).await;
    let c = connect("C", transport.clone()).await;
    let _d = connect("D", transport.clone()).await;

    b.on_request("ping", Arc::new(|_meta, _p| Box::pin(async { Ok(json!("pong-b")) })))
        .await;
    c.on_request("ping", Arc::new(|_meta, _p| Box::pin(async { Ok(json!("pong-c")) })))
        .await;

    let a = connect("A", transport).await;
    let targets = vec!["B".to_string(), "C".to_string(), "D".to_string()];
    let results = a
        .map_with_timeout(&targets, "ping", json!({}), Duration::from_secs(1))
        .await;

    assert_eq!(results.get("B"), Some(&Ok(json!("pong-b"))));
    assert_eq!(results.get("C"), Some(&Ok(json!("pong-c"))));
    assert_eq!(results.get("D"), Some(&Err(gs_mesh::RequestOutcome::Timeout)));
}

/// S5 — contract auction, single winner: equal bids from two
/// independent clients resolve to exactly one winner; the loser's
/// `on_win` never fires. (Which of the two tied bids the auctioneer
/// happens to see first is a function of real scheduling across two
/// independent clients, so this asserts the single-winner invariant
/// rather than pinning a specific winner; `contract::tests` covers the
/// tie-break comparator itself deterministically.)
#[tokio::test]
async fn s5_contract_auction_single_winner() {
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());

    let b_won = Arc::new(AtomicBool::new(false));
    let c_won = Arc::new(AtomicBool::new(false));

    let b = connect("B", transport.clone()).await;
    {
        let won = b_won.clone();
        b.on_contract(
            "craft_sword",
            gs_mesh::bid_decision(|_meta| gs_mesh::BidDecision::Bid(0.5)),
            gs_mesh::on_win(move |_meta| {
                let won = won.clone();
                async move {
                    won.store(true, Ordering::SeqCst);
                }
            }),
        )
        .await;
    }

    let c = connect("C", transport.clone()).await;
    {
        let won = c_won.clone();
        c.on_contract(
            "craft_sword",
            gs_mesh::bid_decision(|_meta| gs_mesh::BidDecision::Bid(0.5)),
            gs_mesh::on_win(move |_meta| {
                let won = won.clone();
                async move {
                    won.store(true, Ordering::SeqCst);
                }
            }),
        )
        .await;
    }

    let auctioneer = connect("Auctioneer", transport).await;
    let winner = auctioneer
        .collect_bids(
            "craft_sword",
            gs_mesh::CollectOptions {
                deadline: Some(Duration::from_millis(100)),
                ..Default::default()
            },
        )
        .await
        .expect("bid_open publish should succeed");

    let (winner_id, value) = winner.expect("one of two eligible bidders should win");
    assert_eq!(value, 0.5);
    assert!(winner_id == "B" || winner_id == "C");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_ne!(b_won.load(Ordering::SeqCst), c_won.load(Ordering::SeqCst));
}

/// S6 — group isolation: only members of the broadcasting group's own
/// group receive its group messages.
#[tokio::test]
async fn s6_group_isolation() {
    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());

    let a = connect("A", transport.clone()).await;
    let b = connect("B", transport.clone()).await;
    let c = connect("C", transport.clone()).await;

    a.join_group("g1").await.unwrap();
    b.join_group("g1").await.unwrap();
    c.join_group("g2").await.unwrap();

    let a_hits = Arc::new(AtomicUsize::new(0));
    let b_hits = Arc::new(AtomicUsize::new(0));
    let c_hits = Arc::new(AtomicUsize::new(0));

    for (client, counter) in [(&a, &a_hits), (&b, &b_hits), (&c, &c_hits)] {
        let counter = counter.clone();
        client
            .on_group(
                "x",
                Arc::new(move |_meta, _payload| {
                    let counter = counter.clone();
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .await;
    }

    a.group_broadcast("x", json!({})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(a_hits.load(Ordering::SeqCst), 0);
    assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    assert_eq!(c_hits.load(Ordering::SeqCst), 0);
}
