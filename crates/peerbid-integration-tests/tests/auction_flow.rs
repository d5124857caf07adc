//! End-to-end auction flow across three in-process nodes.
//!
//! These tests verify:
//! 1. Gossip converges every node on the same membership
//! 2. Opening, bidding, and closing replicate to every peer
//! 3. Rejected operations change nothing anywhere
//! 4. Broadcasts tolerate unreachable and slow peers

mod helpers;

use std::time::Duration;

use helpers::*;
use peerbid_core::{AuctionStatus, Price};
use peerbid_market::MarketError;
use peerbid_node::NodeConfig;
use peerbid_p2p::PeerOutcome;

// ============================================================================
// Membership
// ============================================================================

#[tokio::test]
async fn test_three_nodes_converge() {
    let mut cluster = MemoryCluster::new();
    let nodes = cluster.mesh(&["alice", "bob", "carol"]).await;

    let expected = addresses(&nodes[0]);
    assert_eq!(expected.len(), 3);
    for node in &nodes {
        assert_eq!(addresses(node), expected, "{} disagrees", node.operator());
    }
}

#[tokio::test]
async fn test_registry_keeps_first_seen_name() {
    let mut cluster = MemoryCluster::new();
    let nodes = cluster.mesh(&["alice", "bob"]).await;
    let bob = nodes[1].local().clone();

    assert_eq!(nodes[0].registry.name_of(&bob.address).as_deref(), Some("bob"));
    let renamed = peerbid_core::Peer::new(bob.address.clone(), "robert").unwrap();
    nodes[0].gossip.handle_ping(renamed);
    assert_eq!(nodes[0].registry.name_of(&bob.address).as_deref(), Some("bob"));
}

// ============================================================================
// Auction Lifecycle
// ============================================================================

#[tokio::test]
async fn test_vase_auction_end_to_end() {
    let mut cluster = MemoryCluster::new();
    let nodes = cluster.mesh(&["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (&nodes[0], &nodes[1], &nodes[2]);

    // Alice opens the auction; both peers learn it.
    let opened = alice
        .coordinator
        .initialize("Vase", Price::from_units(10), alice.operator())
        .await
        .unwrap();
    assert_eq!(opened.broadcast.delivered(), 2);
    let id = opened.value.auction_id.clone();
    for node in [bob, carol] {
        let record = node.replica.peek(&id).unwrap();
        assert_eq!(record.item, "Vase");
        assert_eq!(record.seller, "alice");
        assert_eq!(record.status, AuctionStatus::Open);
    }

    // Bob outbids the starting price from his own node.
    let bid = bob
        .coordinator
        .place_bid(&id, Price::from_units(15), bob.operator())
        .await
        .unwrap();
    assert_eq!(bid.broadcast.delivered(), 2);
    for node in [alice, carol] {
        let leading = node.coordinator.leading_bid(&id).await.unwrap().unwrap();
        assert_eq!(leading.bidder, "bob");
        assert_eq!(leading.amount, Price::from_units(15));
    }

    // Carol's lower bid is refused locally and never broadcast.
    let err = carol
        .coordinator
        .place_bid(&id, Price::from_units(12), carol.operator())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::BidTooLow { .. }));
    for node in &nodes {
        assert_eq!(node.replica.peek(&id).unwrap().bids.len(), 1);
    }

    // Alice closes it; everyone sees bob win at 15.
    let closed = alice.coordinator.complete(&id, alice.operator()).await.unwrap();
    assert_eq!(closed.broadcast.delivered(), 2);
    for node in &nodes {
        let record = node.replica.peek(&id).unwrap();
        assert_eq!(record.status, AuctionStatus::Closed);
        let outcome = record.outcome.unwrap();
        assert_eq!(outcome.winner, "bob");
        assert_eq!(outcome.price, Price::from_units(15));
    }

    // Closed auctions take no more bids.
    let err = carol
        .coordinator
        .place_bid(&id, Price::from_units(20), carol.operator())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotOpen { .. }));
}

#[tokio::test]
async fn test_only_seller_can_complete() {
    let mut cluster = MemoryCluster::new();
    let nodes = cluster.mesh(&["alice", "bob"]).await;
    let (alice, bob) = (&nodes[0], &nodes[1]);

    let id = alice
        .coordinator
        .initialize("Lamp", Price::from_units(5), alice.operator())
        .await
        .unwrap()
        .value
        .auction_id;
    bob.coordinator
        .place_bid(&id, Price::from_units(6), bob.operator())
        .await
        .unwrap();

    let err = bob.coordinator.complete(&id, bob.operator()).await.unwrap_err();
    assert!(matches!(err, MarketError::NotSeller { .. }));
    assert_eq!(replica_status(alice, &id).as_deref(), Some("open"));
}

#[tokio::test]
async fn test_auctions_listed_in_creation_order_everywhere() {
    let mut cluster = MemoryCluster::new();
    let nodes = cluster.mesh(&["alice", "bob"]).await;

    for (item, node) in [("Vase", &nodes[0]), ("Clock", &nodes[1]), ("Rug", &nodes[0])] {
        node.coordinator
            .initialize(item, Price::from_units(1), node.operator())
            .await
            .unwrap();
    }

    for node in &nodes {
        let items: Vec<_> = node
            .coordinator
            .auctions()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.item)
            .collect();
        assert_eq!(items, ["Vase", "Clock", "Rug"]);
    }
}

// ============================================================================
// Degraded Peers
// ============================================================================

#[tokio::test]
async fn test_unreachable_peer_does_not_block_commit() {
    let mut cluster = MemoryCluster::new();
    let nodes = cluster.mesh(&["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (&nodes[0], &nodes[1], &nodes[2]);
    cluster.transport.set_unreachable(carol.local().address.clone(), true);

    let opened = alice
        .coordinator
        .initialize("Vase", Price::from_units(10), alice.operator())
        .await
        .unwrap();

    let report = &opened.broadcast;
    assert_eq!(report.targeted(), 2);
    assert_eq!(report.delivered(), 1);
    assert!(matches!(
        report.outcome_for(&carol.local().address),
        Some(PeerOutcome::Failed(_))
    ));

    let id = &opened.value.auction_id;
    assert!(bob.replica.peek(id).is_some());
    assert!(carol.replica.peek(id).is_none());
    assert!(alice.coordinator.auction(id).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_slow_peer_times_out() {
    let mut cluster = MemoryCluster::new();
    let config = |name: &str| NodeConfig {
        name: name.into(),
        rpc_timeout_secs: 1,
        ..NodeConfig::default()
    };
    let alice = cluster.add_with(config("alice"));
    let bob = cluster.add_with(config("bob"));
    bob.gossip.join(&alice.local().address).await.unwrap();
    cluster
        .transport
        .set_delay(bob.local().address.clone(), Duration::from_secs(5));

    let opened = alice
        .coordinator
        .initialize("Vase", Price::from_units(10), alice.operator())
        .await
        .unwrap();
    assert_eq!(
        opened.broadcast.outcome_for(&bob.local().address),
        Some(&PeerOutcome::TimedOut)
    );
    assert_eq!(replica_status(&alice, &opened.value.auction_id).as_deref(), Some("open"));
}

#[tokio::test]
async fn test_join_through_second_node_reaches_first() {
    let mut cluster = MemoryCluster::new();
    let alice = cluster.add("alice");
    let bob = cluster.add("bob");
    let carol = cluster.add("carol");
    let nodes = [alice.clone(), bob.clone(), carol.clone()];

    bob.gossip.join(&alice.local().address).await.unwrap();
    let learned = carol.gossip.join(&bob.local().address).await.unwrap();
    settle(&nodes).await;

    assert_eq!(learned, 2);
    assert!(carol.registry.contains(&alice.local().address));
    assert!(alice.registry.contains(&carol.local().address));
}
