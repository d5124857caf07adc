//! Test helpers for multi-node tests.

#![allow(dead_code)]

use std::sync::Arc;

use peerbid_core::AuctionId;
use peerbid_node::{NodeConfig, NodeContext, NodeRouter};
use peerbid_p2p::MemoryTransport;
use peerbid_store::MemoryGateway;

/// Nodes wired together through one in-process transport.
pub struct MemoryCluster {
    pub transport: Arc<MemoryTransport>,
    next_port: u16,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(MemoryTransport::new()),
            next_port: 5001,
        }
    }

    /// Adds a node named `name` on the next free port.
    pub fn add(&mut self, name: &str) -> Arc<NodeContext> {
        self.add_with(NodeConfig {
            name: name.into(),
            ..NodeConfig::default()
        })
    }

    /// Adds a node with `config`, overriding its port.
    pub fn add_with(&mut self, config: NodeConfig) -> Arc<NodeContext> {
        let port = self.next_port;
        self.next_port += 1;
        let local = config.local_peer(port).unwrap();
        let ctx = Arc::new(NodeContext::build(
            config,
            local,
            Arc::new(MemoryGateway::new()),
            self.transport.clone(),
        ));
        self.transport
            .register(ctx.local().address.clone(), Arc::new(NodeRouter::new(Arc::clone(&ctx))));
        ctx
    }

    /// Builds `names` as one fully meshed network, the first node acting as
    /// bootstrap for the rest.
    pub async fn mesh(&mut self, names: &[&str]) -> Vec<Arc<NodeContext>> {
        let nodes: Vec<_> = names.iter().map(|name| self.add(name)).collect();
        let bootstrap = nodes[0].local().address.clone();
        for node in &nodes[1..] {
            node.gossip.join(&bootstrap).await.unwrap();
            settle(&nodes).await;
        }
        nodes
    }
}

/// Waits for every node's background forwards.
pub async fn settle(nodes: &[Arc<NodeContext>]) {
    for node in nodes {
        node.gossip.drain_forwards().await;
    }
}

/// Config for a node on a random local port.
pub fn ws_config(name: &str, bootstrap: Option<&str>) -> NodeConfig {
    NodeConfig {
        name: name.into(),
        port: 0,
        bootstrap: bootstrap.map(str::to_string),
        join_backoff_ms: 10,
        ..NodeConfig::default()
    }
}

/// Sorted addresses a node knows, itself included.
pub fn addresses(node: &NodeContext) -> Vec<String> {
    let mut addresses: Vec<_> = node.registry.all().into_iter().map(|p| p.address).collect();
    addresses.sort();
    addresses
}

/// Status of `auction_id` in `node`'s replica, if known.
pub fn replica_status(node: &NodeContext, auction_id: &AuctionId) -> Option<String> {
    node.replica.peek(auction_id).map(|r| r.status.to_string())
}
