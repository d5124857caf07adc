//! Composition root.
//!
//! [`NodeContext`] builds every service of one node exactly once and hands
//! out shared references. Nothing is looked up globally.

use std::sync::Arc;

use peerbid_core::Peer;
use peerbid_market::{AuctionCoordinator, InboundAuctionHandler, LocalReplica};
use peerbid_p2p::{BroadcastDispatcher, GossipProtocol, PeerRegistry, RpcTransport};
use peerbid_store::{JsonFileGateway, MemoryGateway, PersistenceGateway};
use tracing::info;

use crate::config::NodeConfig;
use crate::error::NodeResult;

/// Every long-lived service of a node.
pub struct NodeContext {
    /// Configuration the node was started with.
    pub config: NodeConfig,
    /// Durable auction storage.
    pub gateway: Arc<dyn PersistenceGateway>,
    /// Membership table, this node included.
    pub registry: Arc<PeerRegistry>,
    /// Join handshake and arrival forwarding.
    pub gossip: Arc<GossipProtocol>,
    /// Fan-out to every peer.
    pub dispatcher: Arc<BroadcastDispatcher>,
    /// Cached auction state.
    pub replica: Arc<LocalReplica>,
    /// Local auction lifecycle.
    pub coordinator: Arc<AuctionCoordinator>,
    /// Applies peers' lifecycle calls.
    pub inbound: Arc<InboundAuctionHandler>,
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("local", self.registry.local())
            .field("peers", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl NodeContext {
    /// Wires the services for `local` over the given storage and transport.
    #[must_use]
    pub fn build(
        config: NodeConfig,
        local: Peer,
        gateway: Arc<dyn PersistenceGateway>,
        transport: Arc<dyn RpcTransport>,
    ) -> Self {
        let registry = Arc::new(PeerRegistry::new(local));
        let gossip = Arc::new(GossipProtocol::new(
            Arc::clone(&registry),
            Arc::clone(&transport),
            config.gossip_config(),
        ));
        let dispatcher = Arc::new(BroadcastDispatcher::new(
            Arc::clone(&registry),
            transport,
            config.dispatch_config(),
        ));
        let replica = Arc::new(LocalReplica::new(
            Arc::clone(&gateway),
            config.replica_config(),
        ));
        let coordinator = Arc::new(AuctionCoordinator::new(
            Arc::clone(&gateway),
            Arc::clone(&replica),
            Arc::clone(&dispatcher),
        ));
        let inbound = Arc::new(InboundAuctionHandler::new(
            Arc::clone(&gateway),
            Arc::clone(&replica),
        ));

        Self {
            config,
            gateway,
            registry,
            gossip,
            dispatcher,
            replica,
            coordinator,
            inbound,
        }
    }

    /// The identity of this node.
    #[must_use]
    pub fn local(&self) -> &Peer {
        self.registry.local()
    }

    /// Display name the operator acts under.
    #[must_use]
    pub fn operator(&self) -> &str {
        &self.registry.local().name
    }
}

/// Opens the storage the configuration asks for.
///
/// # Errors
///
/// Returns an error if the data directory cannot be created or its store
/// file cannot be read.
pub fn open_gateway(config: &NodeConfig) -> NodeResult<Arc<dyn PersistenceGateway>> {
    if let Some(dir) = &config.data_dir {
        Ok(Arc::new(JsonFileGateway::open(dir)?))
    } else {
        info!("no data directory configured, auctions are kept in memory");
        Ok(Arc::new(MemoryGateway::new()))
    }
}
