//! A running node: listener, services, and shutdown.

use std::sync::Arc;

use peerbid_p2p::{JoinOutcome, RpcServer, RpcTransport, ServerConfig, ServerHandle, WsTransport};
use peerbid_store::PersistenceGateway;
use tracing::info;

use crate::config::NodeConfig;
use crate::context::{open_gateway, NodeContext};
use crate::error::NodeResult;
use crate::router::NodeRouter;

/// A node serving RPCs on its own listener.
#[derive(Debug)]
pub struct Node {
    ctx: Arc<NodeContext>,
    server: ServerHandle,
}

impl Node {
    /// Starts a node with the storage from `config` and WebSocket transport.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be opened or the listener cannot
    /// be bound. Both are fatal at startup.
    pub async fn start(config: NodeConfig) -> NodeResult<Self> {
        let gateway = open_gateway(&config)?;
        Self::start_with(config, gateway, Arc::new(WsTransport::new())).await
    }

    /// Starts a node over explicit storage and transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the listener
    /// cannot be bound.
    pub async fn start_with(
        config: NodeConfig,
        gateway: Arc<dyn PersistenceGateway>,
        transport: Arc<dyn RpcTransport>,
    ) -> NodeResult<Self> {
        config.validate()?;
        let server = RpcServer::bind(config.bind_addr()?, ServerConfig::default()).await?;
        let local = config.local_peer(server.local_addr().port())?;
        info!(name = %local.name, address = %local.address, "node starting");

        let ctx = Arc::new(NodeContext::build(config, local, gateway, transport));
        let server = server.spawn(Arc::new(NodeRouter::new(Arc::clone(&ctx))));
        Ok(Self { ctx, server })
    }

    /// Shared services of this node.
    #[must_use]
    pub const fn context(&self) -> &Arc<NodeContext> {
        &self.ctx
    }

    /// `host:port` peers use to reach this node.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.ctx.local().address
    }

    /// Joins through the configured bootstrap peer, if any.
    pub async fn join(&self) -> Option<JoinOutcome> {
        let bootstrap = self.ctx.config.bootstrap.clone()?;
        Some(self.ctx.gossip.join_with_retry(&bootstrap).await)
    }

    /// Greeting shown when the shell starts.
    #[must_use]
    pub fn greeting(&self) -> String {
        format!(
            "Welcome, {}! Listening on {} with {} connected peer(s).",
            self.ctx.operator(),
            self.address(),
            self.ctx.registry.others().len()
        )
    }

    /// Stops the listener after letting in-flight gossip forwards finish.
    pub async fn shutdown(self) {
        let forwards = self.ctx.gossip.drain_forwards().await;
        info!(forwards = forwards.len(), "gossip forwards drained");
        self.server.shutdown().await;
        info!(address = %self.ctx.local().address, "node stopped");
    }
}
