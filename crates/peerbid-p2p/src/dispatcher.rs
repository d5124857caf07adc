//! Fan-out of one request to every known peer.
//!
//! Each peer gets its own call and its own deadline. One peer failing or
//! stalling never affects the others, and nothing is retried.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use peerbid_core::Peer;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::protocol::{RpcRequest, RpcResponse};
use crate::registry::PeerRegistry;
use crate::transport::RpcTransport;

/// What happened to the call for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerOutcome {
    /// The peer acknowledged the request.
    Delivered,
    /// The peer answered with an error.
    Rejected(String),
    /// The call failed before a reply arrived.
    Failed(String),
    /// No reply arrived before the deadline.
    TimedOut,
}

impl PeerOutcome {
    /// Returns true if the peer acknowledged the request.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for PeerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Per-peer results of one broadcast, in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// One entry per targeted peer.
    pub outcomes: Vec<(Peer, PeerOutcome)>,
}

impl BroadcastReport {
    /// Number of peers targeted.
    #[must_use]
    pub fn targeted(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of peers that acknowledged.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_delivered()).count()
    }

    /// Number of peers that did not acknowledge.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.targeted() - self.delivered()
    }

    /// Returns the outcome for one address.
    #[must_use]
    pub fn outcome_for(&self, address: &str) -> Option<&PeerOutcome> {
        self.outcomes
            .iter()
            .find(|(peer, _)| peer.address == address)
            .map(|(_, outcome)| outcome)
    }
}

/// Sends a request to every peer in the registry concurrently.
pub struct BroadcastDispatcher {
    registry: Arc<PeerRegistry>,
    transport: Arc<dyn RpcTransport>,
    config: DispatchConfig,
}

impl fmt::Debug for BroadcastDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BroadcastDispatcher {
    /// Creates a dispatcher over the given registry and transport.
    #[must_use]
    pub fn new(
        registry: Arc<PeerRegistry>,
        transport: Arc<dyn RpcTransport>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    /// Sends `request` to every peer except this node.
    pub async fn broadcast(&self, request: RpcRequest) -> BroadcastReport {
        let targets = self.registry.others();
        self.broadcast_to(targets, request).await
    }

    /// Sends `request` to an explicit set of peers.
    pub async fn broadcast_to(&self, peers: Vec<Peer>, request: RpcRequest) -> BroadcastReport {
        let request_type = request.request_type();
        if peers.is_empty() {
            debug!(request_type, "no peers to broadcast to");
            return BroadcastReport::default();
        }

        let calls = peers.iter().map(|peer| self.deliver(peer, request.clone()));
        let results = join_all(calls).await;
        let report = BroadcastReport {
            outcomes: peers.into_iter().zip(results).collect(),
        };

        info!(
            request_type,
            targeted = report.targeted(),
            delivered = report.delivered(),
            "broadcast finished"
        );
        report
    }

    async fn deliver(&self, peer: &Peer, request: RpcRequest) -> PeerOutcome {
        let request_type = request.request_type();
        let call = self.transport.call(&peer.address, request);
        let outcome = match timeout(self.config.call_timeout, call).await {
            Ok(Ok(RpcResponse::Ack | RpcResponse::Pong { .. })) => PeerOutcome::Delivered,
            Ok(Ok(RpcResponse::Error { message })) => PeerOutcome::Rejected(message),
            Ok(Err(e)) => PeerOutcome::Failed(e.to_string()),
            Err(_) => PeerOutcome::TimedOut,
        };

        if outcome.is_delivered() {
            debug!(peer = %peer.address, request_type, "delivered");
        } else {
            warn!(peer = %peer.address, request_type, outcome = %outcome, "broadcast leg failed");
        }
        outcome
    }
}
