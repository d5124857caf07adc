//! Membership gossip.
//!
//! A node joins by pinging one bootstrap peer and merging the returned
//! membership. The node that receives the ping forwards the newcomer's
//! identity to every other member it knows, so membership spreads
//! transitively without a central directory.
//!
//! Each node forwards a given arrival to a given member at most once, which
//! bounds the flood: the recorded `(arrival, member)` pairs only grow.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use peerbid_core::Peer;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::GossipConfig;
use crate::dispatcher::PeerOutcome;
use crate::error::{P2pError, P2pResult};
use crate::protocol::{RpcRequest, RpcResponse};
use crate::registry::PeerRegistry;
use crate::transport::RpcTransport;

/// Result of [`GossipProtocol::join_with_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Attempts made, successful one included.
    pub attempts: u32,
    /// Whether the bootstrap peer answered.
    pub joined: bool,
    /// Peers learned from the answer.
    pub new_peers: usize,
}

/// Result of one forwarded ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOutcome {
    /// The newcomer whose identity was forwarded.
    pub arrival: Peer,
    /// The member that was told.
    pub target: Peer,
    /// How the call went.
    pub outcome: PeerOutcome,
}

/// Peer discovery handshake over a [`PeerRegistry`].
pub struct GossipProtocol {
    registry: Arc<PeerRegistry>,
    transport: Arc<dyn RpcTransport>,
    config: GossipConfig,
    notified: Mutex<HashSet<(String, String)>>,
    forwards: Mutex<JoinSet<ForwardOutcome>>,
    finished: Mutex<VecDeque<ForwardOutcome>>,
}

impl fmt::Debug for GossipProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GossipProtocol")
            .field("local", self.registry.local())
            .field("config", &self.config)
            .field("in_flight", &self.forwards.lock().len())
            .finish_non_exhaustive()
    }
}

impl GossipProtocol {
    /// Creates the protocol for the registry's local peer.
    #[must_use]
    pub fn new(
        registry: Arc<PeerRegistry>,
        transport: Arc<dyn RpcTransport>,
        config: GossipConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
            notified: Mutex::new(HashSet::new()),
            forwards: Mutex::new(JoinSet::new()),
            finished: Mutex::new(VecDeque::new()),
        }
    }

    /// The registry this protocol grows.
    #[must_use]
    pub const fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Pings `bootstrap` once and merges its membership.
    ///
    /// Returns the number of newly learned peers.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, times out, or is refused.
    pub async fn join(&self, bootstrap: &str) -> P2pResult<usize> {
        let local = self.registry.local().clone();
        if bootstrap == local.address {
            warn!(peer = %bootstrap, "bootstrap peer is this node, skipping join");
            return Ok(0);
        }

        let request = RpcRequest::Ping {
            requesting_peer: local,
        };
        let reply = timeout(self.config.call_timeout, self.transport.call(bootstrap, request))
            .await
            .map_err(|_| P2pError::Timeout(self.config.call_timeout))??;

        match reply {
            RpcResponse::Pong { known_peers } => {
                let learned = self.registry.merge(known_peers);
                info!(peer = %bootstrap, learned, known = self.registry.len(), "joined network");
                Ok(learned)
            }
            RpcResponse::Error { message } => Err(P2pError::Remote(message)),
            RpcResponse::Ack => Err(P2pError::Protocol("expected pong, got ack".into())),
        }
    }

    /// Joins through `bootstrap`, retrying with a fixed backoff.
    ///
    /// Running out of attempts is not an error; the node carries on with
    /// whatever membership it has.
    pub async fn join_with_retry(&self, bootstrap: &str) -> JoinOutcome {
        let max_attempts = self.config.join_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.join(bootstrap).await {
                Ok(new_peers) => {
                    return JoinOutcome {
                        attempts: attempt,
                        joined: true,
                        new_peers,
                    };
                }
                Err(e) => {
                    warn!(peer = %bootstrap, attempt, max_attempts, error = %e, "join attempt failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.join_backoff).await;
                    }
                }
            }
        }

        warn!(peer = %bootstrap, "could not join network, continuing standalone");
        JoinOutcome {
            attempts: max_attempts,
            joined: false,
            new_peers: 0,
        }
    }

    /// Answers a ping from `requester`.
    ///
    /// Adds the requester, returns the full membership, and forwards the
    /// requester's identity to every other member not told about it yet.
    /// Forwards run in the background; the reply never waits for them.
    pub fn handle_ping(&self, requester: Peer) -> Vec<Peer> {
        self.reap();
        self.registry.add_if_absent(requester.clone());
        let members = self.registry.all();
        let local_address = &self.registry.local().address;

        let targets: Vec<Peer> = {
            let mut notified = self.notified.lock();
            members
                .iter()
                .filter(|m| m.address != requester.address && &m.address != local_address)
                .filter(|m| notified.insert((requester.address.clone(), m.address.clone())))
                .cloned()
                .collect()
        };

        if !targets.is_empty() {
            debug!(arrival = %requester.address, targets = targets.len(), "forwarding arrival");
        }
        let mut forwards = self.forwards.lock();
        for target in targets {
            forwards.spawn(forward(
                Arc::clone(&self.registry),
                Arc::clone(&self.transport),
                self.config,
                requester.clone(),
                target,
            ));
        }
        drop(forwards);

        members
    }

    /// Number of forwards still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.forwards.lock().len()
    }

    /// Waits for every in-flight forward and returns the outcomes gathered
    /// since the previous drain. Only the newest
    /// [`retained_forwards`](GossipConfig::retained_forwards) outcomes that
    /// finished before the drain are kept.
    pub async fn drain_forwards(&self) -> Vec<ForwardOutcome> {
        let mut set = std::mem::replace(&mut *self.forwards.lock(), JoinSet::new());
        let mut outcomes = Vec::from(std::mem::take(&mut *self.finished.lock()));
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "forward task failed"),
            }
        }
        outcomes
    }

    /// Collects forwards that already finished.
    fn reap(&self) {
        let mut set = self.forwards.lock();
        let mut finished = self.finished.lock();
        while let Some(joined) = set.try_join_next() {
            match joined {
                Ok(outcome) => {
                    if finished.len() >= self.config.retained_forwards {
                        finished.pop_front();
                    }
                    if self.config.retained_forwards > 0 {
                        finished.push_back(outcome);
                    }
                }
                Err(e) => warn!(error = %e, "forward task failed"),
            }
        }
    }
}

/// Tells `target` about `arrival` and merges whatever membership it returns.
async fn forward(
    registry: Arc<PeerRegistry>,
    transport: Arc<dyn RpcTransport>,
    config: GossipConfig,
    arrival: Peer,
    target: Peer,
) -> ForwardOutcome {
    let request = RpcRequest::Ping {
        requesting_peer: arrival.clone(),
    };
    let outcome = match timeout(config.call_timeout, transport.call(&target.address, request)).await {
        Ok(Ok(RpcResponse::Pong { known_peers })) => {
            let learned = registry.merge(known_peers);
            debug!(peer = %target.address, arrival = %arrival.address, learned, "forward delivered");
            PeerOutcome::Delivered
        }
        Ok(Ok(RpcResponse::Ack)) => PeerOutcome::Rejected("expected pong, got ack".into()),
        Ok(Ok(RpcResponse::Error { message })) => PeerOutcome::Rejected(message),
        Ok(Err(e)) => PeerOutcome::Failed(e.to_string()),
        Err(_) => PeerOutcome::TimedOut,
    };

    if !outcome.is_delivered() {
        warn!(peer = %target.address, arrival = %arrival.address, outcome = %outcome, "forward failed");
    }
    ForwardOutcome {
        arrival,
        target,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::RequestHandler;
    use crate::transport::MemoryTransport;
    use crate::BoxFuture;
    use std::time::Duration;

    /// Minimal node: answers pings through its own gossip protocol.
    struct PingNode {
        gossip: GossipProtocol,
    }

    impl RequestHandler for PingNode {
        fn handle(&self, request: RpcRequest) -> BoxFuture<'_, RpcResponse> {
            Box::pin(async move {
                match request {
                    RpcRequest::Ping { requesting_peer } => RpcResponse::Pong {
                        known_peers: self.gossip.handle_ping(requesting_peer),
                    },
                    _ => RpcResponse::Ack,
                }
            })
        }
    }

    fn peer(port: u16, name: &str) -> Peer {
        Peer::new(Peer::address_for("127.0.0.1", port), name).unwrap()
    }

    fn spawn_node(transport: &Arc<MemoryTransport>, me: Peer) -> Arc<PingNode> {
        let registry = Arc::new(PeerRegistry::new(me.clone()));
        let config = GossipConfig::new().with_join_backoff(Duration::ZERO);
        let node = Arc::new(PingNode {
            gossip: GossipProtocol::new(registry, transport.clone(), config),
        });
        transport.register(me.address, node.clone());
        node
    }

    fn addresses(node: &PingNode) -> Vec<String> {
        let mut all: Vec<_> = node.gossip.registry().all().into_iter().map(|p| p.address).collect();
        all.sort();
        all
    }

    #[tokio::test]
    async fn join_learns_bootstrap_membership() {
        let transport = Arc::new(MemoryTransport::new());
        let alice = spawn_node(&transport, peer(5001, "alice"));
        let bob = spawn_node(&transport, peer(5002, "bob"));

        let learned = bob.gossip.join(&peer(5001, "alice").address).await.unwrap();
        assert_eq!(learned, 1);
        assert_eq!(addresses(&bob), addresses(&alice));
        assert_eq!(alice.gossip.registry().name_of("127.0.0.1:5002").as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn third_node_spreads_transitively() {
        let transport = Arc::new(MemoryTransport::new());
        let a = spawn_node(&transport, peer(5001, "a"));
        let b = spawn_node(&transport, peer(5002, "b"));
        let c = spawn_node(&transport, peer(5003, "c"));

        b.gossip.join("127.0.0.1:5001").await.unwrap();
        c.gossip.join("127.0.0.1:5002").await.unwrap();

        assert!(c.gossip.registry().contains("127.0.0.1:5001"));

        let forwarded = b.gossip.drain_forwards().await;
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].target.address, "127.0.0.1:5001");
        assert!(forwarded[0].outcome.is_delivered());
        a.gossip.drain_forwards().await;

        assert!(a.gossip.registry().contains("127.0.0.1:5003"));
        assert_eq!(addresses(&a), addresses(&b));
        assert_eq!(addresses(&b), addresses(&c));
    }

    #[tokio::test]
    async fn each_arrival_is_forwarded_once_per_member() {
        let transport = Arc::new(MemoryTransport::new());
        let hub = spawn_node(&transport, peer(5001, "hub"));
        let _x = spawn_node(&transport, peer(5002, "x"));
        hub.gossip.registry().add_if_absent(peer(5002, "x"));

        let newcomer = peer(5009, "new");
        hub.gossip.handle_ping(newcomer.clone());
        hub.gossip.handle_ping(newcomer);

        let outcomes = hub.gossip.drain_forwards().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].target.address, "127.0.0.1:5002");
    }

    #[tokio::test]
    async fn finished_forwards_beyond_the_limit_are_dropped() {
        let transport = Arc::new(MemoryTransport::new());
        let me = peer(5001, "hub");
        let registry = Arc::new(PeerRegistry::new(me.clone()));
        let config = GossipConfig::new().with_retained_forwards(2);
        let hub = Arc::new(PingNode {
            gossip: GossipProtocol::new(registry, transport.clone(), config),
        });
        transport.register(me.address, hub.clone());
        for port in 5002..5005 {
            spawn_node(&transport, peer(port, "member"));
            hub.gossip.registry().add_if_absent(peer(port, "member"));
        }

        hub.gossip.handle_ping(peer(5010, "first"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        hub.gossip.handle_ping(peer(5011, "second"));

        let outcomes = hub.gossip.drain_forwards().await;
        let first: Vec<_> = outcomes.iter().filter(|o| o.arrival.address == "127.0.0.1:5010").collect();
        let second: Vec<_> = outcomes.iter().filter(|o| o.arrival.address == "127.0.0.1:5011").collect();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 4);
        assert!(hub.gossip.drain_forwards().await.is_empty());
    }

    #[tokio::test]
    async fn forward_failures_are_reported_not_retried() {
        let transport = Arc::new(MemoryTransport::new());
        let hub = spawn_node(&transport, peer(5001, "hub"));
        hub.gossip.registry().add_if_absent(peer(5002, "gone"));

        let members = hub.gossip.handle_ping(peer(5003, "new"));
        assert_eq!(members.len(), 3);

        let outcomes = hub.gossip.drain_forwards().await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].outcome, PeerOutcome::Failed(_)));
        assert_eq!(hub.gossip.in_flight(), 0);
    }

    #[tokio::test]
    async fn join_with_retry_gives_up_without_error() {
        let transport = Arc::new(MemoryTransport::new());
        let lonely = spawn_node(&transport, peer(5001, "lonely"));

        let outcome = lonely.gossip.join_with_retry("127.0.0.1:5999").await;
        assert_eq!(
            outcome,
            JoinOutcome {
                attempts: 3,
                joined: false,
                new_peers: 0
            }
        );
        assert_eq!(lonely.gossip.registry().len(), 1);
    }

    #[tokio::test]
    async fn join_with_retry_recovers_when_peer_appears() {
        let transport = Arc::new(MemoryTransport::new());
        let _alice = spawn_node(&transport, peer(5001, "alice"));
        let bob = spawn_node(&transport, peer(5002, "bob"));
        transport.set_unreachable("127.0.0.1:5001", true);

        let outcome = bob.gossip.join_with_retry("127.0.0.1:5001").await;
        assert!(!outcome.joined);

        transport.set_unreachable("127.0.0.1:5001", false);
        let outcome = bob.gossip.join_with_retry("127.0.0.1:5001").await;
        assert!(outcome.joined);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.new_peers, 1);
    }

    #[tokio::test]
    async fn joining_self_is_skipped() {
        let transport = Arc::new(MemoryTransport::new());
        let me = spawn_node(&transport, peer(5001, "me"));
        assert_eq!(me.gossip.join("127.0.0.1:5001").await.unwrap(), 0);
    }
}
