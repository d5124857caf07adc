//! # peerbid-p2p
//!
//! Networking layer for the PeerBid auction network.
//!
//! Nodes talk to each other with one JSON request per WebSocket connection.
//! On top of that this crate provides membership and fan-out:
//!
//! - [`PeerRegistry`]: address-keyed membership table, insertion ordered
//! - [`GossipProtocol`]: join handshake and transitive arrival forwarding
//! - [`BroadcastDispatcher`]: concurrent per-peer delivery with deadlines
//! - [`RpcServer`]: inbound listener feeding a [`RequestHandler`]
//! - [`RpcTransport`]: outbound calls, over WebSocket ([`WsTransport`]) or
//!   in-process ([`MemoryTransport`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gossip;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use config::{DispatchConfig, GossipConfig, ServerConfig};
pub use dispatcher::{BroadcastDispatcher, BroadcastReport, PeerOutcome};
pub use error::{P2pError, P2pResult};
pub use gossip::{ForwardOutcome, GossipProtocol, JoinOutcome};
pub use protocol::{AuctionData, BidData, CompletionData, RpcRequest, RpcResponse};
pub use registry::PeerRegistry;
pub use server::{RequestHandler, RpcServer, ServerHandle};
pub use transport::{MemoryTransport, RpcTransport, WsTransport};
