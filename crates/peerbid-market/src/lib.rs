//! # peerbid-market
//!
//! Auction lifecycle and replication for the PeerBid network.
//!
//! ## Core Types
//!
//! - [`LocalReplica`]: TTL cache reconciling storage with live mutations
//! - [`AuctionCoordinator`]: local Open to Closed state machine plus broadcast
//! - [`InboundAuctionHandler`]: applies peers' lifecycle calls locally
//! - [`MarketError`]: validation, lookup, and storage failures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod coordinator;
pub mod error;
pub mod inbound;
pub mod replica;

pub use coordinator::{AuctionCoordinator, Committed};
pub use error::{MarketError, MarketResult};
pub use inbound::InboundAuctionHandler;
pub use replica::{LocalReplica, ReplicaConfig, DEFAULT_CACHE_TTL};
