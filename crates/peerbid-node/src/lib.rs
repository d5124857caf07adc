//! # peerbid-node
//!
//! A PeerBid node: one process that listens for peer RPCs, keeps a local
//! view of every auction on the network, and gives its operator a shell to
//! open, bid on, and close auctions.
//!
//! - [`NodeConfig`]: JSON configuration with command-line overrides
//! - [`NodeContext`]: composition root holding every service once
//! - [`NodeRouter`]: dispatches inbound RPCs to gossip or the market
//! - [`Node`]: listener lifecycle, bootstrap join, graceful shutdown
//! - [`Shell`]: operator commands over any line-based reader

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod node;
pub mod router;
pub mod shell;

pub use config::NodeConfig;
pub use context::{open_gateway, NodeContext};
pub use error::{NodeError, NodeResult};
pub use node::Node;
pub use router::NodeRouter;
pub use shell::{Command, Reply, Shell};
