//! # peerbid-core
//!
//! Primitives shared by every PeerBid node.
//!
//! This crate provides:
//!
//! - [`Price`]: Currency amount with two-decimal fixed-point precision
//! - [`AuctionRecord`] / [`BidRecord`]: The replicated auction state
//! - [`leading_bid`]: The order-independent leading-bid rule
//! - [`Peer`]: Address and display name of a marketplace node

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auction;
pub mod error;
pub mod peer;
pub mod price;

pub use auction::{
    leading_bid, AuctionId, AuctionOutcome, AuctionRecord, AuctionStatus, BidRecord,
};
pub use error::CoreError;
pub use peer::Peer;
pub use price::Price;
