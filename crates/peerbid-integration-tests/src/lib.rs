//! Integration tests for PeerBid.
//!
//! This crate exists solely to run tests that span several nodes:
//! - gossip membership converging across three peers
//! - auction lifecycle mirrored to every replica
//! - broadcasts surviving unreachable and slow peers
//! - the JSON store outliving a node restart

#![cfg(test)]
