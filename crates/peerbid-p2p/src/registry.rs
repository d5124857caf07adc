//! Peer membership table.
//!
//! The registry is the set of peers this node knows about, including itself.
//! Entries are keyed by address, kept in insertion order, and never removed.

use std::collections::HashMap;

use parking_lot::RwLock;
use peerbid_core::Peer;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Members {
    peers: Vec<Peer>,
    index: HashMap<String, usize>,
}

/// Address-keyed membership table shared by gossip and broadcast.
#[derive(Debug)]
pub struct PeerRegistry {
    local: Peer,
    members: RwLock<Members>,
}

impl PeerRegistry {
    /// Creates a registry containing only the local peer.
    #[must_use]
    pub fn new(local: Peer) -> Self {
        let mut members = Members::default();
        members.index.insert(local.address.clone(), 0);
        members.peers.push(local.clone());
        Self {
            local,
            members: RwLock::new(members),
        }
    }

    /// The peer this registry belongs to.
    #[must_use]
    pub const fn local(&self) -> &Peer {
        &self.local
    }

    /// Inserts the peer unless its address is already known.
    ///
    /// Returns `true` if the peer was new. The first name seen for an
    /// address is kept.
    pub fn add_if_absent(&self, peer: Peer) -> bool {
        let mut members = self.members.write();
        if let Some(&slot) = members.index.get(&peer.address) {
            let known = &members.peers[slot];
            if known.name != peer.name {
                debug!(
                    peer = %peer.address,
                    known = %known.name,
                    offered = %peer.name,
                    "ignoring name change for known peer"
                );
            }
            return false;
        }

        let slot = members.peers.len();
        members.index.insert(peer.address.clone(), slot);
        info!(peer = %peer.address, name = %peer.name, "discovered peer");
        members.peers.push(peer);
        true
    }

    /// Adds every peer in `peers` and returns how many were new.
    pub fn merge<I>(&self, peers: I) -> usize
    where
        I: IntoIterator<Item = Peer>,
    {
        peers
            .into_iter()
            .filter(|peer| self.add_if_absent(peer.clone()))
            .count()
    }

    /// Returns true if the address is known.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.members.read().index.contains_key(address)
    }

    /// Returns the display name registered for an address.
    #[must_use]
    pub fn name_of(&self, address: &str) -> Option<String> {
        let members = self.members.read();
        members
            .index
            .get(address)
            .map(|&slot| members.peers[slot].name.clone())
    }

    /// Snapshot of every member, local peer included, in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<Peer> {
        self.members.read().peers.clone()
    }

    /// Snapshot of every member except the local peer.
    #[must_use]
    pub fn others(&self) -> Vec<Peer> {
        self.members
            .read()
            .peers
            .iter()
            .filter(|peer| peer.address != self.local.address)
            .cloned()
            .collect()
    }

    /// Number of members, local peer included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.read().peers.len()
    }

    /// Always false: the local peer is a member from construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.read().peers.is_empty()
    }
}
