//! Struct and implementation of the descriptor of a Chord node.
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::common::{Id, IdSpace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The per-node unique identity a ring id is derived from.
pub struct NodeInfo {
    pub name: String,
    pub address: SocketAddr,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>, address: SocketAddr) -> Self {
        NodeInfo {
            name: name.into(),
            address,
        }
    }

    /// Consistent hash of `"{name}:{ip}:{port}"` onto the ring.
    pub fn ring_id(&self, space: &IdSpace) -> Id {
        let input = format!(
            "{}:{}:{}",
            self.name,
            self.address.ip(),
            self.address.port()
        );

        space.hash(input.as_bytes())
    }

    /// Descriptor with the id derived from this info.
    pub fn descriptor(&self, space: &IdSpace) -> NodeDescriptor {
        NodeDescriptor::new(self.ring_id(space), self.name.clone(), self.address)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Immutable identity of a node on the ring, itself or a remote peer.
///
/// Two descriptors are equal if and only if their ring ids are equal.
pub struct NodeDescriptor {
    id: Id,
    name: String,
    address: SocketAddr,
}

impl NodeDescriptor {
    /// Creates a new descriptor from an id, a name and a socket address.
    pub fn new(id: Id, name: impl Into<String>, address: SocketAddr) -> Self {
        NodeDescriptor {
            id,
            name: name.into(),
            address,
        }
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }
}

impl PartialEq for NodeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeDescriptor {}

impl Hash for NodeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialOrd for NodeDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}
