//! The seam between a [crate::ChordNode] and the nodes it talks to.

mod local;
mod udp;

use std::fmt::Debug;

use crate::common::{Id, NodeDescriptor};
use crate::error::TransportError;

pub use local::{LocalNetwork, RemoteCall};
pub use udp::UdpTransport;

/// Maximum size of a datagram.
pub(crate) const MTU: usize = 2048;

/// Remote calls a node makes to other nodes.
///
/// Every call is blocking, bounded by a timeout, and returns a [TransportError]
/// instead of panicking when the remote node is unreachable or misbehaves.
pub trait Transport: Debug + Send + Sync {
    /// Ask `to` for the successor of `target`, `hops` being the number of times
    /// the lookup was already forwarded.
    fn find_successor(
        &self,
        to: &NodeDescriptor,
        target: Id,
        hops: u32,
    ) -> Result<NodeDescriptor, TransportError>;

    /// Ask `to` for its current predecessor.
    fn get_predecessor(&self, to: &NodeDescriptor)
        -> Result<Option<NodeDescriptor>, TransportError>;

    /// Tell `to` that `candidate` might be its predecessor.
    fn notify(&self, to: &NodeDescriptor, candidate: &NodeDescriptor)
        -> Result<(), TransportError>;

    /// Store `key` on `to`, returning the node that stored it.
    fn assign_key(&self, to: &NodeDescriptor, key: Id) -> Result<NodeDescriptor, TransportError>;

    /// Liveness probe.
    fn health_check(&self, to: &NodeDescriptor) -> Result<(), TransportError>;
}
