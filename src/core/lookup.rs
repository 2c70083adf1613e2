//! Successor lookups.

use tracing::trace;

use crate::common::{in_open, in_open_closed, Id, NodeDescriptor};
use crate::{Error, Result};

use super::ChordNode;

impl ChordNode {
    /// Find the node owning `id`: the first node at or after `id` on the ring.
    ///
    /// Forwards the lookup to the closest preceding finger when the answer is not
    /// known locally, failing if that remote call fails.
    pub fn find_successor(&self, id: Id) -> Result<NodeDescriptor> {
        self.find_successor_hops(id, 0)
    }

    /// [ChordNode::find_successor] for a lookup already forwarded `hops` times.
    ///
    /// Fails with [Error::HopLimitExceeded] instead of forwarding past the
    /// configured maximum.
    pub fn find_successor_hops(&self, id: Id, hops: u32) -> Result<NodeDescriptor> {
        let id = self.space().check(id)?;
        let this = *self.id();
        let successor = self.successor();

        if in_open_closed(this, *successor.id(), id) {
            return Ok(successor);
        }

        let closest = self.closest_preceding_node(id);

        if closest.id() == &this {
            // No finger is closer, the successor is the best answer we have.
            return Ok(successor);
        }

        if hops >= self.max_hops {
            return Err(Error::HopLimitExceeded(self.max_hops));
        }

        trace!(?id, to = ?closest.id(), hops, "Forwarding find_successor");

        let found = self.call_find_successor(&closest, id, hops + 1)?;
        self.state().remember(&found);

        Ok(found)
    }

    /// The finger target closest to, and strictly before, `id`.
    ///
    /// Fingers are scanned from the farthest to the nearest. Targets missing from
    /// the descriptor cache are skipped. Returns this node if no finger qualifies.
    pub fn closest_preceding_node(&self, id: Id) -> NodeDescriptor {
        let this = *self.id();

        for finger in self.state().fingers().iter().rev() {
            let Some(target) = finger.target() else {
                continue;
            };

            if !in_open(this, id, target) {
                continue;
            }

            match self.state().resolve(&target) {
                Some(node) => return node,
                None => trace!(?target, "Skipping unresolvable finger"),
            }
        }

        self.descriptor().clone()
    }
}
