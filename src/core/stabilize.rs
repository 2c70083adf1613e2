//! Joining a ring, and the periodic operations that keep it correct.
//!
//! None of the periodic operations fail, remote failures are logged and the
//! affected pointer falls back until a later round heals it.

use tracing::{debug, info, trace, warn};

use crate::common::{in_open, NodeDescriptor};
use crate::Result;

use super::ChordNode;

impl ChordNode {
    /// Join the ring `introducer` is part of.
    ///
    /// Only the successor is set, the predecessor stays empty until a node
    /// notifies us.
    pub fn join(&self, introducer: &NodeDescriptor) -> Result<()> {
        let successor = self.call_find_successor(introducer, *self.id(), 0)?;

        self.state().set_successor(&successor);

        info!(
            introducer = ?introducer.id(),
            successor = ?successor.id(),
            "Joined ring"
        );

        Ok(())
    }

    /// Ask the successor for its predecessor, adopt it if it sits between us,
    /// then notify the successor of our existence.
    pub fn stabilize(&self) {
        let this = *self.id();
        let successor = self.successor();
        let successor_id = *successor.id();

        match self.call_get_predecessor(&successor) {
            Ok(Some(candidate)) => {
                if in_open(this, successor_id, *candidate.id())
                    && self.state().replace_successor(&successor_id, &candidate)
                {
                    info!(
                        old = ?successor_id,
                        new = ?candidate.id(),
                        "Adopted closer successor"
                    );
                }
            }
            Ok(None) => {}
            Err(error) => {
                warn!(successor = ?successor_id, ?error, "Successor unreachable");
                self.drop_successor(&successor);
            }
        }

        let successor = self.successor();

        if let Err(error) = self.call_notify(&successor) {
            warn!(successor = ?successor.id(), ?error, "Failed to notify successor");
            self.drop_successor(&successor);
        }
    }

    /// `candidate` thinks it might be our predecessor.
    ///
    /// This node only takes an empty predecessor slot, any other node
    /// replaces it.
    pub fn notify(&self, candidate: &NodeDescriptor) {
        if !self.space().contains(*candidate.id()) {
            debug!(candidate = ?candidate.id(), "Ignoring notify from out of range id");
            return;
        }

        let previous = self.get_predecessor();

        if self.state().offer_predecessor(candidate) {
            info!(
                old = ?previous.map(|p| *p.id()),
                new = ?candidate.id(),
                "Adopted predecessor"
            );
        } else {
            trace!(candidate = ?candidate.id(), "Ignoring notify");
        }
    }

    /// Refresh the next finger in rotation.
    pub fn fix_fingers(&self) {
        let index = self.state().advance_next_finger();
        let start = self.space().finger_start(*self.id(), index);

        match self.find_successor(start) {
            Ok(target) => {
                self.state().remember(&target);

                match self.state().fingers().set_target(index, *target.id()) {
                    Ok(()) => debug!(index, ?start, target = ?target.id(), "Fixed finger"),
                    Err(error) => warn!(index, ?error, "Failed to set finger"),
                }
            }
            Err(error) => {
                warn!(index, ?start, ?error, "Failed to fix finger");
            }
        }
    }

    /// Probe the predecessor, clearing it if unreachable.
    pub fn check_predecessor(&self) {
        let Some(predecessor) = self.get_predecessor() else {
            return;
        };

        match self.call_health_check(&predecessor) {
            Ok(()) => trace!(predecessor = ?predecessor.id(), "Predecessor is alive"),
            Err(error) => {
                if self.state().clear_predecessor(predecessor.id()) {
                    warn!(predecessor = ?predecessor.id(), ?error, "Cleared unreachable predecessor");
                }
            }
        }
    }

    /// Drop cached descriptors no longer referenced by the routing state.
    ///
    /// Returns the number of removed descriptors.
    pub fn prune_descriptor_cache(&self) -> usize {
        self.state().prune_descriptors()
    }

    /// Fall back to ourselves as successor, unless it already changed.
    fn drop_successor(&self, dead: &NodeDescriptor) {
        if dead.id() == self.id() {
            return;
        }

        if self
            .state()
            .fingers()
            .compare_and_set_successor(*dead.id(), *self.id())
        {
            info!(dead = ?dead.id(), "Successor reset to self");
        }
    }
}
