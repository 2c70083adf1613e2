//! Core Chord logic: ring state, lookups, key routing and stabilization.
//!
//! Contains no I/O of its own, every remote operation goes through the
//! [Transport] the node was created with.

mod info;
mod keys;
mod lookup;
mod ring_state;
mod stabilize;

use std::sync::Arc;

use crate::common::{FingerSnapshot, Id, IdSpace, NodeDescriptor};
use crate::config::Config;
use crate::error::TransportError;
use crate::transport::Transport;
use crate::Result;

pub use info::Info;
pub use ring_state::{DescriptorCache, RingState};

#[derive(Debug)]
/// A single node of a Chord ring.
///
/// Shared between the request handlers and the periodic maintenance tasks,
/// every method takes `&self`.
pub struct ChordNode {
    state: RingState,
    transport: Arc<dyn Transport>,
    max_hops: u32,
}

impl ChordNode {
    /// Creates a singleton ring node, call [ChordNode::join] to join an existing ring.
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let space = config.space()?;
        let this = config.descriptor()?;

        Ok(ChordNode {
            state: RingState::new(space, this, config.cache_ttl),
            transport,
            max_hops: config.max_hops,
        })
    }

    // === Getters ===

    /// Returns this node's ring id.
    pub fn id(&self) -> &Id {
        self.state.id()
    }

    /// Returns this node's descriptor.
    pub fn descriptor(&self) -> &NodeDescriptor {
        self.state.this()
    }

    pub fn space(&self) -> &IdSpace {
        self.state.space()
    }

    /// Immediate successor, this node itself in a singleton ring.
    pub fn successor(&self) -> NodeDescriptor {
        self.state.successor()
    }

    /// Current predecessor, `None` until some node notifies us.
    ///
    /// A singleton ring notifies itself on stabilize, its predecessor is itself.
    pub fn get_predecessor(&self) -> Option<NodeDescriptor> {
        self.state.predecessor()
    }

    /// Copy of the finger table for diagnostics.
    pub fn finger_table(&self) -> Vec<FingerSnapshot> {
        self.state.fingers().snapshot()
    }

    /// Information and statistics about this node.
    pub fn info(&self) -> Info {
        Info::from(self)
    }

    pub(crate) fn state(&self) -> &RingState {
        &self.state
    }

    // === Public Methods ===

    /// Answer a liveness probe.
    pub fn ping(&self) -> &NodeDescriptor {
        self.descriptor()
    }

    // === Remote calls ===
    //
    // Calls targeting this node are answered locally without the transport.

    fn is_self(&self, node: &NodeDescriptor) -> bool {
        node.id() == self.id()
    }

    fn call_find_successor(
        &self,
        to: &NodeDescriptor,
        target: Id,
        hops: u32,
    ) -> Result<NodeDescriptor> {
        if self.is_self(to) {
            return self.find_successor_hops(target, hops);
        }

        Ok(self.transport.find_successor(to, target, hops)?)
    }

    fn call_get_predecessor(
        &self,
        to: &NodeDescriptor,
    ) -> Result<Option<NodeDescriptor>, TransportError> {
        if self.is_self(to) {
            return Ok(self.get_predecessor());
        }

        self.transport.get_predecessor(to)
    }

    fn call_notify(&self, to: &NodeDescriptor) -> Result<(), TransportError> {
        if self.is_self(to) {
            self.notify(self.descriptor());
            return Ok(());
        }

        self.transport.notify(to, self.descriptor())
    }

    fn call_assign_key(&self, to: &NodeDescriptor, key: Id) -> Result<NodeDescriptor> {
        if self.is_self(to) {
            return self.assign_key_local(key);
        }

        Ok(self.transport.assign_key(to, key)?)
    }

    fn call_health_check(&self, to: &NodeDescriptor) -> Result<(), TransportError> {
        if self.is_self(to) {
            return Ok(());
        }

        self.transport.health_check(to)
    }
}
