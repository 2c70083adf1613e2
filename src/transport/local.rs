//! In-process [Transport] connecting nodes living in the same process.

use std::sync::{Arc, Weak};

use dashmap::{DashMap, DashSet};
use tracing::trace;

use crate::common::{Id, NodeDescriptor, SERVER_ERROR_CODE};
use crate::error::TransportError;
use crate::{ChordNode, Config, Error, Result};

use super::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// One of the [Transport] calls.
pub enum RemoteCall {
    FindSuccessor,
    GetPredecessor,
    Notify,
    AssignKey,
    HealthCheck,
}

#[derive(Debug, Default)]
/// A set of [ChordNode]s calling each other directly, addressed by ring id.
///
/// Any node can be made unreachable, to simulate crashes and partitions,
/// or made to fail a single kind of [RemoteCall].
pub struct LocalNetwork {
    nodes: DashMap<Id, Weak<ChordNode>>,
    unreachable: DashSet<Id>,
    failing: DashSet<(Id, RemoteCall)>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a node using this network as its transport, and register it.
    pub fn add_node(self: &Arc<Self>, config: Config) -> Result<Arc<ChordNode>> {
        let node = Arc::new(ChordNode::new(&config, self.clone())?);
        self.register(&node);

        Ok(node)
    }

    /// Make `node` reachable by the other nodes of this network.
    pub fn register(&self, node: &Arc<ChordNode>) {
        self.nodes.insert(*node.id(), Arc::downgrade(node));
    }

    /// Simulate a crashed node, or heal it.
    pub fn set_reachable(&self, node: &NodeDescriptor, reachable: bool) {
        if reachable {
            self.unreachable.remove(node.id());
        } else {
            self.unreachable.insert(*node.id());
        }
    }

    /// Make every `call` to `node` fail, or succeed again.
    pub fn set_failing(&self, node: &NodeDescriptor, call: RemoteCall, failing: bool) {
        if failing {
            self.failing.insert((*node.id(), call));
        } else {
            self.failing.remove(&(*node.id(), call));
        }
    }

    fn node(
        &self,
        to: &NodeDescriptor,
        call: RemoteCall,
    ) -> Result<Arc<ChordNode>, TransportError> {
        if self.unreachable.contains(to.id()) {
            trace!(to = ?to.id(), "Dropping call to unreachable node");
            return Err(TransportError::Unreachable(to.address()));
        }

        if self.failing.contains(&(*to.id(), call)) {
            trace!(to = ?to.id(), ?call, "Dropping failing call");
            return Err(TransportError::Timeout(to.address()));
        }

        // Never hold the map guard while calling into a node.
        let weak = self.nodes.get(to.id()).map(|entry| entry.value().clone());

        weak.and_then(|weak| weak.upgrade())
            .ok_or(TransportError::Unreachable(to.address()))
    }
}

fn remote_error(error: Error) -> TransportError {
    TransportError::Remote {
        code: SERVER_ERROR_CODE,
        description: error.to_string(),
    }
}

impl Transport for LocalNetwork {
    fn find_successor(
        &self,
        to: &NodeDescriptor,
        target: Id,
        hops: u32,
    ) -> Result<NodeDescriptor, TransportError> {
        self.node(to, RemoteCall::FindSuccessor)?
            .find_successor_hops(target, hops)
            .map_err(remote_error)
    }

    fn get_predecessor(
        &self,
        to: &NodeDescriptor,
    ) -> Result<Option<NodeDescriptor>, TransportError> {
        Ok(self.node(to, RemoteCall::GetPredecessor)?.get_predecessor())
    }

    fn notify(
        &self,
        to: &NodeDescriptor,
        candidate: &NodeDescriptor,
    ) -> Result<(), TransportError> {
        self.node(to, RemoteCall::Notify)?.notify(candidate);
        Ok(())
    }

    fn assign_key(&self, to: &NodeDescriptor, key: Id) -> Result<NodeDescriptor, TransportError> {
        self.node(to, RemoteCall::AssignKey)?
            .assign_key_local(key)
            .map_err(remote_error)
    }

    fn health_check(&self, to: &NodeDescriptor) -> Result<(), TransportError> {
        self.node(to, RemoteCall::HealthCheck)?.ping();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(id: u64) -> Config {
        Config {
            ring_bits: 8,
            id: Some(Id(id)),
            ..Default::default()
        }
    }

    #[test]
    fn calls_reach_registered_nodes() {
        let network = LocalNetwork::new();
        let a = network.add_node(config(10)).unwrap();
        let b = network.add_node(config(20)).unwrap();

        network.notify(b.descriptor(), a.descriptor()).unwrap();
        assert_eq!(
            network.get_predecessor(b.descriptor()).unwrap().as_ref(),
            Some(a.descriptor())
        );

        assert_eq!(
            network.assign_key(b.descriptor(), Id(15)).unwrap(),
            *b.descriptor()
        );
        assert_eq!(b.keys(), vec![Id(15)]);
    }

    #[test]
    fn unreachable_nodes() {
        let network = LocalNetwork::new();
        let a = network.add_node(config(10)).unwrap();

        network.set_reachable(a.descriptor(), false);
        assert!(matches!(
            network.health_check(a.descriptor()),
            Err(TransportError::Unreachable(_))
        ));

        network.set_reachable(a.descriptor(), true);
        assert!(network.health_check(a.descriptor()).is_ok());
    }

    #[test]
    fn failing_calls() {
        let network = LocalNetwork::new();
        let a = network.add_node(config(10)).unwrap();
        let b = network.add_node(config(20)).unwrap();

        network.set_failing(b.descriptor(), RemoteCall::Notify, true);

        assert!(matches!(
            network.notify(b.descriptor(), a.descriptor()),
            Err(TransportError::Timeout(_))
        ));
        assert_eq!(b.get_predecessor(), None);
        // Other calls still go through.
        assert!(network.health_check(b.descriptor()).is_ok());
        assert_eq!(network.get_predecessor(b.descriptor()).unwrap(), None);

        network.set_failing(b.descriptor(), RemoteCall::Notify, false);
        network.notify(b.descriptor(), a.descriptor()).unwrap();
        assert_eq!(b.get_predecessor().as_ref(), Some(a.descriptor()));
    }

    #[test]
    fn dropped_nodes_are_unreachable() {
        let network = LocalNetwork::new();
        let a = network.add_node(config(10)).unwrap();
        let descriptor = a.descriptor().clone();

        drop(a);

        assert!(matches!(
            network.health_check(&descriptor),
            Err(TransportError::Unreachable(_))
        ));
    }

    #[test]
    fn remote_errors() {
        let network = LocalNetwork::new();
        let a = network.add_node(config(10)).unwrap();

        assert!(matches!(
            network.assign_key(a.descriptor(), Id(300)),
            Err(TransportError::Remote {
                code: SERVER_ERROR_CODE,
                ..
            })
        ));
    }
}
