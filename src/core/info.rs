use serde::{Deserialize, Serialize};

use crate::common::{FingerSnapshot, Id, NodeDescriptor};

use super::ChordNode;

/// Information and statistics about a Chord node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    node: NodeDescriptor,
    successor: NodeDescriptor,
    predecessor: Option<NodeDescriptor>,
    fingers: Vec<FingerSnapshot>,
    keys: usize,
    known_nodes: usize,
}

impl Info {
    /// This node's [Id]
    pub fn id(&self) -> &Id {
        self.node.id()
    }
    /// This node's descriptor.
    pub fn node(&self) -> &NodeDescriptor {
        &self.node
    }
    pub fn successor(&self) -> &NodeDescriptor {
        &self.successor
    }
    pub fn predecessor(&self) -> Option<&NodeDescriptor> {
        self.predecessor.as_ref()
    }
    /// The finger table at the time this [Info] was taken.
    pub fn fingers(&self) -> &[FingerSnapshot] {
        &self.fingers
    }
    /// Number of keys owned by this node.
    pub fn keys(&self) -> usize {
        self.keys
    }
    /// Number of remote nodes in the descriptor cache.
    pub fn known_nodes(&self) -> usize {
        self.known_nodes
    }
}

impl From<&ChordNode> for Info {
    fn from(node: &ChordNode) -> Self {
        Self {
            node: node.descriptor().clone(),
            successor: node.successor(),
            predecessor: node.get_predecessor(),
            fingers: node.finger_table(),
            keys: node.state().keys().len(),
            known_nodes: node.state().known_nodes(),
        }
    }
}
