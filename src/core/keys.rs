//! Routing keys to the node owning them.

use tracing::{debug, info};

use crate::common::{Id, NodeDescriptor};
use crate::Result;

use super::ChordNode;

impl ChordNode {
    /// Route `key` to its owner, `find_successor(key)`, and store it there.
    ///
    /// Returns the owner. Adding a key twice is a no-op on the owner.
    pub fn add_key(&self, key: Id) -> Result<NodeDescriptor> {
        let key = self.space().check(key)?;
        let owner = self.find_successor(key)?;

        debug!(?key, owner = ?owner.id(), "Routing key");

        self.call_assign_key(&owner, key)
    }

    /// Store `key` on this node, without checking ownership.
    ///
    /// Called by the node a key was routed from.
    pub fn assign_key_local(&self, key: Id) -> Result<NodeDescriptor> {
        let key = self.space().check(key)?;

        if self.state().keys().insert(key) {
            info!(?key, "Stored key");
        }

        Ok(self.descriptor().clone())
    }

    /// Keys stored on this node, in ascending order.
    pub fn keys(&self) -> Vec<Id> {
        let mut keys: Vec<Id> = self.state().keys().iter().map(|key| *key).collect();
        keys.sort();

        keys
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::common::Id;
    use crate::transport::LocalNetwork;
    use crate::{ChordNode, Config, Error};

    fn singleton(id: u64) -> ChordNode {
        let config = Config {
            ring_bits: 8,
            id: Some(Id(id)),
            ..Default::default()
        };

        ChordNode::new(&config, Arc::new(LocalNetwork::default())).unwrap()
    }

    #[test]
    fn singleton_stores_every_key() {
        let chord = singleton(100);

        for key in [0, 99, 100, 101, 255] {
            assert_eq!(chord.add_key(Id(key)).unwrap().id(), &Id(100));
        }

        assert_eq!(chord.keys(), vec![Id(0), Id(99), Id(100), Id(101), Id(255)]);
    }

    #[test]
    fn adding_twice_is_idempotent() {
        let chord = singleton(100);

        chord.add_key(Id(7)).unwrap();
        chord.add_key(Id(7)).unwrap();
        chord.assign_key_local(Id(7)).unwrap();

        assert_eq!(chord.keys(), vec![Id(7)]);
        assert_eq!(chord.info().keys(), 1);
    }

    #[test]
    fn out_of_range_key() {
        let chord = singleton(100);

        assert!(matches!(
            chord.add_key(Id(256)),
            Err(Error::IdOutOfRange { bits: 8, .. })
        ));
        assert!(matches!(
            chord.assign_key_local(Id(256)),
            Err(Error::IdOutOfRange { .. })
        ));
        assert!(chord.keys().is_empty());
    }
}
