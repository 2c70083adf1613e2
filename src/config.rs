use std::net::SocketAddr;
use std::time::Duration;

use crate::common::{Id, IdSpace, NodeDescriptor, NodeInfo};
use crate::Result;

/// Default number of bits of the ring, `m`.
pub const DEFAULT_RING_BITS: u8 = 32;
/// Default request timeout before considering a remote node dead.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000); // 2 seconds
pub const DEFAULT_STABILIZE_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_FIX_FINGERS_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_CHECK_PREDECESSOR_INTERVAL: Duration = Duration::from_millis(2000);
/// Default number of times a lookup may be forwarded.
pub const DEFAULT_MAX_HOPS: u32 = 32;
/// Default grace period of unreferenced descriptors before pruning.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
/// Chord node configurations
pub struct Config {
    /// Name and address of this node, hashed into its ring id.
    ///
    /// Defaults to `chord` on `127.0.0.1:0`, where port `0` means a random port
    /// once bound by [crate::Chord].
    pub node: NodeInfo,
    /// Number of bits `m` of the ring, the ring has `2^m` ids.
    ///
    /// Defaults to [DEFAULT_RING_BITS]
    pub ring_bits: u8,
    /// Explicit ring id, overriding the one derived from [Config::node].
    ///
    /// Defaults to None
    pub id: Option<Id>,
    /// A node already in the ring to join through.
    ///
    /// Defaults to None, starting a new ring of one node.
    pub bootstrap: Option<NodeInfo>,
    /// How long to wait for a remote node to respond.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Defaults to [DEFAULT_STABILIZE_INTERVAL]
    pub stabilize_interval: Duration,
    /// Defaults to [DEFAULT_FIX_FINGERS_INTERVAL]
    pub fix_fingers_interval: Duration,
    /// Interval of predecessor liveness checks and descriptor cache pruning.
    ///
    /// Defaults to [DEFAULT_CHECK_PREDECESSOR_INTERVAL]
    pub check_predecessor_interval: Duration,
    /// Maximum number of times a lookup is forwarded before failing.
    ///
    /// Defaults to [DEFAULT_MAX_HOPS]
    pub max_hops: u32,
    /// How long an unreferenced node descriptor is kept in the cache.
    ///
    /// Defaults to [DEFAULT_CACHE_TTL]
    pub cache_ttl: Duration,
}

impl Config {
    /// The identifier space of the ring.
    pub fn space(&self) -> Result<IdSpace> {
        IdSpace::new(self.ring_bits)
    }

    /// This node's descriptor, honoring [Config::id] if set.
    pub fn descriptor(&self) -> Result<NodeDescriptor> {
        let space = self.space()?;

        let id = match self.id {
            Some(id) => space.check(id)?,
            None => self.node.ring_id(&space),
        };

        Ok(NodeDescriptor::new(id, self.node.name.clone(), self.node.address))
    }

    /// The descriptor of [Config::bootstrap] if any.
    pub fn bootstrap_descriptor(&self) -> Result<Option<NodeDescriptor>> {
        let space = self.space()?;

        Ok(self.bootstrap.as_ref().map(|info| info.descriptor(&space)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeInfo::new("chord", SocketAddr::from(([127, 0, 0, 1], 0))),
            ring_bits: DEFAULT_RING_BITS,
            id: None,
            bootstrap: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stabilize_interval: DEFAULT_STABILIZE_INTERVAL,
            fix_fingers_interval: DEFAULT_FIX_FINGERS_INTERVAL,
            check_predecessor_interval: DEFAULT_CHECK_PREDECESSOR_INTERVAL,
            max_hops: DEFAULT_MAX_HOPS,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;

    #[test]
    fn descriptor_is_derived_from_node_info() {
        let config = Config {
            node: NodeInfo::new("alice", "127.0.0.1:8000".parse().unwrap()),
            ring_bits: 16,
            ..Default::default()
        };

        let space = IdSpace::new(16).unwrap();
        assert_eq!(
            *config.descriptor().unwrap().id(),
            space.hash(b"alice:127.0.0.1:8000")
        );
    }

    #[test]
    fn explicit_id_must_fit() {
        let config = Config {
            ring_bits: 3,
            id: Some(Id(9)),
            ..Default::default()
        };

        assert!(matches!(
            config.descriptor(),
            Err(Error::IdOutOfRange { bits: 3, .. })
        ));

        let config = Config {
            ring_bits: 3,
            id: Some(Id(5)),
            ..Default::default()
        };
        assert_eq!(*config.descriptor().unwrap().id(), Id(5));
    }
}
