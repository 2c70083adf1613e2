//! Chord node running on a UDP socket, with its maintenance threads.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use crate::common::{Id, NodeDescriptor, NodeInfo};
use crate::core::{ChordNode, Info};
use crate::server::Server;
use crate::transport::UdpTransport;
use crate::{Config, Error, Result};

#[derive(Debug)]
/// A running Chord node.
///
/// Serves requests from other nodes and runs stabilize, fix-fingers and
/// check-predecessor on their own intervals, until [Chord::shutdown] or drop.
pub struct Chord {
    node: Arc<ChordNode>,
    local_addr: SocketAddr,
    shutdown: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Debug, Default, Clone)]
/// Builder for a [Chord] node.
pub struct ChordBuilder(Config);

impl ChordBuilder {
    /// Set the name hashed into this node's id.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.0.node.name = name.to_string();

        self
    }

    /// Set the address to listen on, port `0` picks a random port.
    ///
    /// This address is advertised to other nodes, so it can't be unspecified
    /// (`0.0.0.0` or `::`).
    pub fn address(&mut self, address: SocketAddr) -> &mut Self {
        self.0.node.address = address;

        self
    }

    /// Set the number of bits of the ring.
    pub fn ring_bits(&mut self, ring_bits: u8) -> &mut Self {
        self.0.ring_bits = ring_bits;

        self
    }

    /// Use an explicit id instead of the hash of the name and address.
    pub fn id(&mut self, id: Id) -> &mut Self {
        self.0.id = Some(id);

        self
    }

    /// Join the ring through a node already part of it.
    pub fn bootstrap(&mut self, bootstrap: NodeInfo) -> &mut Self {
        self.0.bootstrap = Some(bootstrap);

        self
    }

    pub fn request_timeout(&mut self, request_timeout: Duration) -> &mut Self {
        self.0.request_timeout = request_timeout;

        self
    }

    pub fn stabilize_interval(&mut self, interval: Duration) -> &mut Self {
        self.0.stabilize_interval = interval;

        self
    }

    pub fn fix_fingers_interval(&mut self, interval: Duration) -> &mut Self {
        self.0.fix_fingers_interval = interval;

        self
    }

    pub fn check_predecessor_interval(&mut self, interval: Duration) -> &mut Self {
        self.0.check_predecessor_interval = interval;

        self
    }

    pub fn max_hops(&mut self, max_hops: u32) -> &mut Self {
        self.0.max_hops = max_hops;

        self
    }

    pub fn cache_ttl(&mut self, cache_ttl: Duration) -> &mut Self {
        self.0.cache_ttl = cache_ttl;

        self
    }

    /// Bind the socket, join the ring if a bootstrap node is set, and start the node.
    pub fn build(&self) -> Result<Chord> {
        Chord::new(self.0.clone())
    }
}

impl Chord {
    /// Returns a builder to edit settings before creating a node.
    pub fn builder() -> ChordBuilder {
        ChordBuilder::default()
    }

    /// Start a node with the given config.
    ///
    /// The ring id is derived from the bound address, so binding to port `0`
    /// still gives a stable id for the lifetime of the node.
    ///
    /// Fails with [Error::InvalidAddress] if the address is unspecified, as
    /// peers couldn't reach it.
    pub fn new(mut config: Config) -> Result<Self> {
        if config.node.address.ip().is_unspecified() {
            return Err(Error::InvalidAddress(format!(
                "{} is unspecified and can't be advertised to other nodes",
                config.node.address
            )));
        }

        let socket = UdpSocket::bind(config.node.address)?;
        let local_addr = socket.local_addr()?;

        config.node.address = local_addr;

        let descriptor = config.descriptor()?;
        let transport = Arc::new(UdpTransport::new(
            *descriptor.id(),
            config.request_timeout,
        ));
        let node = Arc::new(ChordNode::new(&config, transport)?);

        info!(id = ?node.id(), ?local_addr, "Chord node listening");

        let (sender, receiver) = flume::bounded::<()>(1);

        let mut chord = Chord {
            node: node.clone(),
            local_addr,
            shutdown: Some(sender),
            handles: Vec::with_capacity(4),
        };

        let server = Server::new(socket, node.clone());
        let server_receiver = receiver.clone();
        chord.spawn("chord-server", move || {
            if let Err(error) = server.run(server_receiver) {
                error!(?error, "Chord server stopped");
            }
        })?;

        if let Some(introducer) = config.bootstrap_descriptor()? {
            if let Err(error) = node.join(&introducer) {
                chord.shutdown();
                return Err(error);
            }
        }

        chord.spawn_periodic(
            "chord-stabilize",
            config.stabilize_interval,
            receiver.clone(),
            |node| node.stabilize(),
        )?;
        chord.spawn_periodic(
            "chord-fix-fingers",
            config.fix_fingers_interval,
            receiver.clone(),
            |node| node.fix_fingers(),
        )?;
        chord.spawn_periodic(
            "chord-check-predecessor",
            config.check_predecessor_interval,
            receiver,
            |node| {
                node.check_predecessor();
                node.prune_descriptor_cache();
            },
        )?;

        Ok(chord)
    }

    // === Getters ===

    /// Returns this node's ring id.
    pub fn id(&self) -> &Id {
        self.node.id()
    }

    pub fn descriptor(&self) -> &NodeDescriptor {
        self.node.descriptor()
    }

    /// Returns the address the server is listening to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The underlying [ChordNode].
    pub fn node(&self) -> &Arc<ChordNode> {
        &self.node
    }

    /// Information and statistics about this node.
    pub fn info(&self) -> Info {
        self.node.info()
    }

    // === Public Methods ===

    /// See [ChordNode::find_successor].
    pub fn find_successor(&self, id: Id) -> Result<NodeDescriptor> {
        self.node.find_successor(id)
    }

    /// See [ChordNode::add_key].
    pub fn add_key(&self, key: Id) -> Result<NodeDescriptor> {
        self.node.add_key(key)
    }

    /// Stop the server and maintenance threads, and wait for them to finish.
    pub fn shutdown(&mut self) {
        if self.shutdown.take().is_none() {
            return;
        }

        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }

        debug!(id = ?self.node.id(), "Chord node shut down");
    }

    // === Private Methods ===

    fn spawn(&mut self, name: &str, task: impl FnOnce() + Send + 'static) -> Result<()> {
        let handle = thread::Builder::new().name(name.to_string()).spawn(task)?;
        self.handles.push(handle);

        Ok(())
    }

    fn spawn_periodic(
        &mut self,
        name: &str,
        interval: Duration,
        shutdown: Receiver<()>,
        task: fn(&ChordNode),
    ) -> Result<()> {
        let node = self.node.clone();

        self.spawn(name, move || loop {
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => task(&node),
                // Disconnected when every sender is dropped.
                _ => break,
            }
        })
    }
}

impl Drop for Chord {
    fn drop(&mut self) {
        self.shutdown();
    }
}
