#![doc = include_str!("../README.md")]

// Public modules
pub mod common;
pub mod config;
pub mod core;
pub mod server;
pub mod transport;

mod chord;
mod error;

pub use crate::chord::{Chord, ChordBuilder};
pub use crate::common::{Id, IdSpace, NodeDescriptor, NodeInfo};
pub use crate::config::Config;
pub use crate::core::{ChordNode, Info};
pub use crate::error::{Error, Result, TransportError};
pub use crate::transport::{LocalNetwork, RemoteCall, Transport, UdpTransport};
