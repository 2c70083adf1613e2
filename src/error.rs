//! Main Crate Error

use std::net::SocketAddr;

use crate::common::Id;

/// Alias for results returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
/// Chord crate error enum.
pub enum Error {
    /// The configured ring size is outside `1..=64` bits.
    #[error("Invalid ring size: {0} bits, expected 1..=64")]
    InvalidRingBits(u8),

    /// An id or key does not fit in the ring's identifier space.
    #[error("{id:?} is out of range for a {bits} bits ring")]
    IdOutOfRange { id: Id, bits: u8 },

    /// Finger table index is out of bounds.
    #[error("Finger index {index} out of bounds, table has {len} entries")]
    FingerIndexOutOfBounds { index: usize, len: usize },

    /// A lookup was forwarded more times than allowed, the ring is probably inconsistent.
    #[error("Lookup exceeded the maximum of {0} hops")]
    HopLimitExceeded(u32),

    #[error("Invalid Id size, expected 8, got {0}")]
    InvalidIdSize(usize),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Well formed bencode that is not a valid Chord message.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Failed to parse packet bytes: {0}")]
    BencodeError(#[from] serde_bencode::Error),

    #[error(transparent)]
    /// Failure reaching a remote node.
    Transport(#[from] TransportError),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
/// Failures of a [crate::Transport] call.
///
/// Any of these means the remote node should be considered unreachable for this round.
pub enum TransportError {
    #[error("Node at {0} is unreachable")]
    Unreachable(SocketAddr),

    #[error("Request to {0} timed out")]
    Timeout(SocketAddr),

    /// The remote node answered with an error message.
    #[error("Remote error {code}: {description}")]
    Remote { code: i32, description: String },

    /// A message could not be encoded, or the response made no sense.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    Io(#[from] std::io::Error),
}
