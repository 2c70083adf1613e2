//! Chord ring identifiers and the modular arithmetic of the identifier space.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

use crate::{Error, Result};

/// The size of an encoded [Id] in bytes.
pub const ID_SIZE: usize = 8;
/// Largest supported ring size in bits.
pub const MAX_RING_BITS: u8 = 64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default, Serialize, Deserialize)]
/// A point on the Chord ring: a node id or a key.
pub struct Id(pub u64);

impl Id {
    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE](crate::common::ID_SIZE).
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        let array: [u8; ID_SIZE] = bytes
            .try_into()
            .map_err(|_| Error::InvalidIdSize(bytes.len()))?;

        Ok(Id(u64::from_be_bytes(array)))
    }

    /// Big-endian byte representation.
    pub fn to_bytes(&self) -> [u8; ID_SIZE] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Id(value)
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The identifier space `[0, 2^bits)` that every [Id] of a ring lives in.
pub struct IdSpace {
    bits: u8,
    mask: u64,
}

impl IdSpace {
    /// Create a ring of `2^bits` identifiers, `bits` must be in `1..=64`.
    pub fn new(bits: u8) -> Result<Self> {
        if bits == 0 || bits > MAX_RING_BITS {
            return Err(Error::InvalidRingBits(bits));
        }

        let mask = if bits == MAX_RING_BITS {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };

        Ok(IdSpace { bits, mask })
    }

    // === Getters ===

    /// Number of bits `m` of this ring, also the number of fingers.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Highest id of this ring, `2^m - 1`.
    pub fn max(&self) -> Id {
        Id(self.mask)
    }

    /// Number of ids on the ring, `2^m`.
    pub fn size(&self) -> u128 {
        self.mask as u128 + 1
    }

    // === Public Methods ===

    /// Returns `true` if `id` fits in this ring.
    pub fn contains(&self, id: Id) -> bool {
        id.0 <= self.mask
    }

    /// Returns `id` unchanged if it fits in this ring.
    pub fn check(&self, id: Id) -> Result<Id> {
        if self.contains(id) {
            Ok(id)
        } else {
            Err(Error::IdOutOfRange {
                id,
                bits: self.bits,
            })
        }
    }

    /// `(id + delta) mod 2^m`
    pub fn add(&self, id: Id, delta: u64) -> Id {
        Id(id.0.wrapping_add(delta) & self.mask)
    }

    /// Start of the finger `index` of a node with id `id`: `(id + 2^index) mod 2^m`.
    pub fn finger_start(&self, id: Id, index: usize) -> Id {
        // index < bits <= 64, the shift never overflows.
        self.add(id, 1u64 << index)
    }

    /// Hash arbitrary bytes onto the ring.
    ///
    /// Takes the first 8 bytes of the SHA-1 digest as a big-endian integer
    /// and keeps its `m` most significant bits.
    pub fn hash(&self, input: &[u8]) -> Id {
        let digest = sha1_smol::Sha1::from(input).digest().bytes();

        let mut prefix = [0u8; ID_SIZE];
        prefix.copy_from_slice(&digest[..ID_SIZE]);

        let value = u64::from_be_bytes(prefix);

        Id(value >> (MAX_RING_BITS - self.bits))
    }

    /// A uniformly random id on this ring.
    pub fn random_id(&self) -> Id {
        let mut rng = rand::thread_rng();

        Id(rng.gen::<u64>() & self.mask)
    }
}

/// `x ∈ (lo, hi)` walking clockwise from `lo`.
///
/// When `lo == hi` the interval is the whole ring except `lo`.
pub fn in_open(lo: Id, hi: Id, x: Id) -> bool {
    if lo < hi {
        lo < x && x < hi
    } else {
        x > lo || x < hi
    }
}

/// `x ∈ (lo, hi]` walking clockwise from `lo`.
///
/// When `lo == hi` the interval is the whole ring.
pub fn in_open_closed(lo: Id, hi: Id, x: Id) -> bool {
    if lo < hi {
        lo < x && x <= hi
    } else {
        x > lo || x <= hi
    }
}

/// `x ∈ [lo, hi)` walking clockwise from `lo`.
///
/// When `lo == hi` the interval is the whole ring.
pub fn in_closed_open(lo: Id, hi: Id, x: Id) -> bool {
    if lo < hi {
        lo <= x && x < hi
    } else {
        x >= lo || x < hi
    }
}
