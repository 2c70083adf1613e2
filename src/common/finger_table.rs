//! Chord finger table

use std::slice::Iter;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::common::{in_closed_open, Id, IdSpace};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Half open ring interval `[start, end)`.
pub struct Interval {
    pub start: Id,
    pub end: Id,
}

impl Interval {
    pub fn contains(&self, id: Id) -> bool {
        in_closed_open(self.start, self.end, id)
    }
}

/// Lock free optional [Id].
///
/// Once set, it never goes back to empty, which is what lets
/// a flag and a value live in two separate atomics.
#[derive(Debug, Default)]
struct AtomicTarget {
    present: AtomicBool,
    value: AtomicU64,
}

impl AtomicTarget {
    fn load(&self) -> Option<Id> {
        if self.present.load(Ordering::Acquire) {
            Some(Id(self.value.load(Ordering::Acquire)))
        } else {
            None
        }
    }

    fn store(&self, id: Id) {
        self.value.store(id.0, Ordering::Release);
        self.present.store(true, Ordering::Release);
    }

    fn compare_and_set(&self, current: Id, new: Id) -> bool {
        self.present.load(Ordering::Acquire)
            && self
                .value
                .compare_exchange(current.0, new.0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }
}

#[derive(Debug)]
/// A routing shortcut, `start` and `interval` are fixed, only the `target` moves.
pub struct Finger {
    start: Id,
    interval: Interval,
    target: AtomicTarget,
}

impl Finger {
    /// `(n + 2^i) mod 2^m`
    pub fn start(&self) -> Id {
        self.start
    }

    /// `[start_i, start_{i+1})`, the last one ends at `start_0`.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Current target, `None` until the first fix.
    pub fn target(&self) -> Option<Id> {
        self.target.load()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Point in time copy of a [Finger] for diagnostics.
pub struct FingerSnapshot {
    pub index: usize,
    pub start: Id,
    pub interval: Interval,
    pub target: Option<Id>,
}

#[derive(Debug)]
/// Table of `m` fingers of a node, finger 0 being its immediate successor.
///
/// Every slot is read and written atomically, readers never block.
pub struct FingerTable {
    owner: Id,
    fingers: Box<[Finger]>,
}

impl FingerTable {
    /// Create the `m` fingers of the node `owner`, with the successor seeded to `owner`.
    pub fn new(space: &IdSpace, owner: Id) -> Self {
        let bits = space.bits() as usize;

        let starts: Vec<Id> = (0..bits)
            .map(|index| space.finger_start(owner, index))
            .collect();

        let fingers: Box<[Finger]> = starts
            .iter()
            .enumerate()
            .map(|(index, start)| Finger {
                start: *start,
                interval: Interval {
                    start: *start,
                    end: starts[(index + 1) % bits],
                },
                target: AtomicTarget::default(),
            })
            .collect();

        let table = FingerTable { owner, fingers };

        // A singleton ring is its own successor.
        table.fingers[0].target.store(owner);

        table
    }

    // === Getters ===

    pub fn len(&self) -> usize {
        self.fingers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Finger> {
        self.fingers.get(index)
    }

    pub fn iter(&self) -> Iter<'_, Finger> {
        self.fingers.iter()
    }

    /// Immediate successor, `target_0`.
    pub fn successor(&self) -> Id {
        self.fingers[0].target().unwrap_or(self.owner)
    }

    // === Public Methods ===

    pub fn set_successor(&self, id: Id) {
        self.fingers[0].target.store(id);
    }

    /// Replace the successor only if it is still `current`.
    ///
    /// Returns `true` if the successor was replaced.
    pub fn compare_and_set_successor(&self, current: Id, new: Id) -> bool {
        self.fingers[0].target.compare_and_set(current, new)
    }

    pub fn target(&self, index: usize) -> Result<Option<Id>> {
        Ok(self.finger(index)?.target())
    }

    pub fn set_target(&self, index: usize, id: Id) -> Result<()> {
        self.finger(index)?.target.store(id);
        Ok(())
    }

    /// Returns `true` if `id` is the target of any finger.
    pub fn references(&self, id: &Id) -> bool {
        self.fingers.iter().any(|finger| finger.target() == Some(*id))
    }

    /// Copy of every finger for diagnostics.
    pub fn snapshot(&self) -> Vec<FingerSnapshot> {
        self.fingers
            .iter()
            .enumerate()
            .map(|(index, finger)| FingerSnapshot {
                index,
                start: finger.start,
                interval: finger.interval,
                target: finger.target(),
            })
            .collect()
    }

    // === Private Methods ===

    fn finger(&self, index: usize) -> Result<&Finger> {
        self.fingers.get(index).ok_or(Error::FingerIndexOutOfBounds {
            index,
            len: self.fingers.len(),
        })
    }
}
