//! Mutable state of a Chord node.
//!
//! Every field has its own narrow synchronization, nothing here is ever held
//! across a remote call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use tracing::{debug, warn};

use crate::common::{in_open, FingerTable, Id, IdSpace, NodeDescriptor};

#[derive(Debug)]
/// Successor, predecessor, fingers, known nodes and owned keys of a node.
pub struct RingState {
    space: IdSpace,
    this: NodeDescriptor,
    fingers: FingerTable,
    predecessor: RwLock<Option<NodeDescriptor>>,
    descriptors: DescriptorCache,
    keys: DashSet<Id>,
    /// Cursor of the finger refreshed by the next fix-fingers round.
    next_finger: AtomicUsize,
}

impl RingState {
    pub fn new(space: IdSpace, this: NodeDescriptor, cache_ttl: Duration) -> Self {
        let fingers = FingerTable::new(&space, *this.id());

        RingState {
            space,
            fingers,
            predecessor: RwLock::new(None),
            descriptors: DescriptorCache::new(*this.id(), cache_ttl),
            keys: DashSet::new(),
            next_finger: AtomicUsize::new(0),
            this,
        }
    }

    // === Getters ===

    pub fn space(&self) -> &IdSpace {
        &self.space
    }

    /// This node's descriptor.
    pub fn this(&self) -> &NodeDescriptor {
        &self.this
    }

    pub fn id(&self) -> &Id {
        self.this.id()
    }

    pub fn fingers(&self) -> &FingerTable {
        &self.fingers
    }

    pub fn keys(&self) -> &DashSet<Id> {
        &self.keys
    }

    // === Successor ===

    /// Immediate successor, resolved through the descriptor cache.
    ///
    /// Falls back to this node if the successor id is not resolvable,
    /// stabilization heals it on a later round.
    pub fn successor(&self) -> NodeDescriptor {
        let id = self.fingers.successor();

        match self.resolve(&id) {
            Some(successor) => successor,
            None => {
                warn!(?id, "Successor is not in the descriptor cache");
                self.this.clone()
            }
        }
    }

    pub fn set_successor(&self, successor: &NodeDescriptor) {
        self.remember(successor);
        self.fingers.set_successor(*successor.id());
    }

    /// Replace the successor only if it is still `current`.
    pub fn replace_successor(&self, current: &Id, new: &NodeDescriptor) -> bool {
        self.remember(new);
        self.fingers.compare_and_set_successor(*current, *new.id())
    }

    // === Predecessor ===

    pub fn predecessor(&self) -> Option<NodeDescriptor> {
        self.predecessor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adopt `candidate` as predecessor if there is none, or if it lies strictly
    /// between the current predecessor and this node.
    ///
    /// Returns `true` if the predecessor changed.
    pub fn offer_predecessor(&self, candidate: &NodeDescriptor) -> bool {
        let mut predecessor = self
            .predecessor
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let adopt = match predecessor.as_ref() {
            None => true,
            Some(current) => in_open(*current.id(), *self.id(), *candidate.id()),
        };

        if adopt {
            self.remember(candidate);
            *predecessor = Some(candidate.clone());
        }

        adopt
    }

    /// Clear the predecessor only if it is still `current`.
    ///
    /// Returns `true` if it was cleared.
    pub fn clear_predecessor(&self, current: &Id) -> bool {
        let mut predecessor = self
            .predecessor
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if predecessor.as_ref().map(|p| p.id()) == Some(current) {
            *predecessor = None;
            true
        } else {
            false
        }
    }

    // === Fingers ===

    /// Advance the fix-fingers cursor by one, wrapping after the last finger,
    /// and return the new position.
    pub fn advance_next_finger(&self) -> usize {
        let len = self.fingers.len();

        let previous = self
            .next_finger
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| {
                Some((next + 1) % len)
            })
            .unwrap_or_else(|previous| previous);

        (previous + 1) % len
    }

    // === Descriptors ===

    /// Record a node descriptor, refreshing its age if already known.
    pub fn remember(&self, node: &NodeDescriptor) {
        if node.id() != self.id() {
            self.descriptors.insert(node);
        }
    }

    /// Resolve an id to a descriptor, this node included.
    pub fn resolve(&self, id: &Id) -> Option<NodeDescriptor> {
        if id == self.id() {
            return Some(self.this.clone());
        }

        self.descriptors.get(id)
    }

    pub fn known_nodes(&self) -> usize {
        self.descriptors.len()
    }

    /// Drop descriptors not referenced by a finger or the predecessor, once older
    /// than the cache ttl. Returns the number of removed entries.
    pub fn prune_descriptors(&self) -> usize {
        let predecessor = self.predecessor().map(|p| *p.id());

        self.descriptors.prune(Instant::now(), |id| {
            predecessor.as_ref() == Some(id) || self.fingers.references(id)
        })
    }
}

#[derive(Debug)]
/// Concurrent map of known node ids to their descriptors.
pub struct DescriptorCache {
    owner: Id,
    ttl: Duration,
    entries: DashMap<Id, (NodeDescriptor, Instant)>,
}

impl DescriptorCache {
    pub fn new(owner: Id, ttl: Duration) -> Self {
        DescriptorCache {
            owner,
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, node: &NodeDescriptor) {
        self.entries
            .insert(*node.id(), (node.clone(), Instant::now()));
    }

    pub fn get(&self, id: &Id) -> Option<NodeDescriptor> {
        self.entries.get(id).map(|entry| entry.0.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&self, now: Instant, referenced: impl Fn(&Id) -> bool) -> usize {
        let before = self.entries.len();

        self.entries.retain(|id, (_, inserted_at)| {
            *id == self.owner
                || referenced(id)
                || now.saturating_duration_since(*inserted_at) < self.ttl
        });

        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Pruned node descriptors");
        }

        removed
    }
}
