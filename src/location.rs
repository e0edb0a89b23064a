//! Best-effort cache from key to its last known slot.
//!
//! The index is never authoritative. Every hit must be verified against the
//! slot it points at before it is trusted; a mismatch means the entry is
//! stale and the caller falls back to a full partition search.

use std::hash::Hash;

use crate::hash::{fixed_state, FixedMap};

/// The region of a partition a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Fast,
    Core,
    Overflow,
}

/// Where a key sits inside its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Index into the fast region.
    Fast(usize),
    /// Linearized coordinate in the core region.
    Core(usize),
    /// Conflict key of the overflow bucket.
    Overflow(u64),
}

impl Locator {
    pub fn region(&self) -> RegionKind {
        match self {
            Locator::Fast(_) => RegionKind::Fast,
            Locator::Core(_) => RegionKind::Core,
            Locator::Overflow(_) => RegionKind::Overflow,
        }
    }
}

/// A partition id plus a locator within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub partition: usize,
    pub locator: Locator,
}

impl Location {
    pub fn new(partition: usize, locator: Locator) -> Self {
        Location { partition, locator }
    }

    pub fn region(&self) -> RegionKind {
        self.locator.region()
    }
}

#[derive(Debug, Clone)]
pub struct LocationIndex<K>
where
    K: Hash + Eq,
{
    entries: FixedMap<K, Location>,
}

impl<K> Default for LocationIndex<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LocationIndex<K>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        LocationIndex {
            entries: FixedMap::with_hasher(fixed_state()),
        }
    }

    pub fn lookup(&self, key: &K) -> Option<Location> {
        self.entries.get(key).copied()
    }

    /// Writes or overwrites the location of `key`.
    pub fn record(&mut self, key: K, location: Location) {
        self.entries.insert(key, location);
    }

    /// Overwrites an existing entry without cloning the key.
    pub fn update(&mut self, key: &K, location: Location) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                *slot = location;
                true
            }
            None => false,
        }
    }

    pub fn forget(&mut self, key: &K) -> Option<Location> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
