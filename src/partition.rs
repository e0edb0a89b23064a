//! A single shard of the key space.
//!
//! A partition owns three regions, searched in this order:
//!
//! 1. the fast region, a small direct-mapped array,
//! 2. the core region, a dense array addressed by linearized coordinate,
//!    first at the key's primary coordinate and then along a bounded probe
//!    window,
//! 3. the overflow region, an unbounded map of buckets keyed by conflict key.
//!
//! Placement can never fail: when the probe window is exhausted the entry
//! lands in its overflow bucket.

use std::hash::Hash;

use crate::hash::{fixed_state, Address, FixedMap, FixedSet, Shape};
use crate::location::Locator;
use crate::probe::ProbePaths;

/// Opaque tag a caller may attach to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetaTag(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Entry<K, V> {
    pub key: K,
    pub value: V,
    pub meta: Option<MetaTag>,
}

impl<K, V> Entry<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Entry {
            key,
            value,
            meta: None,
        }
    }

    pub fn tagged(key: K, value: V, meta: MetaTag) -> Self {
        Entry {
            key,
            value,
            meta: Some(meta),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Partition<K, V>
where
    K: Hash + Eq,
{
    id: usize,
    shape: Shape,
    paths: ProbePaths,
    probe_budget: usize,
    fast: Vec<Option<Entry<K, V>>>,
    core: Vec<Option<Entry<K, V>>>,
    overflow: FixedMap<u64, Vec<Entry<K, V>>>,
    fast_len: usize,
    core_len: usize,
    overflow_len: usize,
    hot_keys: FixedSet<K>,
}

impl<K, V> Partition<K, V>
where
    K: Hash + Eq,
{
    pub fn new(
        id: usize,
        shape: &Shape,
        max_anchors: usize,
        max_path_len: usize,
        probe_budget: usize,
    ) -> Self {
        let mut fast: Vec<Option<Entry<K, V>>> = Vec::with_capacity(shape.fast_capacity());
        fast.resize_with(shape.fast_capacity(), || None);
        let mut core: Vec<Option<Entry<K, V>>> = Vec::with_capacity(shape.core_capacity());
        core.resize_with(shape.core_capacity(), || None);
        Partition {
            id,
            shape: shape.clone(),
            paths: ProbePaths::build(shape, max_anchors, max_path_len),
            probe_budget,
            fast,
            core,
            overflow: FixedMap::with_hasher(fixed_state()),
            fast_len: 0,
            core_len: 0,
            overflow_len: 0,
            hot_keys: FixedSet::with_hasher(fixed_state()),
        }
    }

    #[cfg(test)]
    pub fn paths(&self) -> &ProbePaths {
        &self.paths
    }

    /// Live entries across all three regions.
    pub fn len(&self) -> usize {
        self.fast_len + self.core_len + self.overflow_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fast_len(&self) -> usize {
        self.fast_len
    }

    pub fn core_len(&self) -> usize {
        self.core_len
    }

    pub fn overflow_len(&self) -> usize {
        self.overflow_len
    }

    /// Full search in fast, core, probe window, overflow order.
    pub fn find(&self, key: &K, address: &Address) -> Option<Locator> {
        if let Some(entry) = &self.fast[address.fast_index] {
            if entry.key == *key {
                return Some(Locator::Fast(address.fast_index));
            }
        }
        if let Some(entry) = &self.core[address.core_offset] {
            if entry.key == *key {
                return Some(Locator::Core(address.core_offset));
            }
        }
        for offset in self
            .paths
            .window(&self.shape, address.core_offset, self.probe_budget)
        {
            if let Some(entry) = &self.core[offset] {
                if entry.key == *key {
                    return Some(Locator::Core(offset));
                }
            }
        }
        match self.overflow.get(&address.conflict_key) {
            Some(bucket) if bucket.iter().any(|e| e.key == *key) => {
                Some(Locator::Overflow(address.conflict_key))
            }
            _ => None,
        }
    }

    /// The entry at `locator`, only if it holds `key`.
    pub fn entry_at(&self, locator: Locator, key: &K) -> Option<&Entry<K, V>> {
        match locator {
            Locator::Fast(i) => self.fast.get(i)?.as_ref().filter(|e| e.key == *key),
            Locator::Core(o) => self.core.get(o)?.as_ref().filter(|e| e.key == *key),
            Locator::Overflow(c) => self.overflow.get(&c)?.iter().find(|e| e.key == *key),
        }
    }

    pub fn entry_at_mut(&mut self, locator: Locator, key: &K) -> Option<&mut Entry<K, V>> {
        match locator {
            Locator::Fast(i) => self.fast.get_mut(i)?.as_mut().filter(|e| e.key == *key),
            Locator::Core(o) => self.core.get_mut(o)?.as_mut().filter(|e| e.key == *key),
            Locator::Overflow(c) => self
                .overflow
                .get_mut(&c)?
                .iter_mut()
                .find(|e| e.key == *key),
        }
    }

    pub fn fast_occupant(&self, index: usize) -> Option<&Entry<K, V>> {
        self.fast.get(index)?.as_ref()
    }

    /// Places a key that is not yet stored anywhere in this partition.
    ///
    /// Tries the fast slot, the primary core coordinate and the probe window
    /// in turn, and falls back to the overflow bucket.
    pub fn place(&mut self, entry: Entry<K, V>, address: &Address) -> Locator {
        if self.fast[address.fast_index].is_none() {
            self.fast[address.fast_index] = Some(entry);
            self.fast_len += 1;
            return Locator::Fast(address.fast_index);
        }
        self.place_in_core(entry, address)
    }

    /// Same as [`Partition::place`] but never uses the fast region.
    pub fn place_in_core(&mut self, entry: Entry<K, V>, address: &Address) -> Locator {
        if self.core[address.core_offset].is_none() {
            self.core[address.core_offset] = Some(entry);
            self.core_len += 1;
            return Locator::Core(address.core_offset);
        }
        let free: Option<usize> = self
            .paths
            .window(&self.shape, address.core_offset, self.probe_budget)
            .find(|offset| self.core[*offset].is_none());
        if let Some(offset) = free {
            self.core[offset] = Some(entry);
            self.core_len += 1;
            return Locator::Core(offset);
        }
        tracing::trace!(
            partition = self.id,
            conflict_key = address.conflict_key,
            "probe window exhausted, placing in overflow"
        );
        self.overflow
            .entry(address.conflict_key)
            .or_default()
            .push(entry);
        self.overflow_len += 1;
        Locator::Overflow(address.conflict_key)
    }

    /// Puts `entry` into fast slot `index`, which must be empty.
    pub fn place_fast(&mut self, entry: Entry<K, V>, index: usize) -> Locator {
        debug_assert!(self.fast[index].is_none());
        self.fast[index] = Some(entry);
        self.fast_len += 1;
        Locator::Fast(index)
    }

    /// Removes and returns the entry for `key` at `locator`.
    pub fn take(&mut self, locator: Locator, key: &K) -> Option<Entry<K, V>> {
        match locator {
            Locator::Fast(i) => {
                let slot: &mut Option<Entry<K, V>> = self.fast.get_mut(i)?;
                if slot.as_ref().map_or(false, |e| e.key == *key) {
                    self.fast_len -= 1;
                    slot.take()
                } else {
                    None
                }
            }
            Locator::Core(o) => {
                let slot: &mut Option<Entry<K, V>> = self.core.get_mut(o)?;
                if slot.as_ref().map_or(false, |e| e.key == *key) {
                    self.core_len -= 1;
                    slot.take()
                } else {
                    None
                }
            }
            Locator::Overflow(c) => {
                let bucket: &mut Vec<Entry<K, V>> = self.overflow.get_mut(&c)?;
                let position: usize = bucket.iter().position(|e| e.key == *key)?;
                let entry: Entry<K, V> = bucket.swap_remove(position);
                if bucket.is_empty() {
                    self.overflow.remove(&c);
                }
                self.overflow_len -= 1;
                Some(entry)
            }
        }
    }

    /// Empties the fast slot `index`, returning its occupant.
    pub fn take_fast(&mut self, index: usize) -> Option<Entry<K, V>> {
        let entry: Option<Entry<K, V>> = self.fast.get_mut(index)?.take();
        if entry.is_some() {
            self.fast_len -= 1;
        }
        entry
    }

    /// Moves every live entry out, leaving the partition empty.
    pub fn drain(&mut self) -> Vec<Entry<K, V>> {
        let mut entries: Vec<Entry<K, V>> = Vec::with_capacity(self.len());
        entries.extend(self.fast.iter_mut().filter_map(Option::take));
        entries.extend(self.core.iter_mut().filter_map(Option::take));
        for (_, bucket) in self.overflow.drain() {
            entries.extend(bucket);
        }
        self.fast_len = 0;
        self.core_len = 0;
        self.overflow_len = 0;
        self.hot_keys.clear();
        entries
    }

    /// Every live entry with its locator, region by region.
    pub fn iter(&self) -> impl Iterator<Item = (Locator, &Entry<K, V>)> {
        let fast = self
            .fast
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (Locator::Fast(i), e)));
        let core = self
            .core
            .iter()
            .enumerate()
            .filter_map(|(o, e)| e.as_ref().map(|e| (Locator::Core(o), e)));
        let overflow = self
            .overflow
            .iter()
            .flat_map(|(c, bucket)| bucket.iter().map(move |e| (Locator::Overflow(*c), e)));
        fast.chain(core).chain(overflow)
    }

    pub fn mark_hot(&mut self, key: K) {
        self.hot_keys.insert(key);
    }

    pub fn unmark_hot(&mut self, key: &K) {
        self.hot_keys.remove(key);
    }

    #[cfg(test)]
    pub fn is_hot(&self, key: &K) -> bool {
        self.hot_keys.contains(key)
    }

    /// Keys a minor pass last found hot and still stored here.
    pub fn hot_len(&self) -> usize {
        self.hot_keys.len()
    }

    pub fn retain_hot<F>(&mut self, f: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.hot_keys.retain(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::KeyHasher;

    fn partition(shape: &Shape, budget: usize) -> Partition<u64, u64> {
        Partition::new(0, shape, 5, 64, budget)
    }

    /// Address with chosen slots, for forcing collisions.
    fn forced(fast_index: usize, core_offset: usize, conflict_key: u64) -> Address {
        Address {
            partition: 0,
            fast_index,
            core_offset,
            conflict_key,
        }
    }

    #[test]
    fn test_region_order() {
        let shape: Shape = Shape::for_capacity(64, 2, 1);
        let mut p: Partition<u64, u64> = partition(&shape, 4);

        assert_eq!(p.place(Entry::new(1, 10), &forced(0, 5, 1)), Locator::Fast(0));
        assert_eq!(p.place(Entry::new(2, 20), &forced(0, 5, 2)), Locator::Core(5));
        let third: Locator = p.place(Entry::new(3, 30), &forced(0, 5, 3));
        assert!(matches!(third, Locator::Core(o) if o != 5));

        assert_eq!(p.len(), 3);
        assert_eq!(p.fast_len(), 1);
        assert_eq!(p.core_len(), 2);

        assert_eq!(p.find(&1, &forced(0, 5, 1)), Some(Locator::Fast(0)));
        assert_eq!(p.find(&2, &forced(0, 5, 2)), Some(Locator::Core(5)));
        assert_eq!(p.find(&3, &forced(0, 5, 3)), Some(third));
        assert_eq!(p.find(&4, &forced(0, 5, 4)), None);
    }

    #[test]
    fn test_exhausted_window_spills_to_overflow() {
        let shape: Shape = Shape::for_capacity(64, 2, 1);
        let mut p: Partition<u64, u64> = partition(&shape, 2);
        let window: usize = p.paths().window(&shape, 5, 2).len();

        p.place(Entry::new(0, 0), &forced(0, 5, 0));
        // primary coordinate, the whole window, then overflow
        let mut spilled: Vec<u64> = Vec::new();
        for key in 1..(window as u64 + 5) {
            if let Locator::Overflow(_) = p.place(Entry::new(key, key), &forced(0, 5, 77)) {
                spilled.push(key);
            }
        }
        assert!(!spilled.is_empty());
        assert_eq!(p.overflow_len(), spilled.len());
        for key in spilled.iter() {
            assert_eq!(p.find(key, &forced(0, 5, 77)), Some(Locator::Overflow(77)));
            assert_eq!(
                p.entry_at(Locator::Overflow(77), key).map(|e| e.value),
                Some(*key)
            );
        }

        let first: u64 = spilled[0];
        assert!(p.take(Locator::Overflow(77), &first).is_some());
        assert_eq!(p.find(&first, &forced(0, 5, 77)), None);
        assert_eq!(p.overflow_len(), spilled.len() - 1);
    }

    #[test]
    fn test_entry_at_verifies_key() {
        let shape: Shape = Shape::for_capacity(64, 2, 1);
        let mut p: Partition<u64, u64> = partition(&shape, 4);
        p.place(Entry::new(1, 10), &forced(2, 3, 1));
        assert!(p.entry_at(Locator::Fast(2), &1).is_some());
        assert!(p.entry_at(Locator::Fast(2), &9).is_none());
        assert!(p.entry_at(Locator::Fast(1), &1).is_none());
        assert!(p.entry_at(Locator::Core(3), &1).is_none());
        assert!(p.take(Locator::Fast(2), &9).is_none());
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_drain_empties_everything() {
        let shape: Shape = Shape::for_capacity(256, 2, 1);
        let hasher: KeyHasher = KeyHasher::new();
        let mut p: Partition<u64, u64> = partition(&shape, 8);
        for key in 0..300u64 {
            let address: Address = hasher.address(&key, &shape);
            p.place(Entry::new(key, key * 2), &address);
        }
        assert_eq!(p.len(), 300);
        assert!(p.overflow_len() > 0);
        assert_eq!(p.iter().count(), 300);

        let mut drained: Vec<u64> = p.drain().into_iter().map(|e| e.key).collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..300).collect::<Vec<u64>>());
        assert!(p.is_empty());
        assert_eq!(p.iter().count(), 0);
    }

    #[test]
    fn test_hot_keys() {
        let shape: Shape = Shape::for_capacity(64, 2, 1);
        let mut p: Partition<u64, u64> = partition(&shape, 4);
        p.mark_hot(7);
        p.mark_hot(8);
        assert!(p.is_hot(&7));
        p.retain_hot(|k| *k != 7);
        assert!(!p.is_hot(&7));
        assert_eq!(p.hot_len(), 1);
        p.unmark_hot(&8);
        assert!(!p.is_hot(&8));
    }
}
