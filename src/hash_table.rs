//! The table controller.
//!
//! [`HashTable`] ties the pieces together: it derives an [`Address`] for each
//! key, searches the key's partition, keeps the location index and access
//! tracker current, promotes hot keys into the fast region and grows the
//! table once the load factor crosses its threshold.

use std::hash::Hash;
use std::time::Instant;

use crate::config::{PromotionParams, TableConfig};
use crate::error::{Result, TableError};
use crate::hash::{Address, KeyHasher, Shape};
use crate::location::{Location, LocationIndex, Locator, RegionKind};
use crate::partition::{Entry, MetaTag, Partition};
use crate::tracker::AccessTracker;

/// A point-in-time summary of a table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TableStats {
    pub size: usize,
    pub capacity: usize,
    pub load_factor: f64,
    pub partitions: usize,
    pub fast_entries: usize,
    pub core_entries: usize,
    pub overflow_entries: usize,
    /// Keys marked hot by the last minor passes.
    pub hot_keys: usize,
    /// Keys with a cached location.
    pub indexed_keys: usize,
    pub resizes: u64,
    pub minor_passes: u64,
    pub major_passes: u64,
    pub stale_index_hits: u64,
    pub promotions: u64,
    pub demotions: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    resizes: u64,
    minor_passes: u64,
    major_passes: u64,
    stale_index_hits: u64,
    promotions: u64,
    demotions: u64,
}

/// A tiered, self-tuning hash table.
///
/// Not synchronized: wrap it in a lock to share it between threads.
///
/// # Example
///
/// ```
/// use tiered_buckets::HashTable;
///
/// let mut table: HashTable<String, u32> = HashTable::with_capacity(64, 2).unwrap();
/// table.put("a".to_string(), 1);
/// table.put("b".to_string(), 2);
/// assert_eq!(table.get(&"a".to_string()), Some(&1));
/// assert!(table.remove(&"b".to_string()));
/// assert_eq!(table.size(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct HashTable<K, V>
where
    K: Hash + Eq + Clone,
{
    config: TableConfig,
    shape: Shape,
    hasher: KeyHasher,
    partitions: Vec<Partition<K, V>>,
    index: LocationIndex<K>,
    tracker: AccessTracker<K>,
    count: usize,
    ops_since_minor: u64,
    ops_since_major: u64,
    last_minor: Instant,
    last_major: Instant,
    counters: Counters,
}

impl<K, V> HashTable<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates a table with the default configuration and the given shape.
    pub fn with_capacity(initial_capacity: usize, dimensions: usize) -> Result<Self> {
        Self::with_config(
            TableConfig::builder()
                .initial_capacity(initial_capacity)
                .dimensions(dimensions)
                .build(),
        )
    }

    pub fn with_config(config: TableConfig) -> Result<Self> {
        config.validate()?;
        let shape: Shape = Shape::for_capacity(
            config.initial_capacity,
            config.dimensions,
            config.max_partitions,
        );
        let partitions: Vec<Partition<K, V>> = Self::build_partitions(&shape, &config);
        let now: Instant = Instant::now();
        Ok(HashTable {
            tracker: AccessTracker::new(config.recent_window),
            config,
            shape,
            hasher: KeyHasher::new(),
            partitions,
            index: LocationIndex::new(),
            count: 0,
            ops_since_minor: 0,
            ops_since_major: 0,
            last_minor: now,
            last_major: now,
            counters: Counters::default(),
        })
    }

    fn build_partitions(shape: &Shape, config: &TableConfig) -> Vec<Partition<K, V>> {
        (0..shape.partitions())
            .map(|id| {
                Partition::new(
                    id,
                    shape,
                    config.max_anchors,
                    config.max_path_len,
                    config.probe_budget,
                )
            })
            .collect()
    }

    pub fn size(&self) -> usize {
        self.count
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.shape.capacity()
    }

    pub fn load_factor(&self) -> f64 {
        if self.capacity() == 0 {
            0.0
        } else {
            self.count as f64 / self.capacity() as f64
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn tracker(&self) -> &AccessTracker<K> {
        &self.tracker
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            size: self.count,
            capacity: self.capacity(),
            load_factor: self.load_factor(),
            partitions: self.partitions.len(),
            fast_entries: self.partitions.iter().map(|p| p.fast_len()).sum(),
            core_entries: self.partitions.iter().map(|p| p.core_len()).sum(),
            overflow_entries: self.partitions.iter().map(|p| p.overflow_len()).sum(),
            hot_keys: self.partitions.iter().map(|p| p.hot_len()).sum(),
            indexed_keys: self.index.len(),
            resizes: self.counters.resizes,
            minor_passes: self.counters.minor_passes,
            major_passes: self.counters.major_passes,
            stale_index_hits: self.counters.stale_index_hits,
            promotions: self.counters.promotions,
            demotions: self.counters.demotions,
        }
    }

    /// Sets the promotion threshold, the required frequency ratio over an
    /// incumbent and the decay applied by major passes.
    pub fn set_promotion_parameters(&mut self, threshold: u64, ratio: f64, decay: f64) -> Result<()> {
        let params: PromotionParams = PromotionParams {
            threshold,
            ratio,
            decay,
            ..self.config.promotion.clone()
        };
        self.set_promotion_config(params)
    }

    /// Replaces every promotion and scheduling knob at once.
    pub fn set_promotion_config(&mut self, params: PromotionParams) -> Result<()> {
        params.validate()?;
        self.config.promotion = params;
        Ok(())
    }

    /// Changes the resize trigger, growing right away if it is already exceeded.
    pub fn set_load_factor_threshold(&mut self, threshold: f64) -> Result<()> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(TableError::InvalidLoadFactor { threshold });
        }
        self.config.load_factor_threshold = threshold;
        while self.should_grow() {
            self.grow();
        }
        Ok(())
    }

    #[inline]
    fn address(&self, key: &K) -> Address {
        self.hasher.address(key, &self.shape)
    }

    /// Is the load factor above the configured threshold?
    fn should_grow(&self) -> bool {
        self.load_factor() > self.config.load_factor_threshold
    }

    /// Inserts or updates `key`, returning the previous value if there was one.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        self.upsert(key, value, None)
    }

    /// Like [`HashTable::put`], attaching `meta` to the stored value.
    pub fn put_tagged(&mut self, key: K, value: V, meta: MetaTag) -> Option<V> {
        self.upsert(key, value, Some(meta))
    }

    fn upsert(&mut self, key: K, value: V, meta: Option<MetaTag>) -> Option<V> {
        self.tick();
        let address: Address = self.address(&key);
        if let Some(location) = self.locate(&key, &address) {
            if let Some(entry) =
                self.partitions[location.partition].entry_at_mut(location.locator, &key)
            {
                entry.meta = meta;
                let previous: V = std::mem::replace(&mut entry.value, value);
                self.touch(&key, location);
                return Some(previous);
            }
        }

        let location: Location = self.store(
            Entry {
                key: key.clone(),
                value,
                meta,
            },
            &address,
        );
        self.touch(&key, location);
        if self.should_grow() {
            self.grow();
        }
        None
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.get_tagged(key).map(|(value, _)| value)
    }

    /// The value of `key` together with its tag, if any.
    pub fn get_tagged(&mut self, key: &K) -> Option<(&V, Option<MetaTag>)> {
        self.tick();
        let address: Address = self.address(key);
        let location: Location = self.locate(key, &address)?;
        let location: Location = self.touch(key, location);
        self.partitions[location.partition]
            .entry_at(location.locator, key)
            .map(|e| (&e.value, e.meta))
    }

    /// Looks a key up without recording an access or repairing the index.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let location: Location = self.location_of(key)?;
        self.partitions[location.partition]
            .entry_at(location.locator, key)
            .map(|e| &e.value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.location_of(key).is_some()
    }

    /// The verified current location of `key`.
    pub fn location_of(&self, key: &K) -> Option<Location> {
        if let Some(location) = self.index.lookup(key) {
            let verified: bool = self
                .partitions
                .get(location.partition)
                .and_then(|p| p.entry_at(location.locator, key))
                .is_some();
            if verified {
                return Some(location);
            }
        }
        let address: Address = self.address(key);
        self.partitions[address.partition]
            .find(key, &address)
            .map(|locator| Location::new(address.partition, locator))
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.take(key).is_some()
    }

    /// Removes `key` and returns its value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        self.tick();
        let address: Address = self.address(key);
        let location: Location = self.locate(key, &address)?;
        let removed: Option<Entry<K, V>> =
            self.partitions[location.partition].take(location.locator, key);
        self.index.forget(key);
        self.tracker.forget(key);
        self.partitions[location.partition].unmark_hot(key);
        let entry: Entry<K, V> = removed?;
        self.count -= 1;
        Some(entry.value)
    }

    /// Removes every entry and all access history, keeping the current shape.
    pub fn clear(&mut self) {
        self.partitions = Self::build_partitions(&self.shape, &self.config);
        self.index.clear();
        self.tracker.clear();
        self.count = 0;
        self.reset_schedule();
    }

    /// Every live key and value, in partition and region order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.partitions
            .iter()
            .flat_map(|p| p.iter().map(|(_, e)| (&e.key, &e.value)))
    }

    /// Finds `key`, trying the location index before the full search.
    ///
    /// An index entry that no longer points at `key` is discarded. Whatever
    /// the full search finds is written back to the index.
    fn locate(&mut self, key: &K, address: &Address) -> Option<Location> {
        if let Some(location) = self.index.lookup(key) {
            let verified: bool = self
                .partitions
                .get(location.partition)
                .and_then(|p| p.entry_at(location.locator, key))
                .is_some();
            if verified {
                return Some(location);
            }
            tracing::trace!(
                partition = location.partition,
                region = ?location.region(),
                "discarding stale location index entry"
            );
            self.index.forget(key);
            self.counters.stale_index_hits += 1;
        }
        let locator: Locator = self.partitions[address.partition].find(key, address)?;
        let location: Location = Location::new(address.partition, locator);
        self.index.record(key.clone(), location);
        Some(location)
    }

    /// Places a key known to be absent and indexes it.
    fn store(&mut self, entry: Entry<K, V>, address: &Address) -> Location {
        let key: K = entry.key.clone();
        let locator: Locator = self.partitions[address.partition].place(entry, address);
        let location: Location = Location::new(address.partition, locator);
        self.index.record(key, location);
        self.count += 1;
        location
    }

    /// Records a successful access and promotes the key if it has become hot.
    /// Returns the key's location afterwards.
    fn touch(&mut self, key: &K, location: Location) -> Location {
        let frequency: u64 = self.tracker.record(key);
        if frequency >= self.config.promotion.threshold && location.region() != RegionKind::Fast {
            return self.promote(key, location);
        }
        location
    }

    /// Moves `key` into its fast slot.
    ///
    /// An empty slot is taken directly. An occupied slot is only taken when
    /// the key's frequency beats the occupant's by the promotion ratio; the
    /// occupant is then demoted through the regular placement path.
    fn promote(&mut self, key: &K, location: Location) -> Location {
        let address: Address = self.address(key);
        let target: usize = address.fast_index;
        let p: usize = location.partition;

        let occupant: Option<K> = self.partitions[p].fast_occupant(target).map(|e| e.key.clone());
        if let Some(occupant) = &occupant {
            let challenger: f64 = self.tracker.frequency(key) as f64;
            let incumbent: f64 = self.tracker.frequency(occupant) as f64;
            if !(challenger > incumbent * self.config.promotion.ratio) {
                return location;
            }
        }

        let Some(entry) = self.partitions[p].take(location.locator, key) else {
            return location;
        };
        let evicted: Option<Entry<K, V>> = self.partitions[p].take_fast(target);
        let promoted: Location = Location::new(p, self.partitions[p].place_fast(entry, target));
        self.index.update(key, promoted);
        self.partitions[p].mark_hot(key.clone());
        self.counters.promotions += 1;
        tracing::trace!(partition = p, slot = target, "promoted key into fast region");

        if let Some(evicted) = evicted {
            let evicted_address: Address = self.address(&evicted.key);
            let evicted_key: K = evicted.key.clone();
            let demoted: Locator = self.partitions[p].place(evicted, &evicted_address);
            self.index.record(evicted_key.clone(), Location::new(p, demoted));
            self.partitions[p].unmark_hot(&evicted_key);
            self.counters.demotions += 1;
        }
        promoted
    }

    /// Counts one operation and runs any optimization pass that is due.
    fn tick(&mut self) {
        self.ops_since_minor += 1;
        self.ops_since_major += 1;
        let params: &PromotionParams = &self.config.promotion;
        let major_due: bool = self.ops_since_major >= params.ops_threshold_major
            || self.last_major.elapsed() >= params.time_threshold_major;
        let minor_due: bool = self.ops_since_minor >= params.ops_threshold_minor
            || self.last_minor.elapsed() >= params.time_threshold_minor;
        if major_due {
            self.run_major_pass();
        }
        if minor_due {
            self.run_minor_pass();
        }
    }

    fn reset_schedule(&mut self) {
        let now: Instant = Instant::now();
        self.ops_since_minor = 0;
        self.ops_since_major = 0;
        self.last_minor = now;
        self.last_major = now;
    }

    /// Re-evaluates the most frequently accessed keys for promotion.
    pub fn run_minor_pass(&mut self) {
        let threshold: u64 = self.config.promotion.threshold;
        let candidates: Vec<(K, u64)> = self.tracker.top_keys(self.config.promotion.minor_batch);
        let mut promoted: usize = 0;
        for (key, frequency) in candidates {
            if frequency < threshold {
                break;
            }
            let address: Address = self.address(&key);
            let Some(location) = self.locate(&key, &address) else {
                continue;
            };
            self.partitions[location.partition].mark_hot(key.clone());
            if location.region() != RegionKind::Fast
                && self.promote(&key, location).region() == RegionKind::Fast
            {
                promoted += 1;
            }
        }
        self.counters.minor_passes += 1;
        self.ops_since_minor = 0;
        self.last_minor = Instant::now();
        tracing::debug!(promoted, "minor optimization pass");
    }

    /// Decays access frequencies and prunes bookkeeping of dead or cooled
    /// keys.
    ///
    /// Reorganizing the core region around co-access clusters is not done
    /// here; the co-access counts are kept so a clustering strategy can be
    /// plugged in without changing the scheduling.
    pub fn run_major_pass(&mut self) {
        let params: PromotionParams = self.config.promotion.clone();
        self.tracker.decay(params.decay);
        let index: &LocationIndex<K> = &self.index;
        self.tracker.prune(|k| index.lookup(k).is_some());
        let tracker: &AccessTracker<K> = &self.tracker;
        for partition in self.partitions.iter_mut() {
            partition.retain_hot(|k| tracker.frequency(k) >= params.threshold);
        }
        self.counters.major_passes += 1;
        self.ops_since_major = 0;
        self.last_major = Instant::now();
        tracing::debug!(tracked = self.tracker.tracked(), "major optimization pass");
    }

    /// Grows the table by the configured ratio.
    fn grow(&mut self) {
        let old_capacity: usize = self.capacity();
        let scaled: f64 =
            old_capacity as f64 * self.config.growth_ratio * self.config.safety_buffer;
        let new_capacity: usize = (scaled.ceil() as usize).max(old_capacity + 1);
        self.resize(new_capacity);
    }

    /// Rebuilds every partition for `requested_capacity` and re-inserts all
    /// live entries.
    ///
    /// A request too small for the current size is raised so that the load
    /// factor stays within the configured threshold.
    ///
    /// # Panics
    ///
    /// Panics if the number of re-inserted entries differs from the size
    /// before the resize.
    pub fn resize(&mut self, requested_capacity: usize) {
        let old_capacity: usize = self.capacity();
        let expected: usize = self.count;
        let floor: usize = (expected as f64 / self.config.load_factor_threshold).ceil() as usize;
        let target_capacity: usize = requested_capacity.max(floor);

        let mut snapshot: Vec<Entry<K, V>> = Vec::with_capacity(expected);
        for partition in self.partitions.iter_mut() {
            snapshot.extend(partition.drain());
        }
        assert_eq!(
            snapshot.len(),
            expected,
            "resize snapshot does not match the table size"
        );

        self.shape = Shape::for_capacity(
            target_capacity,
            self.config.dimensions,
            self.config.max_partitions,
        );
        self.partitions = Self::build_partitions(&self.shape, &self.config);
        self.index.clear();
        self.count = 0;
        for entry in snapshot {
            let address: Address = self.address(&entry.key);
            self.store(entry, &address);
        }
        assert_eq!(self.count, expected, "resize lost or duplicated entries");

        self.reset_schedule();
        self.counters.resizes += 1;
        tracing::debug!(
            old_capacity,
            requested_capacity,
            new_capacity = self.capacity(),
            partitions = self.shape.partitions(),
            size = self.count,
            "resized table"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Scheduling that never fires on its own during a test.
    fn quiet_params(threshold: u64) -> PromotionParams {
        PromotionParams {
            threshold,
            ratio: 1.5,
            decay: 0.5,
            ops_threshold_minor: u64::MAX,
            ops_threshold_major: u64::MAX,
            time_threshold_minor: Duration::from_secs(3600),
            time_threshold_major: Duration::from_secs(3600),
            minor_batch: 16,
        }
    }

    fn quiet_table(capacity: usize, threshold: u64) -> HashTable<u64, u64> {
        HashTable::with_config(
            TableConfig::builder()
                .initial_capacity(capacity)
                .dimensions(2)
                .promotion(quiet_params(threshold))
                .build(),
        )
        .unwrap()
    }

    /// Two keys sharing a partition and a fast slot.
    fn colliding_pair(table: &HashTable<u64, u64>) -> (u64, u64) {
        for a in 0..10_000u64 {
            let first: Address = table.address(&a);
            for b in (a + 1)..(a + 500) {
                let second: Address = table.address(&b);
                if first.partition == second.partition && first.fast_index == second.fast_index {
                    return (a, b);
                }
            }
        }
        panic!("no colliding pair found");
    }

    fn assert_consistent(table: &HashTable<u64, u64>) {
        let live: usize = table.partitions.iter().map(|p| p.len()).sum();
        assert_eq!(live, table.size());
        assert_eq!(table.iter().count(), table.size());
        for (key, _) in table.iter() {
            let location: Location = table.location_of(key).unwrap();
            assert!(table.partitions[location.partition]
                .entry_at(location.locator, key)
                .is_some());
        }
    }

    #[test]
    fn test_put_get_remove() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 8);
        for key in 0..40u64 {
            assert_eq!(table.put(key, key * 10), None);
        }
        assert_eq!(table.size(), 40);
        for key in 0..40u64 {
            assert_eq!(table.get(&key), Some(&(key * 10)));
        }
        assert_eq!(table.put(7, 700), Some(70));
        assert_eq!(table.size(), 40);
        assert!(table.remove(&7));
        assert!(!table.remove(&7));
        assert_eq!(table.get(&7), None);
        assert_eq!(table.size(), 39);
        assert_consistent(&table);
    }

    #[test]
    fn test_no_duplicate_after_fast_slot_frees_up() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 1_000);
        let (a, b) = colliding_pair(&table);
        table.put(a, 1);
        table.put(b, 2);
        assert_eq!(table.location_of(&b).unwrap().region(), RegionKind::Core);

        assert!(table.remove(&a));
        // b's fast slot is free again; updating b must not create a second copy
        assert_eq!(table.put(b, 3), Some(2));
        assert_eq!(table.size(), 1);
        assert_eq!(table.get(&b), Some(&3));
        assert_consistent(&table);
    }

    #[test]
    fn test_stale_index_points_at_empty_slot() {
        let mut table: HashTable<u64, u64> = quiet_table(256, 1_000);
        for key in 0..50u64 {
            table.put(key, key + 1);
        }
        let real: Location = table.location_of(&10).unwrap();
        let bogus: Location = Location::new(
            (real.partition + 1) % table.partitions.len(),
            Locator::Overflow(0xdead_beef),
        );
        table.index.record(10, bogus);

        assert_eq!(table.get(&10), Some(&11));
        assert_eq!(table.stats().stale_index_hits, 1);
        assert_eq!(table.index.lookup(&10), Some(real));
    }

    #[test]
    fn test_stale_index_points_at_other_key() {
        let mut table: HashTable<u64, u64> = quiet_table(256, 1_000);
        for key in 0..50u64 {
            table.put(key, key + 1);
        }
        let other: Location = table.location_of(&20).unwrap();
        table.index.record(30, other);

        assert_eq!(table.get(&30), Some(&31));
        assert_eq!(table.get(&20), Some(&21));
        assert!(table.remove(&30));
        assert_eq!(table.get(&30), None);
        assert_eq!(table.get(&20), Some(&21));
        assert_consistent(&table);
    }

    #[test]
    fn test_promotion_into_empty_fast_slot() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 3);
        let (a, b) = colliding_pair(&table);
        table.put(a, 1);
        table.put(b, 2);
        assert!(table.remove(&a));
        assert_eq!(table.location_of(&b).unwrap().region(), RegionKind::Core);

        // put counted once, two gets reach the threshold of 3
        table.get(&b);
        assert_eq!(table.location_of(&b).unwrap().region(), RegionKind::Core);
        table.get(&b);
        assert_eq!(table.location_of(&b).unwrap().region(), RegionKind::Fast);
        assert_eq!(table.stats().promotions, 1);
        assert_eq!(table.stats().demotions, 0);
        assert_eq!(table.get(&b), Some(&2));
    }

    fn promotion_outcome(challenger: u64, incumbent: u64) -> (RegionKind, RegionKind) {
        let mut table: HashTable<u64, u64> = quiet_table(64, 2);
        let (a, b) = colliding_pair(&table);
        table.put(a, 1);
        table.put(b, 2);
        table.tracker.set_frequency(&a, incumbent);
        table.tracker.set_frequency(&b, challenger);
        table.get(&b);
        assert_eq!(table.get(&a), Some(&1));
        assert_eq!(table.get(&b), Some(&2));
        assert_consistent(&table);
        (
            table.location_of(&a).unwrap().region(),
            table.location_of(&b).unwrap().region(),
        )
    }

    #[test]
    fn test_promotion_is_deterministic() {
        // 11 > 4 * 1.5, the challenger takes the slot
        let first: (RegionKind, RegionKind) = promotion_outcome(10, 4);
        assert_eq!(first, (RegionKind::Core, RegionKind::Fast));
        for _ in 0..5 {
            assert_eq!(promotion_outcome(10, 4), first);
        }

        // 6 > 4 * 1.5 does not hold, the incumbent stays
        let second: (RegionKind, RegionKind) = promotion_outcome(5, 4);
        assert_eq!(second.0, RegionKind::Fast);
        assert_ne!(second.1, RegionKind::Fast);
        for _ in 0..5 {
            assert_eq!(promotion_outcome(5, 4), second);
        }
    }

    #[test]
    fn test_minor_pass_promotes_top_keys() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 4);
        let (a, b) = colliding_pair(&table);
        table.put(a, 1);
        table.put(b, 2);
        table.remove(&a);
        table.tracker.set_frequency(&b, 100);
        assert_eq!(table.location_of(&b).unwrap().region(), RegionKind::Core);

        table.run_minor_pass();
        let location: Location = table.location_of(&b).unwrap();
        assert_eq!(location.region(), RegionKind::Fast);
        assert!(table.partitions[location.partition].is_hot(&b));
        assert_eq!(table.stats().minor_passes, 1);
    }

    #[test]
    fn test_major_pass_decays_and_resets() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 4);
        table.put(1, 1);
        table.tracker.set_frequency(&1, 40);
        table.tracker.set_frequency(&99, 1);
        table.ops_since_major = 17;

        table.run_major_pass();
        assert_eq!(table.tracker.frequency(&1), 20);
        assert_eq!(table.tracker.frequency(&99), 0);
        assert_eq!(table.ops_since_major, 0);
        assert_eq!(table.stats().major_passes, 1);
    }

    #[test]
    fn test_ops_threshold_schedules_passes() {
        let mut params: PromotionParams = quiet_params(1_000);
        params.ops_threshold_minor = 10;
        params.ops_threshold_major = 25;
        let mut table: HashTable<u64, u64> = quiet_table(1024, 1_000);
        table.set_promotion_config(params).unwrap();

        for key in 0..50u64 {
            table.put(key, key);
        }
        assert_eq!(table.stats().minor_passes, 5);
        assert_eq!(table.stats().major_passes, 2);
    }

    #[test]
    fn test_resize_keeps_every_key() {
        let mut table: HashTable<u64, u64> = quiet_table(16, 1_000);
        let initial: usize = table.capacity();
        for key in 0..2_000u64 {
            table.put(key, key ^ 0xff);
        }
        assert!(table.capacity() > initial);
        assert!(table.stats().resizes > 0);
        assert!(table.load_factor() <= table.config().load_factor_threshold);
        for key in 0..2_000u64 {
            assert_eq!(table.get(&key), Some(&(key ^ 0xff)));
        }
        assert_consistent(&table);
    }

    #[test]
    fn test_lowering_threshold_forces_resize() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 1_000);
        for key in 0..30u64 {
            table.put(key, key);
        }
        let before: usize = table.capacity();
        table.set_load_factor_threshold(0.1).unwrap();
        assert!(table.capacity() > before);
        assert!(table.load_factor() <= 0.1);
        for key in 0..30u64 {
            assert_eq!(table.peek(&key), Some(&key));
        }
        assert!(table.set_load_factor_threshold(0.0).is_err());
    }

    #[test]
    fn test_resize_below_size_keeps_load_factor() {
        let mut table: HashTable<u64, u64> = quiet_table(256, 1_000);
        for key in 0..120u64 {
            table.put(key, key + 5);
        }
        table.resize(8);
        assert!(table.capacity() >= 160);
        assert!(table.load_factor() <= table.config().load_factor_threshold);
        assert_eq!(table.stats().resizes, 1);
        for key in 0..120u64 {
            assert_eq!(table.peek(&key), Some(&(key + 5)));
        }
        assert_consistent(&table);

        let mut empty: HashTable<u64, u64> = quiet_table(256, 1_000);
        empty.resize(0);
        assert!(empty.capacity() >= 4);
        empty.put(1, 1);
        assert_eq!(empty.get(&1), Some(&1));
    }

    #[test]
    fn test_removed_key_leaves_no_co_access() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 1_000);
        table.put(1, 10);
        table.put(2, 20);
        assert_eq!(table.tracker().co_access(&2, &1), 1);

        assert!(table.remove(&1));
        assert_eq!(table.get(&2), Some(&20));
        assert_eq!(table.tracker().co_access(&2, &1), 0);
        assert_eq!(table.tracker().co_access(&1, &2), 0);
        assert_eq!(table.tracker().frequency(&1), 0);
    }

    #[test]
    fn test_stats_report_hot_and_indexed_keys() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 4);
        for key in 0..10u64 {
            table.put(key, key);
        }
        assert_eq!(table.stats().indexed_keys, 10);
        assert_eq!(table.stats().hot_keys, 0);

        table.tracker.set_frequency(&3, 50);
        table.run_minor_pass();
        assert_eq!(table.stats().hot_keys, 1);
        assert!(table.remove(&3));
        assert_eq!(table.stats().hot_keys, 0);
        assert_eq!(table.stats().indexed_keys, 9);
    }

    #[test]
    fn test_tags_follow_puts() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 1_000);
        table.put_tagged(1, 10, MetaTag(7));
        assert_eq!(table.get_tagged(&1), Some((&10, Some(MetaTag(7)))));
        table.put(1, 11);
        assert_eq!(table.get_tagged(&1), Some((&11, None)));
    }

    #[test]
    fn test_clear() {
        let mut table: HashTable<u64, u64> = quiet_table(64, 1_000);
        for key in 0..20u64 {
            table.put(key, key);
        }
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.get(&3), None);
        assert_eq!(table.tracker().tracked(), 0);
    }

    #[test]
    fn test_invalid_construction_fails() {
        assert!(matches!(
            HashTable::<u64, u64>::with_capacity(64, 0),
            Err(TableError::InvalidDimensions { .. })
        ));
        assert_eq!(
            HashTable::<u64, u64>::with_capacity(64, 64).err(),
            Some(TableError::InvalidDimensions { dimensions: 64 })
        );
        assert!(HashTable::<u64, u64>::with_capacity(64, 6).is_ok());
        assert!(matches!(
            HashTable::<u64, u64>::with_capacity(2, 2),
            Err(TableError::CapacityTooSmall { .. })
        ));
        let mut table: HashTable<u64, u64> = quiet_table(64, 1);
        assert!(table.set_promotion_parameters(3, 0.5, 0.5).is_err());
        assert!(table.set_promotion_parameters(3, 2.0, 0.9).is_ok());
        assert_eq!(table.config().promotion.threshold, 3);
    }
}
