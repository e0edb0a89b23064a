//! Per-key access statistics behind promotion decisions.

use std::collections::VecDeque;
use std::hash::Hash;

use crate::hash::{fixed_state, FixedMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stat {
    count: u64,
    /// Sequence number of the first access, breaks frequency ties.
    first_seen: u64,
}

/// Frequency, recency and pairwise co-access bookkeeping.
#[derive(Debug, Clone)]
pub struct AccessTracker<K>
where
    K: Hash + Eq + Clone,
{
    frequency: FixedMap<K, Stat>,
    recent: VecDeque<K>,
    window: usize,
    co_access: FixedMap<K, FixedMap<K, u64>>,
    sequence: u64,
}

impl<K> AccessTracker<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new(window: usize) -> Self {
        let window: usize = window.max(1);
        AccessTracker {
            frequency: FixedMap::with_hasher(fixed_state()),
            recent: VecDeque::with_capacity(window),
            window,
            co_access: FixedMap::with_hasher(fixed_state()),
            sequence: 0,
        }
    }

    /// Records one access and returns the key's new frequency.
    pub fn record(&mut self, key: &K) -> u64 {
        let count: u64 = match self.frequency.get_mut(key) {
            Some(stat) => {
                stat.count += 1;
                stat.count
            }
            None => {
                self.sequence += 1;
                self.frequency.insert(
                    key.clone(),
                    Stat {
                        count: 1,
                        first_seen: self.sequence,
                    },
                );
                1
            }
        };

        if let Some(previous) = self.recent.back() {
            if previous != key {
                let previous: K = previous.clone();
                self.bump_pair(&previous, key);
                self.bump_pair(key, &previous);
            }
        }
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(key.clone());
        count
    }

    fn bump_pair(&mut self, a: &K, b: &K) {
        let row: &mut FixedMap<K, u64> = self
            .co_access
            .entry(a.clone())
            .or_insert_with(|| FixedMap::with_hasher(fixed_state()));
        *row.entry(b.clone()).or_insert(0) += 1;
    }

    pub fn frequency(&self, key: &K) -> u64 {
        self.frequency.get(key).map_or(0, |s| s.count)
    }

    /// Overrides the frequency of `key`, creating it if needed.
    pub fn set_frequency(&mut self, key: &K, count: u64) {
        match self.frequency.get_mut(key) {
            Some(stat) => stat.count = count,
            None => {
                self.sequence += 1;
                self.frequency.insert(
                    key.clone(),
                    Stat {
                        count,
                        first_seen: self.sequence,
                    },
                );
            }
        }
    }

    pub fn co_access(&self, a: &K, b: &K) -> u64 {
        self.co_access
            .get(a)
            .and_then(|row| row.get(b))
            .copied()
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn recent(&self) -> impl Iterator<Item = &K> {
        self.recent.iter()
    }

    pub fn tracked(&self) -> usize {
        self.frequency.len()
    }

    /// The `n` most frequent keys, highest first. Ties go to the key seen
    /// first.
    pub fn top_keys(&self, n: usize) -> Vec<(K, u64)> {
        let mut ranked: Vec<(&K, &Stat)> = self.frequency.iter().collect();
        ranked.sort_unstable_by(|a, b| {
            b.1.count
                .cmp(&a.1.count)
                .then(a.1.first_seen.cmp(&b.1.first_seen))
        });
        ranked
            .into_iter()
            .take(n)
            .map(|(k, s)| (k.clone(), s.count))
            .collect()
    }

    /// Drops every trace of a removed key: its frequency, its co-access row
    /// and column, and its slots in the recent window.
    pub fn forget(&mut self, key: &K) {
        self.frequency.remove(key);
        self.co_access.remove(key);
        for row in self.co_access.values_mut() {
            row.remove(key);
        }
        self.co_access.retain(|_, row| !row.is_empty());
        self.recent.retain(|k| k != key);
    }

    /// Multiplies every frequency by `factor`, dropping keys that reach zero.
    pub fn decay(&mut self, factor: f64) {
        if factor >= 1.0 {
            return;
        }
        self.frequency.retain(|_, stat| {
            stat.count = (stat.count as f64 * factor) as u64;
            stat.count > 0
        });
    }

    /// Removes co-access rows and columns of keys for which `live` is false.
    pub fn prune<F>(&mut self, live: F)
    where
        F: Fn(&K) -> bool,
    {
        self.co_access.retain(|k, _| live(k));
        for row in self.co_access.values_mut() {
            row.retain(|k, _| live(k));
        }
        self.co_access.retain(|_, row| !row.is_empty());
    }

    pub fn clear(&mut self) {
        self.frequency.clear();
        self.recent.clear();
        self.co_access.clear();
        self.sequence = 0;
    }
}
