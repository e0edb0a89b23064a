//! Coordinate hashing and table geometry.
//!
//! Every key is reduced to an [`Address`]: the partition it lives in, its
//! direct-mapped fast slot, its primary coordinate in the partition's core
//! region and the conflict key that addresses its overflow bucket. All of it
//! is a pure function of the key and the table [`Shape`], so the same key
//! re-derives the same address after a restart with the same capacity.

use ahash::RandomState;
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

use crate::config::GOLDEN_RATIO;

/// Smallest permitted fast region.
pub const MIN_FAST_CAPACITY: usize = 4;

/// This is the multiplier used to spread keys over the table. It is a constant
/// integral value equal to 2^64 divided by the golden ratio.
///
/// For 64-bit values use 2^64 / golden_ratio = 11400714819323198486
/// For 32-bit values use 2^32 / golden_ratio = 2654435769
const HASH_MULTIPLIER: u64 = 11400714819323198486;

/// Per-dimension salt, xored into the primary hash before rotating.
const DIMENSION_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

const PRIMARY_SEEDS: [u64; 4] = [
    0xbb8c_4848_91ec_6c86,
    0x0522_a25a_e9c7_69f9,
    0xeed2_797b_9571_bc75,
    0x4feb_29c1_fbbd_59d0,
];

const SECONDARY_SEEDS: [u64; 4] = [
    0x2d35_8dcc_aa6c_78a5,
    0x8bb8_4b93_962e_acc9,
    0x4b33_a62e_d433_d4a3,
    0x4d5a_2da5_1de1_aa47,
];

/// Map whose iteration order only depends on its insertion history.
pub type FixedMap<K, V> = HashMap<K, V, RandomState>;

/// Set counterpart of [`FixedMap`].
pub type FixedSet<K> = HashSet<K, RandomState>;

/// Hasher state shared by every internal map, seeded so that runs replay
/// identically.
pub fn fixed_state() -> RandomState {
    RandomState::with_seeds(
        PRIMARY_SEEDS[0],
        PRIMARY_SEEDS[1],
        PRIMARY_SEEDS[2],
        PRIMARY_SEEDS[3],
    )
}

/// The geometry of a table: how many partitions, and how each one is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    partitions: usize,
    fast_capacity: usize,
    dimension_sizes: Box<[usize]>,
    core_capacity: usize,
}

impl Shape {
    /// Derives a shape holding at least `capacity` slots.
    ///
    /// The partition count grows with the square root of the capacity, scaled
    /// down by the golden ratio. Inside a partition roughly `1 / φ³` of the
    /// slots go to the fast region and the rest to the core, whose sides are
    /// kept as even as possible. A side may be 1 when the core is too small to
    /// give every dimension two coordinates. The core is always strictly
    /// larger than the fast region.
    pub fn for_capacity(capacity: usize, dimensions: usize, max_partitions: usize) -> Shape {
        let dimensions: usize = dimensions.max(1);
        let capacity: usize = capacity.max(MIN_FAST_CAPACITY);
        let partitions: usize = (((capacity as f64).sqrt() / GOLDEN_RATIO) as usize)
            .max(1)
            .min(max_partitions.max(1));
        let per_partition: usize = (capacity + partitions - 1) / partitions;

        let fast_share: f64 = GOLDEN_RATIO * GOLDEN_RATIO * GOLDEN_RATIO;
        let fast_capacity: usize =
            ((per_partition as f64 / fast_share) as usize).max(MIN_FAST_CAPACITY);
        let core_target: usize = per_partition
            .saturating_sub(fast_capacity)
            .max(fast_capacity + 1);

        let side: usize = ((core_target as f64).powf(1.0 / dimensions as f64) as usize).max(1);
        let mut dimension_sizes: Vec<usize> = vec![side; dimensions];
        let mut core_capacity: usize = Self::product(&dimension_sizes);
        let mut i: usize = 0;
        while core_capacity < core_target {
            dimension_sizes[i % dimensions] += 1;
            core_capacity = Self::product(&dimension_sizes);
            i += 1;
        }

        Shape {
            partitions,
            fast_capacity,
            dimension_sizes: dimension_sizes.into_boxed_slice(),
            core_capacity,
        }
    }

    fn product(sizes: &[usize]) -> usize {
        sizes.iter().fold(1usize, |acc, s| acc.saturating_mul(*s))
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn fast_capacity(&self) -> usize {
        self.fast_capacity
    }

    pub fn core_capacity(&self) -> usize {
        self.core_capacity
    }

    pub fn dimensions(&self) -> usize {
        self.dimension_sizes.len()
    }

    pub fn dimension_sizes(&self) -> &[usize] {
        &self.dimension_sizes
    }

    /// Fast plus core slots of a single partition.
    pub fn partition_capacity(&self) -> usize {
        self.fast_capacity + self.core_capacity
    }

    /// Total addressable slots. The overflow region is not counted.
    pub fn capacity(&self) -> usize {
        self.partitions * self.partition_capacity()
    }

    /// Row-major offset of a coordinate inside the core region.
    pub fn linearize(&self, coordinate: &[usize]) -> usize {
        coordinate
            .iter()
            .zip(self.dimension_sizes.iter())
            .fold(0usize, |offset, (c, size)| offset * size + c)
    }

    /// Inverse of [`Shape::linearize`].
    pub fn coordinate_of(&self, mut offset: usize) -> Vec<usize> {
        let mut coordinate: Vec<usize> = vec![0; self.dimensions()];
        for i in (0..self.dimensions()).rev() {
            let size: usize = self.dimension_sizes[i];
            coordinate[i] = offset % size;
            offset /= size;
        }
        coordinate
    }
}

/// Every location a key may occupy, derived once per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub partition: usize,
    pub fast_index: usize,
    /// Primary core coordinate, linearized with [`Shape::linearize`].
    pub core_offset: usize,
    pub conflict_key: u64,
}

/// The pair of fixed-seed hash functions behind every [`Address`].
#[derive(Debug, Clone)]
pub struct KeyHasher {
    primary: RandomState,
    secondary: RandomState,
}

impl Default for KeyHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyHasher {
    pub fn new() -> Self {
        KeyHasher {
            primary: fixed_state(),
            secondary: RandomState::with_seeds(
                SECONDARY_SEEDS[0],
                SECONDARY_SEEDS[1],
                SECONDARY_SEEDS[2],
                SECONDARY_SEEDS[3],
            ),
        }
    }

    #[inline]
    pub fn hash1<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        BuildHasher::hash_one(&self.primary, key)
    }

    /// Secondary hash, spread with the golden ratio multiplier and keeping the
    /// high bits.
    #[inline]
    pub fn hash2<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        BuildHasher::hash_one(&self.secondary, key).wrapping_mul(HASH_MULTIPLIER) >> 32
    }

    /// Salts the primary hash for dimension `i` and rotates it by a
    /// dimension-specific amount.
    #[inline]
    pub fn mix(h: u64, i: usize) -> u64 {
        let salted: u64 = h ^ DIMENSION_SALT.wrapping_mul(i as u64 + 1);
        salted.rotate_left(((i as u32).wrapping_mul(23).wrapping_add(11)) % 64)
    }

    pub fn address<K: Hash + ?Sized>(&self, key: &K, shape: &Shape) -> Address {
        let h1: u64 = self.hash1(key);
        let partition: usize = (h1 % shape.partitions() as u64) as usize;
        let fast_index: usize = (self.hash2(key) % shape.fast_capacity() as u64) as usize;

        let mut core_offset: usize = 0;
        for (i, size) in shape.dimension_sizes().iter().enumerate() {
            let c: usize = (Self::mix(h1, i) % *size as u64) as usize;
            core_offset = core_offset * size + c;
        }
        // the offset identifies the coordinate tuple one-to-one
        let conflict_key: u64 = h1 ^ BuildHasher::hash_one(&self.primary, core_offset as u64);

        Address {
            partition,
            fast_index,
            core_offset,
            conflict_key,
        }
    }
}
