//! A tiered, self-tuning key/value hash table.
//!
//! Keys are spread over independent partitions. Each partition has a small
//! direct-mapped fast region, a coordinate-addressed core region searched
//! along precomputed probe paths, and an unbounded overflow region, so a put
//! never fails. Frequently accessed keys are promoted into the fast region and
//! the table grows once its load factor crosses a threshold.
//!
//! # Example
//!
//! ```
//! use tiered_buckets::{HashTable, TableConfig};
//!
//! let config = TableConfig::builder()
//!     .initial_capacity(64)
//!     .dimensions(2)
//!     .build();
//! let mut table: HashTable<&str, i32> = HashTable::with_config(config).unwrap();
//!
//! table.put("answer", 42);
//! assert_eq!(table.get(&"answer"), Some(&42));
//! assert_eq!(table.size(), 1);
//! ```

pub mod config;
mod error;
pub mod hash;
mod hash_table;
pub mod location;
pub mod partition;
pub mod probe;
pub mod tracker;

pub use config::{PromotionParams, TableConfig, TableConfigBuilder};
pub use error::{Result, TableError};
pub use hash::Shape;
pub use hash_table::{HashTable, TableStats};
pub use location::{Location, Locator, RegionKind};
pub use partition::{Entry, MetaTag};
