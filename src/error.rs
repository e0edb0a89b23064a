//! Error types for table construction and configuration.
//!
//! Lookups and mutations never fail: a put always lands somewhere (the
//! overflow region is unbounded) and a miss is reported as `None`/`false`.
//! The only fallible surface is building or reconfiguring a table.

use thiserror::Error;

/// Errors raised when a table is built or reconfigured with bad parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// The coordinate space needs at least one dimension, and every dimension
    /// must be able to span two coordinates within the initial capacity.
    #[error("dimensions must be at least 1 and 2^dimensions must not exceed the initial capacity, got {dimensions}")]
    InvalidDimensions {
        /// Requested number of dimensions.
        dimensions: usize,
    },

    /// The requested capacity cannot hold even one minimum-sized fast region.
    #[error("initial capacity {capacity} is below the minimum of {minimum}")]
    CapacityTooSmall {
        /// Requested initial capacity.
        capacity: usize,
        /// Smallest accepted capacity.
        minimum: usize,
    },

    /// The resize trigger must lie in `(0, 1]`.
    #[error("load factor threshold must be in (0, 1], got {threshold}")]
    InvalidLoadFactor {
        /// Rejected threshold.
        threshold: f64,
    },

    /// A promotion must require a strictly larger frequency than the incumbent.
    #[error("promotion ratio must be greater than 1, got {ratio}")]
    InvalidPromotionRatio {
        /// Rejected ratio.
        ratio: f64,
    },

    /// Growth heuristics must strictly enlarge the table.
    #[error("growth ratio must be greater than 1 and safety buffer at least 1, got {growth_ratio} x {safety_buffer}")]
    InvalidGrowthRatio {
        /// Rejected growth ratio.
        growth_ratio: f64,
        /// Rejected safety buffer.
        safety_buffer: f64,
    },

    /// Frequency decay is a multiplier in `(0, 1]`.
    #[error("decay must be in (0, 1], got {decay}")]
    InvalidDecay {
        /// Rejected decay.
        decay: f64,
    },

    /// Probe walks and path lengths need a non-zero bound.
    #[error("{name} must be greater than 0")]
    InvalidProbeBudget {
        /// Name of the offending knob.
        name: &'static str,
    },
}

/// A specialized Result type for table configuration.
pub type Result<T> = std::result::Result<T, TableError>;
