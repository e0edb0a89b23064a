//! Table configuration.
//!
//! [`TableConfig`] fixes the shape of a table at construction time, while
//! [`PromotionParams`] holds the knobs that can be changed on a live table.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TableError};
use crate::hash::MIN_FAST_CAPACITY;

/// 1.618033988749894848204586834...
pub const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

/// Scheduling and promotion knobs of the adaptive layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionParams {
    /// Minimum access frequency before a key is considered for the fast region.
    pub threshold: u64,

    /// Required frequency multiple over the current fast-slot occupant.
    pub ratio: f64,

    /// Multiplier applied to every frequency by a major pass.
    pub decay: f64,

    /// Operations between two minor passes.
    pub ops_threshold_minor: u64,

    /// Operations between two major passes.
    pub ops_threshold_major: u64,

    /// Wall-clock interval after which a minor pass is due.
    pub time_threshold_minor: Duration,

    /// Wall-clock interval after which a major pass is due.
    pub time_threshold_major: Duration,

    /// Number of top keys a minor pass re-evaluates.
    pub minor_batch: usize,
}

impl Default for PromotionParams {
    fn default() -> Self {
        Self {
            threshold: 8,
            ratio: 1.5,
            decay: 0.5,
            ops_threshold_minor: 256,
            ops_threshold_major: 4096,
            time_threshold_minor: Duration::from_secs(1),
            time_threshold_major: Duration::from_secs(30),
            minor_batch: 16,
        }
    }
}

impl PromotionParams {
    /// Validate the promotion parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.ratio > 1.0) {
            return Err(TableError::InvalidPromotionRatio { ratio: self.ratio });
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(TableError::InvalidDecay { decay: self.decay });
        }
        if self.ops_threshold_minor == 0 {
            return Err(TableError::InvalidProbeBudget {
                name: "ops_threshold_minor",
            });
        }
        if self.ops_threshold_major == 0 {
            return Err(TableError::InvalidProbeBudget {
                name: "ops_threshold_major",
            });
        }
        Ok(())
    }
}

/// Construction parameters of a [`HashTable`](crate::HashTable).
///
/// # Example
///
/// ```
/// use tiered_buckets::TableConfig;
///
/// let config = TableConfig::builder()
///     .initial_capacity(256)
///     .dimensions(3)
///     .load_factor_threshold(0.8)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Requested number of slots; the realised capacity may be slightly larger.
    pub initial_capacity: usize,

    /// Number of coordinate dimensions of every core region.
    pub dimensions: usize,

    /// Load factor above which the table grows (default: 0.75).
    pub load_factor_threshold: f64,

    /// Capacity multiplier applied on resize.
    pub growth_ratio: f64,

    /// Extra head-room multiplied into the growth ratio.
    pub safety_buffer: f64,

    /// Upper bound on the number of partitions.
    pub max_partitions: usize,

    /// Maximum length of a single probe path.
    pub max_path_len: usize,

    /// Maximum number of anchors (center plus corners) per partition.
    pub max_anchors: usize,

    /// Maximum number of core slots visited on a probe walk.
    pub probe_budget: usize,

    /// Length of the recent-access window used for co-access counting.
    pub recent_window: usize,

    /// Promotion and optimization scheduling.
    pub promotion: PromotionParams,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            dimensions: 2,
            load_factor_threshold: 0.75,
            growth_ratio: GOLDEN_RATIO,
            safety_buffer: 1.1,
            max_partitions: 16,
            max_path_len: 64,
            max_anchors: 5,
            probe_budget: 16,
            recent_window: 32,
            promotion: PromotionParams::default(),
        }
    }
}

impl TableConfig {
    /// Create a new configuration builder.
    pub fn builder() -> TableConfigBuilder {
        TableConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity < MIN_FAST_CAPACITY {
            return Err(TableError::CapacityTooSmall {
                capacity: self.initial_capacity,
                minimum: MIN_FAST_CAPACITY,
            });
        }
        // each dimension must be able to span at least two coordinates
        let spannable: bool = u32::try_from(self.dimensions)
            .ok()
            .and_then(|d| 1usize.checked_shl(d))
            .map_or(false, |corners| corners <= self.initial_capacity);
        if self.dimensions < 1 || !spannable {
            return Err(TableError::InvalidDimensions {
                dimensions: self.dimensions,
            });
        }
        if !(self.load_factor_threshold > 0.0 && self.load_factor_threshold <= 1.0) {
            return Err(TableError::InvalidLoadFactor {
                threshold: self.load_factor_threshold,
            });
        }
        if !(self.growth_ratio > 1.0 && self.safety_buffer >= 1.0) {
            return Err(TableError::InvalidGrowthRatio {
                growth_ratio: self.growth_ratio,
                safety_buffer: self.safety_buffer,
            });
        }
        if self.max_partitions == 0 {
            return Err(TableError::InvalidProbeBudget {
                name: "max_partitions",
            });
        }
        if self.max_path_len == 0 {
            return Err(TableError::InvalidProbeBudget {
                name: "max_path_len",
            });
        }
        if self.max_anchors == 0 {
            return Err(TableError::InvalidProbeBudget {
                name: "max_anchors",
            });
        }
        if self.probe_budget == 0 {
            return Err(TableError::InvalidProbeBudget {
                name: "probe_budget",
            });
        }
        if self.recent_window == 0 {
            return Err(TableError::InvalidProbeBudget {
                name: "recent_window",
            });
        }
        self.promotion.validate()
    }
}

/// Builder for [`TableConfig`].
#[derive(Debug, Default)]
pub struct TableConfigBuilder {
    initial_capacity: Option<usize>,
    dimensions: Option<usize>,
    load_factor_threshold: Option<f64>,
    growth_ratio: Option<f64>,
    safety_buffer: Option<f64>,
    max_partitions: Option<usize>,
    max_path_len: Option<usize>,
    max_anchors: Option<usize>,
    probe_budget: Option<usize>,
    recent_window: Option<usize>,
    promotion: Option<PromotionParams>,
}

impl TableConfigBuilder {
    /// Set the requested initial capacity.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Set the number of core dimensions.
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Set the resize trigger.
    pub fn load_factor_threshold(mut self, threshold: f64) -> Self {
        self.load_factor_threshold = Some(threshold);
        self
    }

    /// Set the capacity multiplier applied on resize.
    pub fn growth_ratio(mut self, ratio: f64) -> Self {
        self.growth_ratio = Some(ratio);
        self
    }

    /// Set the resize safety buffer.
    pub fn safety_buffer(mut self, buffer: f64) -> Self {
        self.safety_buffer = Some(buffer);
        self
    }

    /// Set the maximum number of partitions.
    pub fn max_partitions(mut self, max: usize) -> Self {
        self.max_partitions = Some(max);
        self
    }

    /// Set the maximum probe path length.
    pub fn max_path_len(mut self, len: usize) -> Self {
        self.max_path_len = Some(len);
        self
    }

    /// Set the maximum number of anchors per partition.
    pub fn max_anchors(mut self, max: usize) -> Self {
        self.max_anchors = Some(max);
        self
    }

    /// Set the probe budget.
    pub fn probe_budget(mut self, budget: usize) -> Self {
        self.probe_budget = Some(budget);
        self
    }

    /// Set the recent-access window length.
    pub fn recent_window(mut self, window: usize) -> Self {
        self.recent_window = Some(window);
        self
    }

    /// Set the promotion parameters.
    pub fn promotion(mut self, params: PromotionParams) -> Self {
        self.promotion = Some(params);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TableConfig {
        let default: TableConfig = TableConfig::default();
        TableConfig {
            initial_capacity: self.initial_capacity.unwrap_or(default.initial_capacity),
            dimensions: self.dimensions.unwrap_or(default.dimensions),
            load_factor_threshold: self
                .load_factor_threshold
                .unwrap_or(default.load_factor_threshold),
            growth_ratio: self.growth_ratio.unwrap_or(default.growth_ratio),
            safety_buffer: self.safety_buffer.unwrap_or(default.safety_buffer),
            max_partitions: self.max_partitions.unwrap_or(default.max_partitions),
            max_path_len: self.max_path_len.unwrap_or(default.max_path_len),
            max_anchors: self.max_anchors.unwrap_or(default.max_anchors),
            probe_budget: self.probe_budget.unwrap_or(default.probe_budget),
            recent_window: self.recent_window.unwrap_or(default.recent_window),
            promotion: self.promotion.unwrap_or(default.promotion),
        }
    }
}
