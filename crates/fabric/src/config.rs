//! Configuration system for the many-core simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the memory subsystem. It provides:
//! 1. **Defaults:** Baseline hardware constants (tile count, cache geometry,
//!    access delays).
//! 2. **Structures:** Hierarchical config for the fabric and the cache
//!    hierarchy.
//! 3. **Enums:** Replacement policy and coherence-protocol selection.
//! 4. **Validation:** `Config::validate` rejects impossible geometry before
//!    any tile is constructed.
//!
//! Configuration is supplied via JSON (`serde_json`) or `Config::default()`.

use serde::Deserialize;
use thiserror::Error;

/// Default configuration constants for the simulator.
///
/// These values define the baseline hardware configuration when not
/// explicitly overridden.
mod defaults {
    /// Default number of tiles in the fabric.
    pub const NUM_TILES: usize = 16;

    /// Default tile clock frequency in GHz.
    pub const FREQUENCY: f32 = 1.0;

    /// Default cache line size in bytes.
    ///
    /// Matches typical modern processor cache line sizes.
    pub const CACHE_LINE: usize = 64;

    /// Default L1 bank size in bytes (32 KiB).
    pub const L1_SIZE: usize = 32 * 1024;

    /// Default L1 associativity.
    pub const L1_WAYS: usize = 4;

    /// Default L1 access delay in cycles.
    pub const L1_DELAY: u64 = 1;

    /// Default L2 cache size in bytes (256 KiB).
    pub const L2_SIZE: usize = 256 * 1024;

    /// Default L2 associativity.
    pub const L2_WAYS: usize = 8;

    /// Default L2 access delay in cycles.
    pub const L2_DELAY: u64 = 8;
}

/// Invalid configuration, rejected at construction time.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The cache line size must be a nonzero power of two.
    #[error("cache line size {0} is not a nonzero power of two")]
    LineSizeNotPowerOfTwo(usize),

    /// A cache level's size must be a nonzero multiple of `ways * line`.
    #[error("{level} geometry invalid: size {size} is not a nonzero multiple of ways {ways} x line {line}")]
    GeometryInvalid {
        /// Which cache level was misconfigured.
        level: &'static str,
        /// Configured total size in bytes.
        size: usize,
        /// Configured associativity.
        ways: usize,
        /// Configured line size in bytes.
        line: usize,
    },

    /// The fabric needs at least one tile.
    #[error("fabric needs at least one tile")]
    NoTiles,

    /// The clock frequency must be positive.
    #[error("frequency {0} GHz is not positive")]
    BadFrequency(f32),
}

/// Cache replacement policy algorithms.
///
/// Selects which line to evict when a new line must be installed in a full
/// set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// Pseudo-LRU (tree-based).
    #[serde(alias = "Plru")]
    Plru,
    /// First In First Out (round-robin).
    #[serde(alias = "Fifo")]
    Fifo,
    /// Random selection.
    #[serde(alias = "Random")]
    Random,
    /// Most Recently Used. Effective for cyclic patterns larger than the
    /// cache.
    #[serde(alias = "Mru")]
    Mru,
}

/// Coherence protocol variant run by every tile of the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoherenceProtocol {
    /// Modified / Shared / Invalid.
    #[default]
    #[serde(alias = "Msi")]
    Msi,
    /// MSI plus the Owned state: a dirty sharer serves reads without an
    /// immediate writeback.
    #[serde(alias = "Mosi")]
    Mosi,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use tilesim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.fabric.num_tiles, 16);
/// assert_eq!(config.cache.line_bytes, 64);
/// config.validate().unwrap();
/// ```
///
/// Deserializing from JSON:
///
/// ```
/// use tilesim_core::config::{Config, CoherenceProtocol, ReplacementPolicy};
///
/// let json = r#"{
///     "fabric": { "num_tiles": 4, "frequency": 2.0 },
///     "protocol": "MOSI",
///     "cache": {
///         "line_bytes": 32,
///         "l1_i": { "size_bytes": 4096, "ways": 2, "access_delay": 1 },
///         "l1_d": { "size_bytes": 4096, "ways": 2, "access_delay": 1 },
///         "l2": {
///             "size_bytes": 65536,
///             "ways": 8,
///             "access_delay": 8,
///             "policy": "PLRU",
///             "track_miss_types": true
///         }
///     }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// config.validate().unwrap();
/// assert_eq!(config.protocol, CoherenceProtocol::Mosi);
/// assert_eq!(config.cache.l2.policy, ReplacementPolicy::Plru);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Fabric-wide settings.
    #[serde(default)]
    pub fabric: FabricConfig,

    /// Cache hierarchy geometry.
    #[serde(default)]
    pub cache: CacheHierarchyConfig,

    /// Coherence protocol variant.
    #[serde(default)]
    pub protocol: CoherenceProtocol,
}

impl Config {
    /// Checks the configuration for impossible geometry.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found. A failing configuration must
    /// never reach tile construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fabric.num_tiles == 0 {
            return Err(ConfigError::NoTiles);
        }
        if !(self.fabric.frequency > 0.0) {
            return Err(ConfigError::BadFrequency(self.fabric.frequency));
        }
        let line = self.cache.line_bytes;
        if line == 0 || !line.is_power_of_two() {
            return Err(ConfigError::LineSizeNotPowerOfTwo(line));
        }
        for (level, lv) in [
            ("l1_i", &self.cache.l1_i),
            ("l1_d", &self.cache.l1_d),
            ("l2", &self.cache.l2),
        ] {
            let way_bytes = lv.ways.checked_mul(line).unwrap_or(0);
            if lv.ways == 0 || way_bytes == 0 || lv.size_bytes == 0 || lv.size_bytes % way_bytes != 0 {
                return Err(ConfigError::GeometryInvalid {
                    level,
                    size: lv.size_bytes,
                    ways: lv.ways,
                    line,
                });
            }
        }
        Ok(())
    }
}

/// Fabric-wide settings: tile count and clock.
#[derive(Debug, Clone, Deserialize)]
pub struct FabricConfig {
    /// Number of tiles in the fabric.
    #[serde(default = "FabricConfig::default_num_tiles")]
    pub num_tiles: usize,

    /// Tile clock frequency in GHz.
    #[serde(default = "FabricConfig::default_frequency")]
    pub frequency: f32,
}

impl FabricConfig {
    fn default_num_tiles() -> usize {
        defaults::NUM_TILES
    }

    fn default_frequency() -> f32 {
        defaults::FREQUENCY
    }
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            num_tiles: defaults::NUM_TILES,
            frequency: defaults::FREQUENCY,
        }
    }
}

/// Cache hierarchy geometry shared by every tile.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheHierarchyConfig {
    /// Cache line size in bytes, shared by all levels. Power of two.
    #[serde(default = "CacheHierarchyConfig::default_line")]
    pub line_bytes: usize,

    /// L1 instruction bank.
    #[serde(default = "CacheLevelConfig::default_l1")]
    pub l1_i: CacheLevelConfig,

    /// L1 data bank.
    #[serde(default = "CacheLevelConfig::default_l1")]
    pub l1_d: CacheLevelConfig,

    /// Private unified L2.
    #[serde(default = "CacheLevelConfig::default_l2")]
    pub l2: CacheLevelConfig,
}

impl CacheHierarchyConfig {
    fn default_line() -> usize {
        defaults::CACHE_LINE
    }
}

impl Default for CacheHierarchyConfig {
    fn default() -> Self {
        Self {
            line_bytes: defaults::CACHE_LINE,
            l1_i: CacheLevelConfig::default_l1(),
            l1_d: CacheLevelConfig::default_l1(),
            l2: CacheLevelConfig::default_l2(),
        }
    }
}

/// Individual cache level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheLevelConfig {
    /// Total size in bytes.
    pub size_bytes: usize,

    /// Associativity (number of ways).
    pub ways: usize,

    /// Replacement policy.
    #[serde(default)]
    pub policy: ReplacementPolicy,

    /// Access delay in cycles; tag-only probes cost one cycle.
    #[serde(default = "CacheLevelConfig::default_delay")]
    pub access_delay: u64,

    /// Classify misses (cold / capacity / upgrade / sharing) when enabled.
    /// Only meaningful on the L2.
    #[serde(default)]
    pub track_miss_types: bool,
}

impl CacheLevelConfig {
    fn default_delay() -> u64 {
        defaults::L1_DELAY
    }

    fn default_l1() -> Self {
        Self {
            size_bytes: defaults::L1_SIZE,
            ways: defaults::L1_WAYS,
            policy: ReplacementPolicy::default(),
            access_delay: defaults::L1_DELAY,
            track_miss_types: false,
        }
    }

    fn default_l2() -> Self {
        Self {
            size_bytes: defaults::L2_SIZE,
            ways: defaults::L2_WAYS,
            policy: ReplacementPolicy::default(),
            access_delay: defaults::L2_DELAY,
            track_miss_types: false,
        }
    }
}
