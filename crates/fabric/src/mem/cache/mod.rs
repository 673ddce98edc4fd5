//! Set-associative cache storage.
//!
//! This module implements the backing array shared by the L1 banks and the
//! L2: tag matching, victim selection through a configurable replacement
//! policy, data storage alongside the metadata, and eviction reporting. It
//! also classifies misses (cold / capacity / upgrade / sharing) when the
//! cache is configured to track them.
//!
//! Coherence decisions never live here; the array is a dumb store that the
//! controllers drive.

/// Replacement policy implementations (FIFO, LRU, MRU, PLRU, Random).
pub mod policies;

/// Per-line coherence metadata.
pub mod line;

pub use line::{CState, LineInfo};

use std::collections::HashMap;

use crate::common::types::L1Bank;
use crate::config::{CacheLevelConfig, ConfigError};
use self::policies::ReplacementPolicy;

/// Why a line missed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissType {
    /// First touch of the tag.
    Cold,
    /// The line was here before and left on a capacity eviction.
    Capacity,
    /// Exclusive request over a read-only copy.
    Upgrade,
    /// The line was here before and left on an external invalidation.
    Sharing,
}

/// How a previously present line left the cache. Distinguishes capacity
/// from sharing misses on the next touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Departure {
    Evicted,
    Invalidated,
}

/// Access and miss counters for one cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheStats {
    /// Requests classified against this cache.
    pub accesses: u64,
    /// Requests that missed.
    pub misses: u64,
    /// Cold misses (tracked caches only).
    pub cold: u64,
    /// Capacity misses (tracked caches only).
    pub capacity: u64,
    /// Upgrade misses (tracked caches only).
    pub upgrade: u64,
    /// Sharing misses (tracked caches only).
    pub sharing: u64,
}

/// A line pushed out of the array by an insertion.
#[derive(Clone, Debug)]
pub struct Eviction {
    /// Base address of the evicted line.
    pub addr: u64,
    /// Metadata at the time of eviction.
    pub info: LineInfo,
    /// Data bytes of the evicted line.
    pub data: Vec<u8>,
}

/// Set-associative storage of lines with a replacement policy.
///
/// Addresses handed to the array may be arbitrary byte addresses; they are
/// truncated to their line base internally.
pub struct CacheArray {
    lines: Vec<LineInfo>,
    data: Vec<u8>,
    sets: usize,
    ways: usize,
    line_bytes: usize,
    policy: Box<dyn ReplacementPolicy>,
    history: Option<HashMap<u64, Departure>>,
    stats: CacheStats,
}

impl CacheArray {
    /// Builds the array from a validated level configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the geometry does not describe a real
    /// cache (zero sizes, line not a power of two, size not divisible by
    /// `ways * line_bytes`).
    pub fn new(
        level: &'static str,
        cfg: &CacheLevelConfig,
        line_bytes: usize,
    ) -> Result<Self, ConfigError> {
        if line_bytes == 0 || !line_bytes.is_power_of_two() {
            return Err(ConfigError::LineSizeNotPowerOfTwo(line_bytes));
        }
        let way_bytes = cfg.ways.checked_mul(line_bytes).unwrap_or(0);
        if cfg.ways == 0 || way_bytes == 0 || cfg.size_bytes == 0 || cfg.size_bytes % way_bytes != 0
        {
            return Err(ConfigError::GeometryInvalid {
                level,
                size: cfg.size_bytes,
                ways: cfg.ways,
                line: line_bytes,
            });
        }
        let sets = cfg.size_bytes / way_bytes;
        Ok(Self {
            lines: vec![LineInfo::default(); sets * cfg.ways],
            data: vec![0; sets * cfg.ways * line_bytes],
            sets,
            ways: cfg.ways,
            line_bytes,
            policy: policies::build(cfg.policy, sets, cfg.ways),
            history: cfg.track_miss_types.then(HashMap::new),
            stats: CacheStats::default(),
        })
    }

    /// Line size in bytes.
    pub fn line_bytes(&self) -> usize {
        self.line_bytes
    }

    /// Access and miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn index(&self, addr: u64) -> (usize, u64) {
        let line = addr as usize / self.line_bytes;
        (line % self.sets, (line / self.sets) as u64)
    }

    fn line_base(&self, set: usize, tag: u64) -> u64 {
        (tag * self.sets as u64 + set as u64) * self.line_bytes as u64
    }

    fn slot(&self, addr: u64) -> Option<usize> {
        let (set, tag) = self.index(addr);
        (0..self.ways)
            .map(|w| set * self.ways + w)
            .find(|&i| self.lines[i].valid() && self.lines[i].tag == tag)
    }

    fn data_of(&self, slot: usize) -> &[u8] {
        &self.data[slot * self.line_bytes..(slot + 1) * self.line_bytes]
    }

    /// Tag bits of `addr` in this array's geometry.
    pub fn tag_of(&self, addr: u64) -> u64 {
        self.index(addr).1
    }

    /// Coherence state of the line holding `addr`, `Invalid` when absent.
    pub fn state(&self, addr: u64) -> CState {
        self.slot(addr).map_or(CState::Invalid, |i| self.lines[i].state)
    }

    /// Metadata of the line holding `addr`, if present.
    pub fn info(&self, addr: u64) -> Option<LineInfo> {
        self.slot(addr).map(|i| self.lines[i])
    }

    /// Rewrites the coherence state of a present line. Returns `false` when
    /// the line is absent.
    pub fn set_state(&mut self, addr: u64, state: CState) -> bool {
        match self.slot(addr) {
            Some(i) => {
                self.lines[i].state = state;
                true
            }
            None => false,
        }
    }

    /// Records which L1 bank mirrors a present line.
    pub fn set_cached_loc(&mut self, addr: u64, loc: Option<L1Bank>) -> bool {
        match self.slot(addr) {
            Some(i) => {
                self.lines[i].cached_loc = loc;
                true
            }
            None => false,
        }
    }

    /// Marks an access for the replacement policy.
    pub fn touch(&mut self, addr: u64) {
        let (set, _) = self.index(addr);
        if let Some(i) = self.slot(addr) {
            self.policy.touch(set, i % self.ways);
        }
    }

    /// Copies the line holding `addr` into `buf`. Returns `false` when the
    /// line is absent.
    pub fn read_line(&self, addr: u64, buf: &mut [u8]) -> bool {
        match self.slot(addr) {
            Some(i) => {
                buf.copy_from_slice(self.data_of(i));
                true
            }
            None => false,
        }
    }

    /// Writes `bytes` at `offset` into the line holding `addr`. Returns
    /// `false` when the line is absent.
    pub fn write_line(&mut self, addr: u64, offset: usize, bytes: &[u8]) -> bool {
        debug_assert!(offset + bytes.len() <= self.line_bytes);
        match self.slot(addr) {
            Some(i) => {
                let base = i * self.line_bytes + offset;
                self.data[base..base + bytes.len()].copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    /// Installs a line, evicting a victim when the set is full.
    ///
    /// An already-present tag is overwritten in place. The victim's address,
    /// metadata, and data are returned so the controller can notify the
    /// home node.
    pub fn insert(&mut self, addr: u64, info: LineInfo, fill: &[u8]) -> Option<Eviction> {
        debug_assert_eq!(fill.len(), self.line_bytes);
        let (set, tag) = self.index(addr);
        debug_assert_eq!(info.tag, tag);

        let base_idx = set * self.ways;
        let way = (0..self.ways)
            .find(|&w| {
                let l = &self.lines[base_idx + w];
                l.valid() && l.tag == tag
            })
            .or_else(|| (0..self.ways).find(|&w| !self.lines[base_idx + w].valid()))
            .unwrap_or_else(|| self.policy.victim(set));

        let idx = base_idx + way;
        let evicted = self.lines[idx];
        let eviction = (evicted.valid() && evicted.tag != tag).then(|| {
            let victim_addr = self.line_base(set, evicted.tag);
            if let Some(history) = self.history.as_mut() {
                let _ = history.insert(victim_addr, Departure::Evicted);
            }
            Eviction {
                addr: victim_addr,
                info: evicted,
                data: self.data_of(idx).to_vec(),
            }
        });

        self.lines[idx] = info;
        let base = idx * self.line_bytes;
        self.data[base..base + self.line_bytes].copy_from_slice(fill);
        self.policy.touch(set, way);

        eviction
    }

    /// Invalidates the line holding `addr`, returning its metadata when it
    /// was present.
    pub fn invalidate(&mut self, addr: u64) -> Option<LineInfo> {
        let i = self.slot(addr)?;
        let info = self.lines[i];
        self.lines[i] = LineInfo::default();
        let (set, _) = self.index(addr);
        let line_addr = self.line_base(set, info.tag);
        if let Some(history) = self.history.as_mut() {
            let _ = history.insert(line_addr, Departure::Invalidated);
        }
        Some(info)
    }

    /// Bumps the access counters for a classified request and, when miss
    /// tracking is enabled, names the miss.
    ///
    /// `exclusive` distinguishes store-intent requests so an exclusive
    /// request over a read-only copy classifies as an upgrade miss.
    pub fn update_miss_counters(
        &mut self,
        addr: u64,
        exclusive: bool,
        miss: bool,
    ) -> Option<MissType> {
        self.stats.accesses += 1;
        if !miss {
            return None;
        }
        self.stats.misses += 1;

        let history = self.history.as_ref()?;
        let line_addr = addr & !(self.line_bytes as u64 - 1);
        let miss_type = if exclusive && self.state(addr).readable() {
            MissType::Upgrade
        } else {
            match history.get(&line_addr) {
                Some(Departure::Evicted) => MissType::Capacity,
                Some(Departure::Invalidated) => MissType::Sharing,
                None => MissType::Cold,
            }
        };
        match miss_type {
            MissType::Cold => self.stats.cold += 1,
            MissType::Capacity => self.stats.capacity += 1,
            MissType::Upgrade => self.stats.upgrade += 1,
            MissType::Sharing => self.stats.sharing += 1,
        }
        Some(miss_type)
    }
}

impl std::fmt::Debug for CacheArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheArray")
            .field("sets", &self.sets)
            .field("ways", &self.ways)
            .field("line_bytes", &self.line_bytes)
            .finish_non_exhaustive()
    }
}
