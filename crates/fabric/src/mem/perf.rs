//! Timing hooks for the memory subsystem.
//!
//! Each tile carries two logical cycle counters, one per execution context.
//! The protocol handlers charge cache access costs at well-defined points;
//! the state transitions themselves stay timing-free so they remain unit
//! testable.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::types::MemComponent;

/// The two execution contexts sharing a tile's memory subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ctx {
    /// The application context, advancing the simulated program.
    App,
    /// The network context, draining coherence traffic.
    Network,
}

/// Which part of a cache an event touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessCost {
    /// Tag probe only (e.g. absorbing a late invalidation).
    Tags,
    /// Full data access plus tag probe.
    DataAndTags,
}

/// Per-component access delays, derived from the configuration.
#[derive(Clone, Copy, Debug)]
pub struct CostModel {
    l1_delay: u64,
    l2_delay: u64,
}

impl CostModel {
    /// Builds the model from the configured access delays.
    pub fn new(l1_delay: u64, l2_delay: u64) -> Self {
        Self { l1_delay, l2_delay }
    }

    /// Cycles charged for `cost` against `component`.
    pub fn cycles(&self, component: MemComponent, cost: AccessCost) -> u64 {
        let full = match component {
            MemComponent::L1Icache | MemComponent::L1Dcache => self.l1_delay,
            MemComponent::L2Cache => self.l2_delay,
            MemComponent::Core | MemComponent::DramDirectory => 0,
        };
        match cost {
            // Tag probes cost a single cycle regardless of the data path.
            AccessCost::Tags => full.min(1),
            AccessCost::DataAndTags => full,
        }
    }
}

/// Per-tile cycle counters for the two contexts, plus miss tracking.
#[derive(Debug, Default)]
pub struct ShmemPerfModel {
    cycles: [AtomicU64; 2],
    accesses: AtomicU64,
    misses: AtomicU64,
}

impl ShmemPerfModel {
    /// A model with both context clocks at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, ctx: Ctx) -> &AtomicU64 {
        &self.cycles[match ctx {
            Ctx::App => 0,
            Ctx::Network => 1,
        }]
    }

    /// Current cycle count of `ctx`.
    pub fn cycle_count(&self, ctx: Ctx) -> u64 {
        self.cell(ctx).load(Ordering::SeqCst)
    }

    /// Rewinds or forwards the clock of `ctx`.
    pub fn set_cycle_count(&self, ctx: Ctx, cycles: u64) {
        self.cell(ctx).store(cycles, Ordering::SeqCst);
    }

    /// Advances the clock of `ctx` by `cycles`.
    pub fn incr_cycle_count(&self, ctx: Ctx, cycles: u64) {
        let _ = self.cell(ctx).fetch_add(cycles, Ordering::SeqCst);
    }

    /// Records the outcome of one classified memory access.
    pub fn track_miss(&self, _addr: u64, miss: bool) {
        let _ = self.accesses.fetch_add(1, Ordering::Relaxed);
        if miss {
            let _ = self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total classified accesses.
    pub fn accesses(&self) -> u64 {
        self.accesses.load(Ordering::Relaxed)
    }

    /// Total classified misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
