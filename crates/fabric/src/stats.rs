//! Simulation statistics collection and reporting.
//!
//! This module tracks fabric-wide metrics for a run:
//! 1. **Message traffic:** counts per coherence message kind.
//! 2. **Per-tile caches:** L2 access/miss counts with the miss-type
//!    breakdown when tracking is enabled.
//! 3. **Report:** a plain-text summary for the CLI and tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::mem::manager::MemoryManager;
use crate::mem::msg::MsgKind;
use crate::mem::perf::Ctx;

/// Number of distinct message kinds on the wire.
const KINDS: usize = 12;

const KIND_TABLE: [MsgKind; KINDS] = [
    MsgKind::ExReq,
    MsgKind::ShReq,
    MsgKind::ExRep,
    MsgKind::ShRep,
    MsgKind::InvReq,
    MsgKind::InvRep,
    MsgKind::FlushReq,
    MsgKind::FlushRep,
    MsgKind::WbReq,
    MsgKind::WbRep,
    MsgKind::UpgradeRep,
    MsgKind::InvFlushCombinedReq,
];

/// Fabric-wide message counts by kind.
#[derive(Debug, Default)]
pub struct MsgCounters {
    counts: [AtomicU64; KINDS],
}

impl MsgCounters {
    /// All-zero counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one message of `kind`.
    pub fn record(&self, kind: MsgKind) {
        let _ = self.counts[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Count of messages of `kind` so far.
    pub fn count(&self, kind: MsgKind) -> u64 {
        self.counts[kind as usize].load(Ordering::Relaxed)
    }

    /// Total messages of any kind.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

/// Renders a plain-text report over every tile of a fabric.
pub fn report(tiles: &[Arc<MemoryManager>], msgs: &MsgCounters) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let _ = writeln!(out, "=== tile fabric report ===");
    for tile in tiles {
        let stats = tile.l2_stats();
        let hits = stats.accesses - stats.misses;
        let rate = if stats.accesses == 0 {
            0.0
        } else {
            hits as f64 * 100.0 / stats.accesses as f64
        };
        let _ = writeln!(
            out,
            "tile {:>3}: l2 accesses {:>8}  hits {:>8}  misses {:>8}  hit-rate {rate:6.2}%  \
             cycles app {:>10} net {:>10}",
            tile.tile(),
            stats.accesses,
            hits,
            stats.misses,
            tile.perf().cycle_count(Ctx::App),
            tile.perf().cycle_count(Ctx::Network),
        );
        if stats.cold + stats.capacity + stats.upgrade + stats.sharing > 0 {
            let _ = writeln!(
                out,
                "          misses by type: cold {} capacity {} upgrade {} sharing {}",
                stats.cold, stats.capacity, stats.upgrade, stats.sharing
            );
        }
    }
    let _ = writeln!(out, "messages: {} total", msgs.total());
    for kind in KIND_TABLE {
        let n = msgs.count(kind);
        if n > 0 {
            let _ = writeln!(out, "  {kind:<24} {n:>8}");
        }
    }
    out
}
