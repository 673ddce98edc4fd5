//! L1 cache controller: the split instruction/data banks.
//!
//! Each bank is a [`CacheArray`] behind its own mutex. The application
//! context locks a bank for the duration of an access and passes the guard
//! down into the L2, so "caller already holds the L1 lock" is expressed in
//! the type system rather than by convention. The network context acquires
//! bank locks itself, always before the L2 lock.

use std::sync::{Mutex, MutexGuard};

use crate::common::error::Fault;
use crate::common::types::{AccessKind, L1Bank, TileId};
use crate::config::{CacheHierarchyConfig, ConfigError};
use crate::mem::cache::{CState, CacheArray, Eviction, LineInfo};

/// Holds the two L1 banks and their locks.
pub struct L1CacheCntlr {
    tile: TileId,
    icache: Mutex<CacheArray>,
    dcache: Mutex<CacheArray>,
}

impl L1CacheCntlr {
    /// Builds both banks from the hierarchy configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when either bank's geometry is invalid.
    pub fn new(tile: TileId, cache: &CacheHierarchyConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tile,
            icache: Mutex::new(CacheArray::new("l1_i", &cache.l1_i, cache.line_bytes)?),
            dcache: Mutex::new(CacheArray::new("l1_d", &cache.l1_d, cache.line_bytes)?),
        })
    }

    /// Locks one bank. The guard is the capability every bank operation
    /// takes; holding it is what "holding the L1 lock" means.
    pub fn lock(&self, bank: L1Bank) -> MutexGuard<'_, CacheArray> {
        let mutex = match bank {
            L1Bank::Icache => &self.icache,
            L1Bank::Dcache => &self.dcache,
        };
        mutex.lock().expect("l1 bank lock")
    }

    /// Probes a bank for `addr` with the intent of `kind`, updating the
    /// replacement state on a hit.
    pub fn access(&self, array: &mut CacheArray, addr: u64, kind: AccessKind) -> bool {
        let state = array.state(addr);
        let hit = match kind {
            AccessKind::Load => state.readable(),
            AccessKind::Store => state.writable(),
        };
        if hit {
            array.touch(addr);
        }
        hit
    }

    /// Installs a line into a bank, reporting the victim (if any) so the L2
    /// can clear its `cached_loc`.
    ///
    /// # Errors
    ///
    /// The instruction bank may only hold `I`, `S`, or `E`; asking it to
    /// hold a dirty state is a [`Fault::IcacheWritable`].
    pub fn insert(
        &self,
        bank: L1Bank,
        array: &mut CacheArray,
        addr: u64,
        state: CState,
        fill: &[u8],
    ) -> Result<Option<Eviction>, Fault> {
        self.check_icache_state(bank, addr, state)?;
        let tag = array.tag_of(addr);
        Ok(array.insert(addr, LineInfo::new(tag, state), fill))
    }

    /// Invalidates a line in a bank. Absent lines are ignored; eviction from
    /// the L2 can race ahead of the bank's own bookkeeping.
    pub fn invalidate(&self, array: &mut CacheArray, addr: u64) -> Option<LineInfo> {
        array.invalidate(addr)
    }

    /// Rewrites the coherence state of a line present in a bank.
    ///
    /// # Errors
    ///
    /// Dirty states on the instruction bank are a [`Fault::IcacheWritable`].
    pub fn set_state(
        &self,
        bank: L1Bank,
        array: &mut CacheArray,
        addr: u64,
        state: CState,
    ) -> Result<bool, Fault> {
        self.check_icache_state(bank, addr, state)?;
        Ok(array.set_state(addr, state))
    }

    fn check_icache_state(&self, bank: L1Bank, addr: u64, state: CState) -> Result<(), Fault> {
        if bank == L1Bank::Icache && matches!(state, CState::Modified | CState::Owned) {
            return Err(Fault::IcacheWritable {
                tile: self.tile,
                addr,
                state,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for L1CacheCntlr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1CacheCntlr")
            .field("tile", &self.tile)
            .finish_non_exhaustive()
    }
}
