//! Per-tile memory manager.
//!
//! Owns the L1 controller, the L2 controller, and this tile's slice of the
//! directory; wires them to the network sink and the performance model. The
//! application context enters through [`MemoryManager::load`],
//! [`MemoryManager::store`], and [`MemoryManager::fetch`]; the network
//! dispatcher enters through [`MemoryManager::handle_msg_from_network`].

use std::cell::Cell;
use std::sync::Arc;

use tracing::trace;

use crate::common::error::Fault;
use crate::common::types::{AccessKind, L1Bank, MemComponent, TileId};
use crate::config::Config;
use crate::mem::cache::{CState, CacheStats};
use crate::mem::directory::{DirState, DirectoryCntlr};
use crate::mem::l1::L1CacheCntlr;
use crate::mem::l2::L2CacheCntlr;
use crate::mem::msg::{MsgKind, ShmemMsg};
use crate::mem::network::MsgSink;
use crate::mem::perf::{AccessCost, CostModel, Ctx, ShmemPerfModel};

thread_local! {
    /// Set while this thread is inside an application-context access.
    /// Taking the network entry point in that window would self-deadlock on
    /// the bank lock, so it is detected and promoted to a fatal fault.
    static IN_APP_ACCESS: Cell<bool> = const { Cell::new(false) };
}

/// RAII marker for the application-context window.
struct AppWindow;

impl AppWindow {
    fn enter() -> Self {
        IN_APP_ACCESS.with(|flag| flag.set(true));
        Self
    }
}

impl Drop for AppWindow {
    fn drop(&mut self) {
        IN_APP_ACCESS.with(|flag| flag.set(false));
    }
}

/// One tile's memory subsystem.
pub struct MemoryManager {
    tile: TileId,
    line_bytes: usize,
    l1: Arc<L1CacheCntlr>,
    l2: Arc<L2CacheCntlr>,
    directory: DirectoryCntlr,
    perf: Arc<ShmemPerfModel>,
    costs: CostModel,
}

impl MemoryManager {
    /// Builds one tile: L1 banks, L2 controller, directory slice.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Config`] when the configuration does not validate.
    pub fn new(tile: TileId, config: &Config, sink: Arc<dyn MsgSink>) -> Result<Arc<Self>, Fault> {
        config.validate()?;
        let perf = Arc::new(ShmemPerfModel::new());
        let l1 = Arc::new(L1CacheCntlr::new(tile, &config.cache)?);
        let l2 = Arc::new(L2CacheCntlr::new(
            tile,
            config,
            Arc::clone(&l1),
            Arc::clone(&sink),
            Arc::clone(&perf),
        )?);
        let directory = DirectoryCntlr::new(tile, config, sink);
        Ok(Arc::new(Self {
            tile,
            line_bytes: config.cache.line_bytes,
            l1,
            l2,
            directory,
            perf,
            costs: CostModel::new(config.cache.l1_d.access_delay, config.cache.l2.access_delay),
        }))
    }

    /// This tile's id.
    pub fn tile(&self) -> TileId {
        self.tile
    }

    /// The tile's performance model.
    pub fn perf(&self) -> &ShmemPerfModel {
        &self.perf
    }

    /// Access and miss counters of the L2.
    pub fn l2_stats(&self) -> CacheStats {
        self.l2.stats()
    }

    /// Coherence state of `addr` in the L2.
    pub fn l2_line_state(&self, addr: u64) -> CState {
        self.l2.line_state(addr)
    }

    /// Coherence state of `addr` in an L1 bank.
    pub fn l1_line_state(&self, bank: L1Bank, addr: u64) -> CState {
        self.l1.lock(bank).state(addr)
    }

    /// Copy of the L2's line at `addr`, if present.
    pub fn l2_line_data(&self, addr: u64) -> Option<Vec<u8>> {
        self.l2.line_data(addr)
    }

    /// Sharer/owner bookkeeping of this tile's directory slice for `addr`.
    pub fn directory_snapshot(&self, addr: u64) -> DirState {
        self.directory.line_snapshot(addr)
    }

    /// The backing store's copy of the line at `addr` (home tiles only).
    pub fn backing_line(&self, addr: u64) -> Vec<u8> {
        self.directory.backing_line(addr)
    }

    /// Loads `len` bytes at `addr` through the data bank. Blocks the
    /// calling (application) context while coherence traffic is in flight.
    ///
    /// # Errors
    ///
    /// Propagates any fatal [`Fault`] from the coherence path.
    pub fn load(&self, addr: u64, len: usize, modeled: bool) -> Result<Vec<u8>, Fault> {
        let mut out = vec![0; len];
        self.access_span(L1Bank::Dcache, AccessKind::Load, addr, &mut out, modeled)?;
        Ok(out)
    }

    /// Fetches `len` bytes at `addr` through the instruction bank.
    ///
    /// # Errors
    ///
    /// Propagates any fatal [`Fault`] from the coherence path.
    pub fn fetch(&self, addr: u64, len: usize, modeled: bool) -> Result<Vec<u8>, Fault> {
        let mut out = vec![0; len];
        self.access_span(L1Bank::Icache, AccessKind::Load, addr, &mut out, modeled)?;
        Ok(out)
    }

    /// Stores `bytes` at `addr` through the data bank. Blocks the calling
    /// (application) context while ownership is acquired.
    ///
    /// # Errors
    ///
    /// Propagates any fatal [`Fault`] from the coherence path.
    pub fn store(&self, addr: u64, bytes: &[u8], modeled: bool) -> Result<(), Fault> {
        let mut data = bytes.to_vec();
        self.access_span(L1Bank::Dcache, AccessKind::Store, addr, &mut data, modeled)
    }

    /// Splits a byte span over cache lines and runs each piece.
    fn access_span(
        &self,
        bank: L1Bank,
        kind: AccessKind,
        addr: u64,
        buf: &mut [u8],
        modeled: bool,
    ) -> Result<(), Fault> {
        let line = self.line_bytes as u64;
        let mut cursor = 0usize;
        while cursor < buf.len() {
            let at = addr + cursor as u64;
            let line_addr = at & !(line - 1);
            let offset = (at - line_addr) as usize;
            let take = buf.len() - cursor;
            let chunk = take.min(self.line_bytes - offset);
            self.access_line(
                bank,
                kind,
                line_addr,
                offset,
                &mut buf[cursor..cursor + chunk],
                modeled,
            )?;
            cursor += chunk;
        }
        Ok(())
    }

    /// One line-confined access: L1 first, then the L2. On a miss past the
    /// L2, park on the rendezvous until the network context installs the
    /// grant, and retry.
    fn access_line(
        &self,
        bank: L1Bank,
        kind: AccessKind,
        line_addr: u64,
        offset: usize,
        buf: &mut [u8],
        modeled: bool,
    ) -> Result<(), Fault> {
        let msg_kind = match kind {
            AccessKind::Load => MsgKind::ShReq,
            AccessKind::Store => MsgKind::ExReq,
        };
        loop {
            {
                let _window = AppWindow::enter();
                let mut bank_array = self.l1.lock(bank);
                if self.l1.access(&mut bank_array, line_addr, kind) {
                    self.perf.incr_cycle_count(
                        Ctx::App,
                        self.costs.cycles(bank.component(), AccessCost::DataAndTags),
                    );
                    match kind {
                        AccessKind::Load => {
                            let mut line = vec![0; self.line_bytes];
                            let _ = bank_array.read_line(line_addr, &mut line);
                            buf.copy_from_slice(&line[offset..offset + buf.len()]);
                        }
                        AccessKind::Store => {
                            let _ = bank_array.write_line(line_addr, offset, buf);
                            // The L1 is write-through; mirror the store into
                            // the L2 data array while the line is writable.
                            self.l2.write_through(line_addr, offset, buf);
                        }
                    }
                    return Ok(());
                }

                self.perf.incr_cycle_count(
                    Ctx::App,
                    self.costs.cycles(bank.component(), AccessCost::Tags),
                );
                let status =
                    self.l2
                        .request_from_l1(bank, msg_kind, line_addr, modeled, &mut bank_array)?;
                if status.hit {
                    self.perf.incr_cycle_count(
                        Ctx::App,
                        self.costs.cycles(MemComponent::L2Cache, AccessCost::DataAndTags),
                    );
                    continue;
                }
                self.l2
                    .handle_from_l1(bank, msg_kind, line_addr, modeled, &mut bank_array)?;
            }

            trace!(tile = self.tile, addr = line_addr, "parking until grant");
            let grant = self.l2.rendezvous().collect();
            debug_assert_eq!(grant.addr, line_addr);
        }
    }

    /// Entry point for the network dispatcher: routes a message to the L2
    /// or to this tile's directory slice.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::LockOrder`] when invoked from inside an
    /// application-context access, [`Fault::Misrouted`] for a receiver that
    /// takes no network traffic, and propagates protocol faults.
    pub fn handle_msg_from_network(&self, src: TileId, msg: ShmemMsg) -> Result<(), Fault> {
        if IN_APP_ACCESS.with(Cell::get) {
            return Err(Fault::LockOrder { tile: self.tile });
        }
        match msg.receiver {
            MemComponent::L2Cache => self.l2.handle_from_directory(src, &msg),
            MemComponent::DramDirectory => self.directory.handle_msg_from_l2(src, &msg),
            receiver => Err(Fault::Misrouted {
                tile: self.tile,
                kind: msg.kind,
                receiver,
            }),
        }
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("tile", &self.tile)
            .finish_non_exhaustive()
    }
}
