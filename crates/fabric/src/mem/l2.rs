//! L2 cache controller: the coherence state machine.
//!
//! The controller is two-sided. The application context enters through
//! [`L2CacheCntlr::request_from_l1`] and [`L2CacheCntlr::handle_from_l1`]
//! while holding the requesting L1 bank's lock; the network context enters
//! through [`L2CacheCntlr::handle_from_directory`]. The two sides share the
//! cache metadata under the L2 lock and meet exactly once per miss, at the
//! reply-install rendezvous.
//!
//! Lock order for directory-initiated messages: probe `cached_loc` under
//! the L2 lock only, release it, take the named L1 bank lock, retake the L2
//! lock. Application-context requests hold L1 first and then enter the L2,
//! so this order is the one that cannot deadlock against them.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::common::error::Fault;
use crate::common::types::{L1Bank, MemComponent, TileId};
use crate::config::Config;
use crate::mem::cache::{CState, CacheArray, CacheStats, Eviction, LineInfo, MissType};
use crate::mem::home::HomeLookup;
use crate::mem::l1::L1CacheCntlr;
use crate::mem::msg::{MsgKind, ShmemMsg};
use crate::mem::network::MsgSink;
use crate::mem::perf::{AccessCost, CostModel, Ctx, ShmemPerfModel};
use crate::mem::protocol::{self, Protocol};
use crate::mem::rendezvous::Rendezvous;

/// Hit/miss outcome of classifying an L1 request against the L2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestStatus {
    /// Whether the request completed locally.
    pub hit: bool,
    /// Miss classification, when tracking is enabled and the request
    /// missed.
    pub miss_type: Option<MissType>,
}

/// The at-most-one in-flight L1-originated directory request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutstandingReq {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A request left for the home directory and its grant is awaited.
    Awaiting {
        /// Line address in flight.
        addr: u64,
        /// Bank that originated the request and receives the fill.
        bank: L1Bank,
        /// Application-context clock when the request was handed over.
        t0: u64,
    },
}

/// Token handed to the parked application context once a grant installs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillGrant {
    /// Address the grant was for.
    pub addr: u64,
    /// Grant kind (`EX_REP`, `SH_REP`, or `UPGRADE_REP`).
    pub kind: MsgKind,
}

/// Pure hit/miss classification: does a request of `kind` complete against
/// a line in `state`?
///
/// Returns `None` for kinds that are not L1-originated requests.
pub fn request_hits(kind: MsgKind, state: CState) -> Option<bool> {
    match kind {
        MsgKind::ExReq => Some(state.writable()),
        MsgKind::ShReq => Some(state.readable()),
        _ => None,
    }
}

/// Metadata and the outstanding slot, guarded together by the L2 lock.
struct L2Inner {
    array: CacheArray,
    outstanding: OutstandingReq,
}

/// The L2 cache controller of one tile.
pub struct L2CacheCntlr {
    tile: TileId,
    inner: Mutex<L2Inner>,
    l1: Arc<L1CacheCntlr>,
    home: HomeLookup,
    sink: Arc<dyn MsgSink>,
    perf: Arc<ShmemPerfModel>,
    costs: CostModel,
    rendezvous: Rendezvous<FillGrant>,
    protocol: &'static dyn Protocol,
    line_bytes: usize,
}

impl L2CacheCntlr {
    /// Builds the controller.
    ///
    /// The L1 controller is the capability this L2 downgrades and fills
    /// lines through; the enclosing memory manager owns both.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Config`] when the L2 geometry is invalid.
    pub fn new(
        tile: TileId,
        config: &Config,
        l1: Arc<L1CacheCntlr>,
        sink: Arc<dyn MsgSink>,
        perf: Arc<ShmemPerfModel>,
    ) -> Result<Self, Fault> {
        let array = CacheArray::new("l2", &config.cache.l2, config.cache.line_bytes)?;
        Ok(Self {
            tile,
            inner: Mutex::new(L2Inner {
                array,
                outstanding: OutstandingReq::Idle,
            }),
            l1,
            home: HomeLookup::new(config.fabric.num_tiles, config.cache.line_bytes),
            sink,
            perf,
            costs: CostModel::new(config.cache.l1_d.access_delay, config.cache.l2.access_delay),
            rendezvous: Rendezvous::new(),
            protocol: protocol::dispatch(config.protocol),
            line_bytes: config.cache.line_bytes,
        })
    }

    /// The rendezvous the application context parks on after a miss.
    pub fn rendezvous(&self) -> &Rendezvous<FillGrant> {
        &self.rendezvous
    }

    /// Access and miss counters of the L2 array.
    pub fn stats(&self) -> CacheStats {
        self.lock_inner().array.stats()
    }

    /// Coherence state of `addr` in the L2.
    pub fn line_state(&self, addr: u64) -> CState {
        self.lock_inner().array.state(addr)
    }

    /// Copies the line holding `addr` out of the L2, if present.
    pub fn line_data(&self, addr: u64) -> Option<Vec<u8>> {
        let inner = self.lock_inner();
        let mut buf = vec![0; self.line_bytes];
        inner.array.read_line(addr, &mut buf).then_some(buf)
    }

    /// Stores through to the L2 data array. The L1 is write-through, so the
    /// application context mirrors every store here while it holds the
    /// writable line.
    pub fn write_through(&self, addr: u64, offset: usize, bytes: &[u8]) {
        let mut inner = self.lock_inner();
        let _ = inner.array.write_line(addr, offset, bytes);
    }

    fn lock_inner(&self) -> MutexGuard<'_, L2Inner> {
        self.inner.lock().expect("l2 cache lock")
    }

    fn send_to_home(&self, msg: ShmemMsg) {
        let dest = self.home.home(msg.addr);
        trace!(tile = self.tile, dest, kind = %msg.kind, addr = msg.addr, "send to home");
        self.sink.send_msg(dest, msg);
    }

    /// Classifies an L1 request against the L2 and, on a hit, refills the
    /// requesting bank. Called by the application context, which holds the
    /// bank's lock and passes it as `l1_array`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::ProtocolViolation`] for kinds other than `EX_REQ` /
    /// `SH_REQ`.
    pub fn request_from_l1(
        &self,
        bank: L1Bank,
        kind: MsgKind,
        addr: u64,
        modeled: bool,
        l1_array: &mut CacheArray,
    ) -> Result<RequestStatus, Fault> {
        let mut inner = self.lock_inner();
        let state = inner.array.state(addr);
        let hit = request_hits(kind, state).ok_or(Fault::ProtocolViolation {
            tile: self.tile,
            component: MemComponent::L2Cache,
            kind,
            state,
            addr,
        })?;

        let miss_type = if modeled {
            self.perf.track_miss(addr, !hit);
            inner
                .array
                .update_miss_counters(addr, kind == MsgKind::ExReq, !hit)
        } else {
            None
        };

        if hit {
            inner.array.touch(addr);
            let mut fill = vec![0; self.line_bytes];
            let _ = inner.array.read_line(addr, &mut fill);
            let l1_state = Self::l1_state_for(bank, state);
            if let Some(shadow) = self.l1.insert(bank, l1_array, addr, l1_state, &fill)? {
                let _ = inner.array.set_cached_loc(shadow.addr, None);
            }
            let _ = inner.array.set_cached_loc(addr, Some(bank));
        }

        trace!(
            tile = self.tile,
            %kind,
            addr = addr,
            %state,
            hit,
            "request from l1"
        );
        Ok(RequestStatus { hit, miss_type })
    }

    /// Takes over a missed L1 request: populates the outstanding slot and
    /// forwards the request to the home directory. Called by the
    /// application context with the bank lock held; the caller parks on the
    /// rendezvous after releasing it.
    ///
    /// # Errors
    ///
    /// Returns a fault when the slot is already occupied, the kind is not a
    /// request, or the local state does not admit the request.
    pub fn handle_from_l1(
        &self,
        bank: L1Bank,
        kind: MsgKind,
        addr: u64,
        modeled: bool,
        l1_array: &mut CacheArray,
    ) -> Result<(), Fault> {
        let mut inner = self.lock_inner();
        if let OutstandingReq::Awaiting { addr: pending, .. } = inner.outstanding {
            return Err(Fault::StrayReply {
                tile: self.tile,
                kind,
                addr,
                outstanding: Some(pending),
            });
        }
        inner.outstanding = OutstandingReq::Awaiting {
            addr,
            bank,
            t0: self.perf.cycle_count(Ctx::App),
        };

        match kind {
            MsgKind::ExReq => self.forward_exclusive(&mut inner, bank, addr, modeled, l1_array),
            MsgKind::ShReq => {
                self.send_to_home(ShmemMsg::control(
                    MsgKind::ShReq,
                    MemComponent::L2Cache,
                    MemComponent::DramDirectory,
                    self.tile,
                    addr,
                    modeled,
                ));
                Ok(())
            }
            _ => Err(Fault::ProtocolViolation {
                tile: self.tile,
                component: MemComponent::L2Cache,
                kind,
                state: inner.array.state(addr),
                addr,
            }),
        }
    }

    fn forward_exclusive(
        &self,
        inner: &mut L2Inner,
        bank: L1Bank,
        addr: u64,
        modeled: bool,
        l1_array: &mut CacheArray,
    ) -> Result<(), Fault> {
        let state = inner.array.state(addr);
        if !self.protocol.may_request_exclusive_over(state) {
            return Err(Fault::ProtocolViolation {
                tile: self.tile,
                component: MemComponent::L2Cache,
                kind: MsgKind::ExReq,
                state,
                addr,
            });
        }

        if state == CState::Shared && self.protocol.eager_upgrade_surrender() {
            // Surrender the read copy before asking for ownership; the
            // directory sees the INV_REP first (per-pair FIFO) and drops us
            // from the sharer set.
            if inner.array.info(addr).and_then(|i| i.cached_loc) == Some(bank) {
                let _ = self.l1.invalidate(l1_array, addr);
            }
            let _ = inner.array.invalidate(addr);
            self.send_to_home(ShmemMsg::control(
                MsgKind::InvRep,
                MemComponent::L2Cache,
                MemComponent::DramDirectory,
                self.tile,
                addr,
                modeled,
            ));
        }

        self.send_to_home(ShmemMsg::control(
            MsgKind::ExReq,
            MemComponent::L2Cache,
            MemComponent::DramDirectory,
            self.tile,
            addr,
            modeled,
        ));
        Ok(())
    }

    /// Entry point for every message the home directories send this tile.
    /// Runs on the network context.
    ///
    /// # Errors
    ///
    /// Any (state, kind) pair outside the protocol table is a fatal
    /// [`Fault`].
    pub fn handle_from_directory(&self, sender: TileId, msg: &ShmemMsg) -> Result<(), Fault> {
        if !self.protocol.accepts_from_directory(msg.kind) {
            return Err(Fault::ProtocolViolation {
                tile: self.tile,
                component: MemComponent::L2Cache,
                kind: msg.kind,
                state: self.line_state(msg.addr),
                addr: msg.addr,
            });
        }
        debug!(
            tile = self.tile,
            sender,
            kind = %msg.kind,
            addr = msg.addr,
            "message from directory"
        );
        if msg.kind.is_grant() {
            self.install_grant(msg)
        } else {
            self.serve_demand(sender, msg)
        }
    }

    fn l1_state_for(bank: L1Bank, state: CState) -> CState {
        // The instruction bank never holds writable lines; a fetch of a
        // dirty L2 line is mirrored read-only.
        if bank == L1Bank::Icache && matches!(state, CState::Modified | CState::Owned) {
            CState::Shared
        } else {
            state
        }
    }

    /// Installs `EX_REP` / `SH_REP` / `UPGRADE_REP` for the outstanding
    /// request and wakes the application context.
    fn install_grant(&self, msg: &ShmemMsg) -> Result<(), Fault> {
        // Fixed order: the originating bank's lock first, then the L2 lock.
        let bank = {
            let inner = self.lock_inner();
            match inner.outstanding {
                OutstandingReq::Awaiting { addr, bank, .. } if addr == msg.addr => bank,
                OutstandingReq::Awaiting { addr, .. } => {
                    return Err(Fault::StrayReply {
                        tile: self.tile,
                        kind: msg.kind,
                        addr: msg.addr,
                        outstanding: Some(addr),
                    });
                }
                OutstandingReq::Idle => {
                    return Err(Fault::StrayReply {
                        tile: self.tile,
                        kind: msg.kind,
                        addr: msg.addr,
                        outstanding: None,
                    });
                }
            }
        };
        let mut l1_guard = self.l1.lock(bank);
        let mut inner = self.lock_inner();

        let eviction = match msg.kind {
            MsgKind::ExRep => {
                self.install_line(&mut inner, bank, &mut l1_guard, msg, CState::Modified)?
            }
            MsgKind::ShRep => {
                self.install_line(&mut inner, bank, &mut l1_guard, msg, CState::Shared)?
            }
            MsgKind::UpgradeRep => {
                self.apply_upgrade(&mut inner, bank, &mut l1_guard, msg)?;
                None
            }
            _ => unreachable!("is_grant covers exactly the three grant kinds"),
        };

        let t0 = match inner.outstanding {
            OutstandingReq::Awaiting { t0, .. } => t0,
            OutstandingReq::Idle => 0,
        };
        inner.outstanding = OutstandingReq::Idle;
        drop(inner);

        if let Some(victim) = eviction {
            self.dispose_victim(victim, Some((bank, &mut l1_guard)), msg.modeled);
        }
        drop(l1_guard);

        // Unmodeled round trips rewind the network clock to the enqueue
        // time, so only the L2 fill itself is charged.
        if !msg.modeled {
            self.perf.set_cycle_count(Ctx::Network, t0);
        }
        let cost = if msg.kind == MsgKind::UpgradeRep {
            AccessCost::Tags
        } else {
            AccessCost::DataAndTags
        };
        self.perf.incr_cycle_count(
            Ctx::Network,
            self.costs.cycles(MemComponent::L2Cache, cost),
        );
        self.perf
            .set_cycle_count(Ctx::App, self.perf.cycle_count(Ctx::Network));

        trace!(tile = self.tile, addr = msg.addr, kind = %msg.kind, "wake application context");
        self.rendezvous.deliver(FillGrant {
            addr: msg.addr,
            kind: msg.kind,
        });
        Ok(())
    }

    fn install_line(
        &self,
        inner: &mut L2Inner,
        bank: L1Bank,
        l1_array: &mut CacheArray,
        msg: &ShmemMsg,
        state: CState,
    ) -> Result<Option<Eviction>, Fault> {
        let tag = inner.array.tag_of(msg.addr);
        let eviction = inner
            .array
            .insert(msg.addr, LineInfo::new(tag, state), &msg.data);
        if let Some(ref victim) = eviction {
            debug!(
                tile = self.tile,
                addr = victim.addr,
                state = %victim.info.state,
                "capacity eviction"
            );
        }

        let l1_state = Self::l1_state_for(bank, state);
        if let Some(shadow) = self.l1.insert(bank, l1_array, msg.addr, l1_state, &msg.data)? {
            let _ = inner.array.set_cached_loc(shadow.addr, None);
        }
        let _ = inner.array.set_cached_loc(msg.addr, Some(bank));
        Ok(eviction)
    }

    fn apply_upgrade(
        &self,
        inner: &mut L2Inner,
        bank: L1Bank,
        l1_array: &mut CacheArray,
        msg: &ShmemMsg,
    ) -> Result<(), Fault> {
        let info = inner.array.info(msg.addr);
        let state = info.map_or(CState::Invalid, |i| i.state);
        if !matches!(state, CState::Shared | CState::Owned) {
            return Err(Fault::ProtocolViolation {
                tile: self.tile,
                component: MemComponent::L2Cache,
                kind: msg.kind,
                state,
                addr: msg.addr,
            });
        }
        let _ = inner.array.set_state(msg.addr, CState::Modified);

        if info.and_then(|i| i.cached_loc) == Some(bank) {
            let _ = self
                .l1
                .set_state(bank, l1_array, msg.addr, CState::Modified)?;
        } else {
            // The bank lost its copy to capacity since the request left;
            // refill it from the L2 data, now writable.
            let mut fill = vec![0; self.line_bytes];
            let _ = inner.array.read_line(msg.addr, &mut fill);
            if let Some(shadow) = self
                .l1
                .insert(bank, l1_array, msg.addr, CState::Modified, &fill)?
            {
                let _ = inner.array.set_cached_loc(shadow.addr, None);
            }
            let _ = inner.array.set_cached_loc(msg.addr, Some(bank));
        }
        Ok(())
    }

    /// Serves a directory demand: `INV_REQ`, `FLUSH_REQ`, `WB_REQ`, or the
    /// combined flush/invalidate.
    fn serve_demand(&self, sender: TileId, msg: &ShmemMsg) -> Result<(), Fault> {
        let (mut l1_guard, mut inner) = self.acquire_for_demand(msg.addr);

        let state = inner.array.state(msg.addr);
        if state == CState::Invalid {
            // The line already left on its own (self-eviction); the demand
            // is stale. Absorb it with a tag-probe charge and no reply.
            drop(inner);
            self.perf.incr_cycle_count(
                Ctx::Network,
                self.costs.cycles(MemComponent::L2Cache, AccessCost::Tags),
            );
            trace!(tile = self.tile, kind = %msg.kind, addr = msg.addr, "stale demand absorbed");
            return Ok(());
        }

        let effective = match msg.kind {
            MsgKind::InvFlushCombinedReq => {
                if self.protocol.may_surrender(state) {
                    MsgKind::FlushReq
                } else {
                    MsgKind::InvReq
                }
            }
            kind => kind,
        };

        match effective {
            MsgKind::InvReq => self.apply_invalidate(&mut inner, l1_guard.as_mut(), sender, msg, state),
            MsgKind::FlushReq => self.apply_flush(&mut inner, l1_guard.as_mut(), sender, msg, state),
            MsgKind::WbReq => self.apply_writeback(&mut inner, l1_guard.as_mut(), sender, msg, state),
            _ => unreachable!("serve_demand dispatches demands only"),
        }
    }

    /// Lock acquisition for a directory demand: probe `cached_loc` under
    /// the L2 lock, release it, take the bank lock, retake the L2 lock.
    /// Retries when the probe raced an application-context refill.
    fn acquire_for_demand(
        &self,
        addr: u64,
    ) -> (
        Option<(L1Bank, MutexGuard<'_, CacheArray>)>,
        MutexGuard<'_, L2Inner>,
    ) {
        loop {
            let probed = {
                let inner = self.lock_inner();
                inner.array.info(addr).and_then(|i| i.cached_loc)
            };
            let l1_guard = probed.map(|bank| (bank, self.l1.lock(bank)));
            let inner = self.lock_inner();
            let current = inner.array.info(addr).and_then(|i| i.cached_loc);
            if current == probed {
                return (l1_guard, inner);
            }
            drop(inner);
            drop(l1_guard);
        }
    }

    fn charge_demand(&self, cost: AccessCost, loc: Option<L1Bank>) {
        self.perf
            .incr_cycle_count(Ctx::Network, self.costs.cycles(MemComponent::L2Cache, cost));
        if let Some(bank) = loc {
            self.perf.incr_cycle_count(
                Ctx::Network,
                self.costs.cycles(bank.component(), AccessCost::Tags),
            );
        }
    }

    fn reply_to(&self, dest: TileId, msg: ShmemMsg) {
        trace!(tile = self.tile, dest, kind = %msg.kind, addr = msg.addr, "reply to directory");
        self.sink.send_msg(dest, msg);
    }

    fn apply_invalidate(
        &self,
        inner: &mut L2Inner,
        l1_guard: Option<&mut (L1Bank, MutexGuard<'_, CacheArray>)>,
        sender: TileId,
        msg: &ShmemMsg,
        state: CState,
    ) -> Result<(), Fault> {
        if state != CState::Shared {
            return Err(Fault::ProtocolViolation {
                tile: self.tile,
                component: MemComponent::L2Cache,
                kind: msg.kind,
                state,
                addr: msg.addr,
            });
        }
        let loc = inner.array.info(msg.addr).and_then(|i| i.cached_loc);
        self.charge_demand(AccessCost::Tags, loc);

        if let (Some(bank), Some((_, array))) = (loc, l1_guard) {
            debug_assert_ne!(bank, L1Bank::Icache, "write demands never target the i-bank");
            let _ = self.l1.invalidate(array, msg.addr);
        }
        let _ = inner.array.invalidate(msg.addr);

        self.reply_to(
            sender,
            ShmemMsg::control(
                MsgKind::InvRep,
                MemComponent::L2Cache,
                MemComponent::DramDirectory,
                msg.requester,
                msg.addr,
                msg.modeled,
            ),
        );
        Ok(())
    }

    fn apply_flush(
        &self,
        inner: &mut L2Inner,
        l1_guard: Option<&mut (L1Bank, MutexGuard<'_, CacheArray>)>,
        sender: TileId,
        msg: &ShmemMsg,
        state: CState,
    ) -> Result<(), Fault> {
        if !self.protocol.may_surrender(state) {
            return Err(Fault::ProtocolViolation {
                tile: self.tile,
                component: MemComponent::L2Cache,
                kind: msg.kind,
                state,
                addr: msg.addr,
            });
        }
        let loc = inner.array.info(msg.addr).and_then(|i| i.cached_loc);
        self.charge_demand(AccessCost::DataAndTags, loc);

        if let (Some(_), Some((_, array))) = (loc, l1_guard) {
            let _ = self.l1.invalidate(array, msg.addr);
        }
        let mut data = vec![0; self.line_bytes];
        let _ = inner.array.read_line(msg.addr, &mut data);
        let _ = inner.array.invalidate(msg.addr);

        self.reply_to(
            sender,
            ShmemMsg::with_data(
                MsgKind::FlushRep,
                MemComponent::L2Cache,
                MemComponent::DramDirectory,
                msg.requester,
                msg.addr,
                msg.modeled,
                data,
            ),
        );
        Ok(())
    }

    fn apply_writeback(
        &self,
        inner: &mut L2Inner,
        l1_guard: Option<&mut (L1Bank, MutexGuard<'_, CacheArray>)>,
        sender: TileId,
        msg: &ShmemMsg,
        state: CState,
    ) -> Result<(), Fault> {
        if !self.protocol.may_surrender(state) {
            return Err(Fault::ProtocolViolation {
                tile: self.tile,
                component: MemComponent::L2Cache,
                kind: msg.kind,
                state,
                addr: msg.addr,
            });
        }
        let loc = inner.array.info(msg.addr).and_then(|i| i.cached_loc);
        self.charge_demand(AccessCost::DataAndTags, loc);

        if let (Some(bank), Some((_, array))) = (loc, l1_guard) {
            let _ = self.l1.set_state(bank, array, msg.addr, CState::Shared)?;
        }
        let mut data = vec![0; self.line_bytes];
        let _ = inner.array.read_line(msg.addr, &mut data);
        let _ = inner.array.set_state(msg.addr, self.protocol.after_writeback());

        self.reply_to(
            sender,
            ShmemMsg::with_data(
                MsgKind::WbRep,
                MemComponent::L2Cache,
                MemComponent::DramDirectory,
                msg.requester,
                msg.addr,
                msg.modeled,
                data,
            ),
        );
        Ok(())
    }

    /// Notifies the victim's home after a capacity eviction: `FLUSH_REP`
    /// with the bytes for dirty lines, `INV_REP` for clean ones. Runs after
    /// the L2 lock is released; `held` is the bank lock the caller still
    /// holds, reused when the victim was mirrored there.
    fn dispose_victim(
        &self,
        victim: Eviction,
        held: Option<(L1Bank, &mut MutexGuard<'_, CacheArray>)>,
        modeled: bool,
    ) {
        if let Some(loc) = victim.info.cached_loc {
            match held {
                Some((bank, array)) if bank == loc => {
                    let _ = self.l1.invalidate(array, victim.addr);
                }
                _ => {
                    let mut guard = self.l1.lock(loc);
                    let _ = self.l1.invalidate(&mut guard, victim.addr);
                }
            }
        }

        let kind = if victim.info.state.dirty() {
            MsgKind::FlushRep
        } else {
            MsgKind::InvRep
        };
        let msg = if kind == MsgKind::FlushRep {
            ShmemMsg::with_data(
                kind,
                MemComponent::L2Cache,
                MemComponent::DramDirectory,
                self.tile,
                victim.addr,
                modeled,
                victim.data,
            )
        } else {
            ShmemMsg::control(
                kind,
                MemComponent::L2Cache,
                MemComponent::DramDirectory,
                self.tile,
                victim.addr,
                modeled,
            )
        };
        self.send_to_home(msg);
    }
}

impl std::fmt::Debug for L2CacheCntlr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L2CacheCntlr")
            .field("tile", &self.tile)
            .field("protocol", &self.protocol.name())
            .finish_non_exhaustive()
    }
}
