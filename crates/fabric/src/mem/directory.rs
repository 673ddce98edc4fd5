//! Home-node directory controller.
//!
//! Each tile serializes the coherence transitions of the addresses it is
//! home for. The directory tracks, per line, who owns it and who shares
//! it, demands invalidations / flushes / write-backs from remote L2s, and
//! answers requests with data grants. While a demand is outstanding for a
//! line, at most one conflicting request is buffered and replayed when the
//! demand completes.
//!
//! The backing store is blank-initialized: a never-written line reads as
//! zeroes.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::common::error::Fault;
use crate::common::types::{MemComponent, TileId};
use crate::config::Config;
use crate::mem::msg::{MsgKind, ShmemMsg};
use crate::mem::network::MsgSink;
use crate::mem::protocol::{self, Protocol};

/// Sharer/owner bookkeeping for one line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DirState {
    /// No cache holds the line; the backing store is current.
    #[default]
    Uncached,
    /// Clean copies at the listed tiles; the backing store is current.
    Shared(BTreeSet<TileId>),
    /// One dirty copy at the owner; the backing store is stale.
    Modified(TileId),
    /// A dirty owner serving reads, plus clean sharers (may include the
    /// owner). MOSI only.
    Owned {
        /// Tile holding the dirty copy.
        owner: TileId,
        /// Tiles holding read copies.
        sharers: BTreeSet<TileId>,
    },
}

impl DirState {
    fn describe(&self) -> &'static str {
        match self {
            Self::Uncached => "uncached",
            Self::Shared(_) => "shared",
            Self::Modified(_) => "modified",
            Self::Owned { .. } => "owned",
        }
    }
}

/// A demand in flight to one or more remote L2s.
#[derive(Clone, Debug)]
enum PendingOp {
    /// Invalidations outstanding for an exclusive grant.
    Invalidations {
        requester: TileId,
        remaining: u32,
        upgrade: bool,
        modeled: bool,
    },
    /// A flush (and possibly invalidations) outstanding for an exclusive
    /// grant.
    Flush {
        requester: TileId,
        remaining_invs: u32,
        flush_done: bool,
        upgrade: bool,
        modeled: bool,
    },
    /// A write-back outstanding for a shared grant.
    WriteBack { requester: TileId, modeled: bool },
}

/// The single buffered request behind a pending demand.
#[derive(Clone, Copy, Debug)]
struct BufferedReq {
    requester: TileId,
    kind: MsgKind,
    modeled: bool,
}

#[derive(Debug, Default)]
struct DirectoryEntry {
    state: DirState,
    pending: Option<PendingOp>,
    buffered: Option<BufferedReq>,
}

#[derive(Debug, Default)]
struct DirectoryInner {
    entries: HashMap<u64, DirectoryEntry>,
    memory: HashMap<u64, Vec<u8>>,
}

/// Directory controller for the addresses this tile is home for.
pub struct DirectoryCntlr {
    tile: TileId,
    line_bytes: usize,
    protocol: &'static dyn Protocol,
    inner: Mutex<DirectoryInner>,
    sink: Arc<dyn MsgSink>,
}

impl DirectoryCntlr {
    /// Builds the controller with a blank backing store.
    pub fn new(tile: TileId, config: &Config, sink: Arc<dyn MsgSink>) -> Self {
        Self {
            tile,
            line_bytes: config.cache.line_bytes,
            protocol: protocol::dispatch(config.protocol),
            inner: Mutex::new(DirectoryInner::default()),
            sink,
        }
    }

    /// Sharer/owner bookkeeping for `addr`, for inspection.
    pub fn line_snapshot(&self, addr: u64) -> DirState {
        self.lock_inner()
            .entries
            .get(&addr)
            .map_or(DirState::Uncached, |e| e.state.clone())
    }

    /// The backing store's copy of the line at `addr`.
    pub fn backing_line(&self, addr: u64) -> Vec<u8> {
        let inner = self.lock_inner();
        Self::mem_read(&inner.memory, addr, self.line_bytes)
    }

    fn lock_inner(&self) -> MutexGuard<'_, DirectoryInner> {
        self.inner.lock().expect("directory lock")
    }

    fn mem_read(memory: &HashMap<u64, Vec<u8>>, addr: u64, line_bytes: usize) -> Vec<u8> {
        memory.get(&addr).cloned().unwrap_or_else(|| vec![0; line_bytes])
    }

    fn violation(&self, kind: MsgKind, addr: u64, entry: &DirectoryEntry) -> Fault {
        Fault::DirectoryViolation {
            tile: self.tile,
            kind,
            addr,
            entry: if entry.pending.is_some() {
                "pending"
            } else {
                entry.state.describe()
            },
        }
    }

    fn send(&self, dest: TileId, kind: MsgKind, requester: TileId, addr: u64, modeled: bool) {
        trace!(home = self.tile, dest, %kind, addr, "directory send");
        self.sink.send_msg(
            dest,
            ShmemMsg::control(
                kind,
                MemComponent::DramDirectory,
                MemComponent::L2Cache,
                requester,
                addr,
                modeled,
            ),
        );
    }

    fn send_data(
        &self,
        dest: TileId,
        kind: MsgKind,
        requester: TileId,
        addr: u64,
        modeled: bool,
        data: Vec<u8>,
    ) {
        trace!(home = self.tile, dest, %kind, addr, "directory send");
        self.sink.send_msg(
            dest,
            ShmemMsg::with_data(
                kind,
                MemComponent::DramDirectory,
                MemComponent::L2Cache,
                requester,
                addr,
                modeled,
                data,
            ),
        );
    }

    /// Entry point for every message remote L2s send this home node. Runs
    /// on the network context.
    ///
    /// # Errors
    ///
    /// Any message outside the per-line serialization discipline is a fatal
    /// [`Fault`].
    pub fn handle_msg_from_l2(&self, sender: TileId, msg: &ShmemMsg) -> Result<(), Fault> {
        debug!(home = self.tile, sender, kind = %msg.kind, addr = msg.addr, "message from l2");
        let mut inner = self.lock_inner();
        match msg.kind {
            MsgKind::ExReq | MsgKind::ShReq => {
                self.process_request(&mut inner, msg.requester, msg.kind, msg.addr, msg.modeled)
            }
            MsgKind::InvRep => self.process_inv_rep(&mut inner, sender, msg.addr),
            MsgKind::FlushRep => self.process_flush_rep(&mut inner, sender, msg),
            MsgKind::WbRep => self.process_wb_rep(&mut inner, sender, msg),
            _ => {
                let entry = inner.entries.entry(msg.addr).or_default();
                Err(self.violation(msg.kind, msg.addr, entry))
            }
        }
    }

    /// Starts (or buffers) an `EX_REQ` / `SH_REQ` for a line.
    fn process_request(
        &self,
        inner: &mut DirectoryInner,
        requester: TileId,
        kind: MsgKind,
        addr: u64,
        modeled: bool,
    ) -> Result<(), Fault> {
        let entry = inner.entries.entry(addr).or_default();
        if entry.pending.is_some() {
            if entry.buffered.is_some() {
                return Err(self.violation(kind, addr, entry));
            }
            entry.buffered = Some(BufferedReq {
                requester,
                kind,
                modeled,
            });
            trace!(home = self.tile, requester, %kind, addr, "request buffered behind pending demand");
            return Ok(());
        }
        match kind {
            MsgKind::ExReq => self.start_exclusive(inner, requester, addr, modeled),
            MsgKind::ShReq => self.start_shared(inner, requester, addr, modeled),
            _ => unreachable!("process_request takes requests only"),
        }
    }

    fn start_exclusive(
        &self,
        inner: &mut DirectoryInner,
        requester: TileId,
        addr: u64,
        modeled: bool,
    ) -> Result<(), Fault> {
        let entry = inner.entries.entry(addr).or_default();
        match entry.state.clone() {
            DirState::Uncached => {
                let data = Self::mem_read(&inner.memory, addr, self.line_bytes);
                entry.state = DirState::Modified(requester);
                self.send_data(requester, MsgKind::ExRep, requester, addr, modeled, data);
                Ok(())
            }
            DirState::Shared(sharers) => {
                let upgrade = self.protocol.grants_upgrades() && sharers.contains(&requester);
                let targets: Vec<TileId> =
                    sharers.iter().copied().filter(|&t| t != requester).collect();
                if targets.is_empty() {
                    self.grant_exclusive(inner, requester, addr, modeled, upgrade);
                    return Ok(());
                }
                for target in &targets {
                    self.send(*target, MsgKind::InvReq, requester, addr, modeled);
                }
                entry.pending = Some(PendingOp::Invalidations {
                    requester,
                    remaining: targets.len() as u32,
                    upgrade,
                    modeled,
                });
                Ok(())
            }
            DirState::Modified(owner) => {
                if owner == requester {
                    return Err(self.violation(MsgKind::ExReq, addr, entry));
                }
                self.send(owner, MsgKind::FlushReq, requester, addr, modeled);
                entry.pending = Some(PendingOp::Flush {
                    requester,
                    remaining_invs: 0,
                    flush_done: false,
                    upgrade: false,
                    modeled,
                });
                Ok(())
            }
            DirState::Owned { owner, sharers } => {
                if owner == requester {
                    // The owner upgrades in place: invalidate the sharers,
                    // then grant without a payload.
                    let targets: Vec<TileId> =
                        sharers.iter().copied().filter(|&t| t != requester).collect();
                    if targets.is_empty() {
                        self.grant_exclusive(inner, requester, addr, modeled, true);
                        return Ok(());
                    }
                    for target in &targets {
                        self.send(*target, MsgKind::InvReq, requester, addr, modeled);
                    }
                    entry.pending = Some(PendingOp::Invalidations {
                        requester,
                        remaining: targets.len() as u32,
                        upgrade: true,
                        modeled,
                    });
                    return Ok(());
                }
                let upgrade = sharers.contains(&requester);
                self.send(owner, MsgKind::InvFlushCombinedReq, requester, addr, modeled);
                let inv_targets: Vec<TileId> = sharers
                    .iter()
                    .copied()
                    .filter(|&t| t != requester && t != owner)
                    .collect();
                for target in &inv_targets {
                    self.send(*target, MsgKind::InvReq, requester, addr, modeled);
                }
                entry.pending = Some(PendingOp::Flush {
                    requester,
                    remaining_invs: inv_targets.len() as u32,
                    flush_done: false,
                    upgrade,
                    modeled,
                });
                Ok(())
            }
        }
    }

    fn start_shared(
        &self,
        inner: &mut DirectoryInner,
        requester: TileId,
        addr: u64,
        modeled: bool,
    ) -> Result<(), Fault> {
        let entry = inner.entries.entry(addr).or_default();
        match entry.state.clone() {
            DirState::Uncached => {
                let data = Self::mem_read(&inner.memory, addr, self.line_bytes);
                entry.state = DirState::Shared(BTreeSet::from([requester]));
                self.send_data(requester, MsgKind::ShRep, requester, addr, modeled, data);
                Ok(())
            }
            DirState::Shared(mut sharers) => {
                let _ = sharers.insert(requester);
                entry.state = DirState::Shared(sharers);
                let data = Self::mem_read(&inner.memory, addr, self.line_bytes);
                self.send_data(requester, MsgKind::ShRep, requester, addr, modeled, data);
                Ok(())
            }
            DirState::Modified(owner) | DirState::Owned { owner, .. } => {
                if owner == requester {
                    return Err(self.violation(MsgKind::ShReq, addr, entry));
                }
                self.send(owner, MsgKind::WbReq, requester, addr, modeled);
                entry.pending = Some(PendingOp::WriteBack { requester, modeled });
                Ok(())
            }
        }
    }

    /// Exclusive grant once every conflicting copy is gone: `UPGRADE_REP`
    /// when the requester kept its bytes, `EX_REP` with data otherwise.
    fn grant_exclusive(
        &self,
        inner: &mut DirectoryInner,
        requester: TileId,
        addr: u64,
        modeled: bool,
        upgrade: bool,
    ) {
        let entry = inner.entries.entry(addr).or_default();
        entry.state = DirState::Modified(requester);
        entry.pending = None;
        if upgrade {
            self.send(requester, MsgKind::UpgradeRep, requester, addr, modeled);
        } else {
            let data = Self::mem_read(&inner.memory, addr, self.line_bytes);
            self.send_data(requester, MsgKind::ExRep, requester, addr, modeled, data);
        }
    }

    fn process_inv_rep(
        &self,
        inner: &mut DirectoryInner,
        sender: TileId,
        addr: u64,
    ) -> Result<(), Fault> {
        let entry = inner.entries.entry(addr).or_default();

        // Drop the sender from any sharer bookkeeping first; both demanded
        // acks and voluntary self-downgrades shed the copy.
        match &mut entry.state {
            DirState::Shared(sharers) => {
                let _ = sharers.remove(&sender);
                if sharers.is_empty() {
                    entry.state = DirState::Uncached;
                }
            }
            DirState::Owned { sharers, .. } => {
                let _ = sharers.remove(&sender);
            }
            DirState::Uncached | DirState::Modified(_) => {}
        }

        match entry.pending.clone() {
            Some(PendingOp::Invalidations {
                requester,
                remaining,
                upgrade,
                modeled,
            }) => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.grant_exclusive(inner, requester, addr, modeled, upgrade);
                    self.replay_buffered(inner, addr)
                } else {
                    entry.pending = Some(PendingOp::Invalidations {
                        requester,
                        remaining,
                        upgrade,
                        modeled,
                    });
                    Ok(())
                }
            }
            Some(PendingOp::Flush {
                requester,
                remaining_invs,
                flush_done,
                upgrade,
                modeled,
            }) => {
                let remaining_invs = remaining_invs.saturating_sub(1);
                if flush_done && remaining_invs == 0 {
                    self.grant_exclusive(inner, requester, addr, modeled, upgrade);
                    self.replay_buffered(inner, addr)
                } else {
                    entry.pending = Some(PendingOp::Flush {
                        requester,
                        remaining_invs,
                        flush_done,
                        upgrade,
                        modeled,
                    });
                    Ok(())
                }
            }
            // A voluntary self-downgrade with nothing pending.
            Some(PendingOp::WriteBack { .. }) | None => Ok(()),
        }
    }

    fn process_flush_rep(
        &self,
        inner: &mut DirectoryInner,
        sender: TileId,
        msg: &ShmemMsg,
    ) -> Result<(), Fault> {
        let addr = msg.addr;
        let _ = inner.memory.insert(addr, msg.data.clone());
        let entry = inner.entries.entry(addr).or_default();

        match entry.pending.clone() {
            Some(PendingOp::Flush {
                requester,
                remaining_invs,
                upgrade,
                modeled,
                ..
            }) => {
                if remaining_invs == 0 {
                    self.grant_exclusive(inner, requester, addr, modeled, upgrade);
                    self.replay_buffered(inner, addr)
                } else {
                    entry.pending = Some(PendingOp::Flush {
                        requester,
                        remaining_invs,
                        flush_done: true,
                        upgrade,
                        modeled,
                    });
                    Ok(())
                }
            }
            // The owner evicted while our write-back demand was in flight;
            // its flush carries the same bytes, so it satisfies the demand.
            Some(PendingOp::WriteBack { requester, modeled }) => {
                let mut sharers = match entry.state.clone() {
                    DirState::Owned { sharers, .. } => sharers,
                    DirState::Shared(sharers) => sharers,
                    _ => BTreeSet::new(),
                };
                let _ = sharers.remove(&sender);
                let _ = sharers.insert(requester);
                entry.state = DirState::Shared(sharers);
                entry.pending = None;
                let data = Self::mem_read(&inner.memory, addr, self.line_bytes);
                self.send_data(requester, MsgKind::ShRep, requester, addr, modeled, data);
                self.replay_buffered(inner, addr)
            }
            Some(PendingOp::Invalidations { .. }) => Err(self.violation(msg.kind, addr, entry)),
            // Voluntary eviction of a dirty line: the owner is gone and the
            // backing store is current again.
            None => {
                match entry.state.clone() {
                    DirState::Modified(owner) if owner == sender => {
                        entry.state = DirState::Uncached;
                    }
                    DirState::Owned { owner, mut sharers } if owner == sender => {
                        let _ = sharers.remove(&sender);
                        entry.state = if sharers.is_empty() {
                            DirState::Uncached
                        } else {
                            DirState::Shared(sharers)
                        };
                    }
                    _ => return Err(self.violation(msg.kind, addr, entry)),
                }
                Ok(())
            }
        }
    }

    fn process_wb_rep(
        &self,
        inner: &mut DirectoryInner,
        sender: TileId,
        msg: &ShmemMsg,
    ) -> Result<(), Fault> {
        let addr = msg.addr;
        let _ = inner.memory.insert(addr, msg.data.clone());
        let entry = inner.entries.entry(addr).or_default();

        match entry.pending.clone() {
            Some(PendingOp::WriteBack { requester, modeled }) => {
                let mut sharers = match entry.state.clone() {
                    DirState::Owned { sharers, .. } => sharers,
                    DirState::Shared(sharers) => sharers,
                    _ => BTreeSet::new(),
                };
                let _ = sharers.insert(sender);
                let _ = sharers.insert(requester);
                entry.state = if self.protocol.grants_upgrades() {
                    // MOSI: the previous owner keeps serving reads as a
                    // dirty sharer.
                    DirState::Owned {
                        owner: sender,
                        sharers,
                    }
                } else {
                    DirState::Shared(sharers)
                };
                entry.pending = None;
                let data = Self::mem_read(&inner.memory, addr, self.line_bytes);
                self.send_data(requester, MsgKind::ShRep, requester, addr, modeled, data);
                self.replay_buffered(inner, addr)
            }
            _ => Err(self.violation(msg.kind, addr, entry)),
        }
    }

    /// Replays the single buffered request once the pending demand
    /// completed.
    fn replay_buffered(&self, inner: &mut DirectoryInner, addr: u64) -> Result<(), Fault> {
        let buffered = inner.entries.entry(addr).or_default().buffered.take();
        match buffered {
            Some(req) => {
                trace!(home = self.tile, requester = req.requester, kind = %req.kind, addr, "replaying buffered request");
                self.process_request(inner, req.requester, req.kind, addr, req.modeled)
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for DirectoryCntlr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryCntlr")
            .field("tile", &self.tile)
            .field("protocol", &self.protocol.name())
            .finish_non_exhaustive()
    }
}
