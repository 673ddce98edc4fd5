//! Message sink capability and the in-process loopback fabric.
//!
//! The coherence engine only needs `send_msg(dest, msg)`: fire-and-forget,
//! FIFO per (source, destination) pair. [`LoopbackFabric`] provides that
//! contract in-process: one queue per tile, one dispatcher thread per tile
//! draining it into the tile's network entry point. Messages cross the
//! fabric in their wire encoding, so the codec is exercised on every hop.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::error;

use crate::common::types::TileId;
use crate::mem::manager::MemoryManager;
use crate::mem::msg::ShmemMsg;
use crate::stats::MsgCounters;

/// Fire-and-forget message sink toward one tile's view of the network.
///
/// Ordering between distinct destinations is unconstrained; for a single
/// (source, destination) pair delivery is FIFO.
pub trait MsgSink: Send + Sync {
    /// Queues `msg` for delivery to `dest`.
    fn send_msg(&self, dest: TileId, msg: ShmemMsg);
}

type Packet = (TileId, Vec<u8>);

/// In-process network: per-tile FIFO queues plus a dispatcher thread per
/// tile.
pub struct LoopbackFabric {
    senders: Vec<Mutex<Option<Sender<Packet>>>>,
    receivers: Vec<Mutex<Option<Receiver<Packet>>>>,
    counters: MsgCounters,
    dispatchers: Mutex<Vec<JoinHandle<()>>>,
}

impl LoopbackFabric {
    /// Builds the queues for `num_tiles` tiles. Dispatchers start later,
    /// once the tiles exist.
    pub fn new(num_tiles: usize) -> Arc<Self> {
        let mut senders = Vec::with_capacity(num_tiles);
        let mut receivers = Vec::with_capacity(num_tiles);
        for _ in 0..num_tiles {
            let (tx, rx) = mpsc::channel();
            senders.push(Mutex::new(Some(tx)));
            receivers.push(Mutex::new(Some(rx)));
        }
        Arc::new(Self {
            senders,
            receivers,
            counters: MsgCounters::new(),
            dispatchers: Mutex::new(Vec::new()),
        })
    }

    /// A sink bound to `tile` as the message source.
    pub fn port(self: &Arc<Self>, tile: TileId) -> Arc<TilePort> {
        Arc::new(TilePort {
            fabric: Arc::clone(self),
            tile,
        })
    }

    /// Message counts by kind, fabric-wide.
    pub fn counters(&self) -> &MsgCounters {
        &self.counters
    }

    fn enqueue(&self, src: TileId, dest: TileId, msg: &ShmemMsg) {
        self.counters.record(msg.kind);
        let slot = self.senders[dest as usize].lock().expect("fabric sender");
        if let Some(tx) = slot.as_ref() {
            // A closed queue means the fabric is shutting down; late
            // traffic is dropped.
            let _ = tx.send((src, msg.encode()));
        }
    }

    /// Spawns one dispatcher thread per tile, draining its queue into the
    /// tile's network entry point. A fault on the coherence path is fatal
    /// and aborts the run.
    ///
    /// # Panics
    ///
    /// Panics if called twice for the same tile.
    pub fn start(&self, tiles: &[Arc<MemoryManager>]) {
        let mut dispatchers = self.dispatchers.lock().expect("fabric dispatchers");
        for manager in tiles {
            let tile = manager.tile();
            let rx = self.receivers[tile as usize]
                .lock()
                .expect("fabric receiver")
                .take()
                .expect("dispatcher already started");
            let manager = Arc::clone(manager);
            dispatchers.push(std::thread::spawn(move || {
                for (src, raw) in rx {
                    let msg = match ShmemMsg::decode(&raw) {
                        Ok(msg) => msg,
                        Err(err) => {
                            error!(tile, %err, "undecodable message");
                            panic!("fatal wire fault on tile {tile}: {err}");
                        }
                    };
                    if let Err(fault) = manager.handle_msg_from_network(src, msg) {
                        error!(tile, %fault, "coherence fault");
                        panic!("fatal coherence fault on tile {tile}: {fault}");
                    }
                }
            }));
        }
    }

    /// Closes every queue and joins the dispatcher threads.
    pub fn shutdown(&self) {
        for slot in &self.senders {
            let _ = slot.lock().expect("fabric sender").take();
        }
        let handles: Vec<_> = self
            .dispatchers
            .lock()
            .expect("fabric dispatchers")
            .drain(..)
            .collect();
        for handle in handles {
            handle.join().expect("dispatcher thread");
        }
    }
}

impl std::fmt::Debug for LoopbackFabric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackFabric")
            .field("tiles", &self.senders.len())
            .finish_non_exhaustive()
    }
}

/// A [`MsgSink`] bound to one source tile of a [`LoopbackFabric`].
pub struct TilePort {
    fabric: Arc<LoopbackFabric>,
    tile: TileId,
}

impl MsgSink for TilePort {
    fn send_msg(&self, dest: TileId, msg: ShmemMsg) {
        self.fabric.enqueue(self.tile, dest, &msg);
    }
}

impl std::fmt::Debug for TilePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TilePort").field("tile", &self.tile).finish()
    }
}
