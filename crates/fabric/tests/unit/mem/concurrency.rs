//! Concurrency Tests.
//!
//! The two execution contexts share the cache metadata under the fixed
//! lock order; these tests exercise the interleavings that would deadlock
//! or corrupt state if that order were wrong. Every cross-thread wait goes
//! through `join_within`, so a deadlock fails the test instead of hanging
//! the suite.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tilesim_core::common::error::Fault;
use tilesim_core::common::types::{L1Bank, TileId};
use tilesim_core::config::CoherenceProtocol;
use tilesim_core::mem::cache::CState;
use tilesim_core::mem::msg::{MsgKind, ShmemMsg};
use tilesim_core::mem::network::MsgSink;
use tilesim_core::MemoryManager;

use crate::common::harness::{
    dir_ctl, dir_data, join_within, small_config, DirectedTile, TestFabric, LINE, PATIENCE,
};

// ══════════════════════════════════════════════════════════
// 1. Directory demand while the application is parked
// ══════════════════════════════════════════════════════════

/// While the application context is parked on a miss for line A, the
/// directory demands an invalidation of a *different* line whose
/// `cached_loc` is L1-D. The network context must take the bank lock and
/// complete. This is the scenario that deadlocks if the L2 lock were held
/// across the bank acquisition.
#[test]
fn demand_for_other_line_while_parked() {
    let tile = DirectedTile::new(CoherenceProtocol::Msi);
    const A: u64 = 0x40;
    const B: u64 = 0x60; // different line, also mirrored in L1-D
    tile.warm_shared(B, vec![3; LINE]);

    let app = tile.spawn_store(A, vec![1]);
    let _ = tile.expect(MsgKind::ExReq);

    // Application parked, holding no locks; the demand must go through.
    tile.inject(dir_ctl(MsgKind::InvReq, 2, B)).expect("demand");
    let (_, ack) = tile.expect(MsgKind::InvRep);
    assert_eq!(ack.addr, B);
    assert_eq!(tile.mm.l1_line_state(L1Bank::Dcache, B), CState::Invalid);

    tile.inject(dir_data(MsgKind::ExRep, 0, A, vec![0; LINE]))
        .expect("grant");
    join_within(app, PATIENCE);
    assert_eq!(tile.mm.l2_line_state(A), CState::Modified);
}

// ══════════════════════════════════════════════════════════
// 2. Lock-order violation detection
// ══════════════════════════════════════════════════════════

/// A sink that re-enters the tile's network entry point from inside the
/// send, i.e. a network that delivers synchronously on the sender's
/// thread. That thread is mid-application-access and holds the bank lock,
/// which the entry point must refuse as a lock-order violation rather than
/// deadlock.
#[derive(Default)]
struct ReentrantSink {
    mm: OnceLock<Arc<MemoryManager>>,
    observed: Mutex<Option<Fault>>,
}

impl MsgSink for ReentrantSink {
    fn send_msg(&self, _dest: TileId, msg: ShmemMsg) {
        if let Some(mm) = self.mm.get() {
            if let Err(fault) = mm.handle_msg_from_network(0, msg) {
                *self.observed.lock().unwrap() = Some(fault);
            }
        }
    }
}

#[test]
fn reentrant_delivery_is_a_lock_order_fault() {
    let config = small_config(CoherenceProtocol::Msi, 1);
    let sink = Arc::new(ReentrantSink::default());
    let mm = MemoryManager::new(0, &config, sink.clone()).expect("tile");
    sink.mm.set(Arc::clone(&mm)).expect("first wiring");

    // The store's EX_REQ is delivered back synchronously; the application
    // thread then parks forever, so it is deliberately left unjoined.
    let worker = Arc::clone(&mm);
    let _parked = std::thread::spawn(move || {
        let _ = worker.store(0x40, &[1], true);
    });

    let deadline = Instant::now() + PATIENCE;
    loop {
        if let Some(fault) = sink.observed.lock().unwrap().take() {
            assert!(matches!(fault, Fault::LockOrder { tile: 0 }));
            break;
        }
        assert!(Instant::now() < deadline, "fault never observed");
        std::thread::sleep(Duration::from_millis(1));
    }
}

// ══════════════════════════════════════════════════════════
// 3. False-sharing ping-pong over the real fabric
// ══════════════════════════════════════════════════════════

/// Two tiles hammer disjoint words of the same line. The line migrates on
/// every write, the directory interleaves demands with in-flight requests,
/// and at the end both counters must hold exactly their own tile's count;
/// a lost line update or a deadlock fails the watchdog.
#[test]
fn false_sharing_pingpong_loses_nothing() {
    for protocol in [CoherenceProtocol::Msi, CoherenceProtocol::Mosi] {
        let fabric = TestFabric::new(protocol, 2);
        let shared: u64 = 0; // home: tile 0
        const ROUNDS: u64 = 64;

        let workers: Vec<_> = [0usize, 1]
            .into_iter()
            .map(|t| {
                let mm = Arc::clone(fabric.tile(t));
                std::thread::spawn(move || {
                    let word = shared + 8 * t as u64;
                    for _ in 0..ROUNDS {
                        let raw = mm.load(word, 8, true).expect("load");
                        let seen = u64::from_le_bytes(raw.try_into().expect("8 bytes"));
                        mm.store(word, &(seen + 1).to_le_bytes(), true)
                            .expect("store");
                    }
                })
            })
            .collect();
        for worker in workers {
            join_within(worker, Duration::from_secs(30));
        }

        // Read both words from tile 0; coherence must surface tile 1's
        // final count too.
        let mm = fabric.tile(0);
        for t in [0u64, 1] {
            let raw = mm.load(shared + 8 * t, 8, true).expect("final load");
            let count = u64::from_le_bytes(raw.try_into().expect("8 bytes"));
            assert_eq!(count, ROUNDS, "tile {t} counter survived ({protocol:?})");
        }
        fabric.shutdown();
    }
}

// ══════════════════════════════════════════════════════════
// 4. Wake-up order matches install order
// ══════════════════════════════════════════════════════════

/// Back-to-back misses from one application thread: each must be woken by
/// exactly its own grant, in order, even with eviction traffic mixed in.
#[test]
fn sequential_misses_wake_in_order() {
    let tile = DirectedTile::new(CoherenceProtocol::Msi);
    for k in 0..8u64 {
        let addr = 0x1000 + k * LINE as u64;
        let app = tile.spawn_load(addr, 8);
        loop {
            let (_, msg) = tile.sink.next_within(PATIENCE).expect("request");
            match msg.kind {
                MsgKind::ShReq => {
                    assert_eq!(msg.addr, addr, "request for the current miss");
                    break;
                }
                // Capacity evictions announce themselves in between.
                MsgKind::InvRep => {}
                other => panic!("unexpected {other}"),
            }
        }
        tile.inject(dir_data(MsgKind::ShRep, 0, addr, vec![k as u8; LINE]))
            .expect("install");
        let loaded = join_within(app, PATIENCE);
        assert_eq!(loaded, vec![k as u8; 8]);
    }
}
