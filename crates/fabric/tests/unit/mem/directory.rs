//! Directory Controller Tests.
//!
//! The controller is driven directly: the test sends it L2-originated
//! messages and inspects what it demands and grants through a recording
//! sink. Tile ids 1..4 play the remote L2s; the directory itself is tile 0.

use std::collections::BTreeSet;
use std::sync::Arc;

use tilesim_core::config::CoherenceProtocol;
use tilesim_core::mem::directory::{DirState, DirectoryCntlr};
use tilesim_core::mem::msg::MsgKind;

use crate::common::harness::{l2_ctl, l2_data, small_config, LINE};
use crate::common::mocks::network::{MockSink, RecordingSink};

const A: u64 = 0x40;

fn directory(protocol: CoherenceProtocol) -> (DirectoryCntlr, Arc<RecordingSink>) {
    let config = small_config(protocol, 4);
    let sink = Arc::new(RecordingSink::new());
    (DirectoryCntlr::new(0, &config, sink.clone()), sink)
}

fn sharers(tiles: &[i32]) -> BTreeSet<i32> {
    tiles.iter().copied().collect()
}

// ══════════════════════════════════════════════════════════
// 1. Uncached grants
// ══════════════════════════════════════════════════════════

/// EX_REQ over an uncached line grants immediately with blank-store data.
#[test]
fn uncached_ex_req_grants_modified() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");

    let (dest, msg) = sink.try_next().expect("a grant was sent");
    assert_eq!(dest, 1);
    assert_eq!(msg.kind, MsgKind::ExRep);
    assert_eq!(msg.data, vec![0; LINE]);
    assert_eq!(dir.line_snapshot(A), DirState::Modified(1));
}

/// SH_REQ over an uncached line grants a zeroed shared copy (mockall
/// expectation variant: exactly one SH_REP, nothing else).
#[test]
fn uncached_sh_req_grants_shared() {
    let config = small_config(CoherenceProtocol::Msi, 4);
    let mut mock = MockSink::new();
    mock.expect_send_msg()
        .withf(|&dest, msg| {
            dest == 2 && msg.kind == MsgKind::ShRep && msg.data.iter().all(|&b| b == 0)
        })
        .times(1)
        .return_const(());
    let dir = DirectoryCntlr::new(0, &config, Arc::new(mock));

    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A))
        .expect("sh req");
    assert_eq!(dir.line_snapshot(A), DirState::Shared(sharers(&[2])));
}

// ══════════════════════════════════════════════════════════
// 2. Shared lines
// ══════════════════════════════════════════════════════════

/// Additional readers join the sharer set with no remote traffic.
#[test]
fn sh_req_joins_sharers() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    for tile in [1, 2, 3] {
        dir.handle_msg_from_l2(tile, &l2_ctl(MsgKind::ShReq, tile, A))
            .expect("sh req");
        assert_eq!(sink.try_next().expect("grant").1.kind, MsgKind::ShRep);
    }
    assert_eq!(dir.line_snapshot(A), DirState::Shared(sharers(&[1, 2, 3])));
    assert_eq!(sink.pending(), 0);
}

/// EX_REQ over a shared line invalidates every other sharer, collects the
/// acks, then grants.
#[test]
fn ex_over_shared_collects_invalidations() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    for tile in [1, 2] {
        dir.handle_msg_from_l2(tile, &l2_ctl(MsgKind::ShReq, tile, A))
            .expect("sh req");
        let _ = sink.try_next();
    }

    dir.handle_msg_from_l2(3, &l2_ctl(MsgKind::ExReq, 3, A))
        .expect("ex req");
    let mut demanded = BTreeSet::new();
    for _ in 0..2 {
        let (dest, msg) = sink.try_next().expect("invalidation demand");
        assert_eq!(msg.kind, MsgKind::InvReq);
        assert_eq!(msg.requester, 3);
        let _ = demanded.insert(dest);
    }
    assert_eq!(demanded, sharers(&[1, 2]));
    // No grant until both acks are in.
    assert_eq!(sink.pending(), 0);

    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::InvRep, 3, A))
        .expect("first ack");
    assert_eq!(sink.pending(), 0);
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::InvRep, 3, A))
        .expect("second ack");

    let (dest, msg) = sink.try_next().expect("grant");
    assert_eq!((dest, msg.kind), (3, MsgKind::ExRep));
    assert_eq!(dir.line_snapshot(A), DirState::Modified(3));
}

// ══════════════════════════════════════════════════════════
// 3. Modified lines
// ══════════════════════════════════════════════════════════

/// SH_REQ over a modified line demands a write-back, then serves the
/// reader with the written-back bytes.
#[test]
fn sh_over_modified_writes_back() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();

    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A))
        .expect("sh req");
    let (dest, msg) = sink.try_next().expect("write-back demand");
    assert_eq!((dest, msg.kind), (1, MsgKind::WbReq));
    assert_eq!(msg.requester, 2);

    let dirty = vec![0xD7; LINE];
    dir.handle_msg_from_l2(1, &l2_data(MsgKind::WbRep, 2, A, dirty.clone()))
        .expect("write-back");
    let (dest, msg) = sink.try_next().expect("grant");
    assert_eq!((dest, msg.kind), (2, MsgKind::ShRep));
    assert_eq!(msg.data, dirty);
    assert_eq!(dir.line_snapshot(A), DirState::Shared(sharers(&[1, 2])));
    assert_eq!(dir.backing_line(A), dirty);
}

/// EX_REQ over a modified line demands a flush and forwards the bytes to
/// the new owner.
#[test]
fn ex_over_modified_flushes_old_owner() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();

    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ExReq, 2, A))
        .expect("second ex req");
    let (dest, msg) = sink.try_next().expect("flush demand");
    assert_eq!((dest, msg.kind), (1, MsgKind::FlushReq));

    let dirty = vec![0xC4; LINE];
    dir.handle_msg_from_l2(1, &l2_data(MsgKind::FlushRep, 2, A, dirty.clone()))
        .expect("flush");
    let (dest, msg) = sink.try_next().expect("grant");
    assert_eq!((dest, msg.kind), (2, MsgKind::ExRep));
    assert_eq!(msg.data, dirty);
    assert_eq!(dir.line_snapshot(A), DirState::Modified(2));
}

// ══════════════════════════════════════════════════════════
// 4. Buffered requests
// ══════════════════════════════════════════════════════════

/// A request landing behind a pending demand is buffered and replayed
/// when the demand completes.
#[test]
fn conflicting_request_is_buffered_and_replayed() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();

    // Reader demands a write-back from tile 1...
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A))
        .expect("sh req");
    let _ = sink.try_next();
    // ...and a third tile's EX_REQ arrives meanwhile: buffered, quiet.
    dir.handle_msg_from_l2(3, &l2_ctl(MsgKind::ExReq, 3, A))
        .expect("buffered ex req");
    assert_eq!(sink.pending(), 0);

    dir.handle_msg_from_l2(1, &l2_data(MsgKind::WbRep, 2, A, vec![1; LINE]))
        .expect("write-back");
    // SH_REP to tile 2, then the replayed EX_REQ invalidates {1, 2}.
    assert_eq!(sink.try_next().expect("grant").1.kind, MsgKind::ShRep);
    let mut demanded = BTreeSet::new();
    for _ in 0..2 {
        let (dest, msg) = sink.try_next().expect("invalidation demand");
        assert_eq!(msg.kind, MsgKind::InvReq);
        let _ = demanded.insert(dest);
    }
    assert_eq!(demanded, sharers(&[1, 2]));

    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::InvRep, 3, A))
        .expect("ack");
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::InvRep, 3, A))
        .expect("ack");
    assert_eq!(sink.try_next().expect("grant").1.kind, MsgKind::ExRep);
    assert_eq!(dir.line_snapshot(A), DirState::Modified(3));
}

/// The buffer holds exactly one request; a third conflicting request is a
/// protocol violation.
#[test]
fn second_buffered_request_is_a_violation() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A))
        .expect("sh req");
    let _ = sink.try_next();
    dir.handle_msg_from_l2(3, &l2_ctl(MsgKind::ExReq, 3, A))
        .expect("buffered");

    let result = dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A));
    assert!(result.is_err(), "third conflicting request must fault");
}

// ══════════════════════════════════════════════════════════
// 5. Unsolicited traffic
// ══════════════════════════════════════════════════════════

/// A voluntary self-downgrade sheds the sharer; the last one empties the
/// line back to uncached.
#[test]
fn voluntary_inv_rep_sheds_sharer() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    for tile in [1, 2] {
        dir.handle_msg_from_l2(tile, &l2_ctl(MsgKind::ShReq, tile, A))
            .expect("sh req");
        let _ = sink.try_next();
    }

    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::InvRep, 1, A))
        .expect("self-downgrade");
    assert_eq!(dir.line_snapshot(A), DirState::Shared(sharers(&[2])));
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::InvRep, 2, A))
        .expect("self-downgrade");
    assert_eq!(dir.line_snapshot(A), DirState::Uncached);
    assert_eq!(sink.pending(), 0);
}

/// A capacity eviction of a modified line returns the bytes to the
/// backing store and uncaches the line.
#[test]
fn voluntary_flush_rep_returns_to_uncached() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();

    let dirty = vec![0x5A; LINE];
    dir.handle_msg_from_l2(1, &l2_data(MsgKind::FlushRep, 1, A, dirty.clone()))
        .expect("eviction flush");
    assert_eq!(dir.line_snapshot(A), DirState::Uncached);
    assert_eq!(dir.backing_line(A), dirty);
}

/// WB_REP is never unsolicited.
#[test]
fn unsolicited_wb_rep_is_a_violation() {
    let (dir, _sink) = directory(CoherenceProtocol::Msi);
    let result = dir.handle_msg_from_l2(1, &l2_data(MsgKind::WbRep, 1, A, vec![0; LINE]));
    assert!(result.is_err());
}

/// The owner evicting while a write-back demand is in flight satisfies
/// the demand with its flush.
#[test]
fn eviction_flush_satisfies_pending_writeback() {
    let (dir, sink) = directory(CoherenceProtocol::Msi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A))
        .expect("sh req");
    let _ = sink.try_next(); // WB_REQ to tile 1

    let dirty = vec![0xE1; LINE];
    dir.handle_msg_from_l2(1, &l2_data(MsgKind::FlushRep, 1, A, dirty.clone()))
        .expect("eviction races the demand");
    let (dest, msg) = sink.try_next().expect("grant");
    assert_eq!((dest, msg.kind), (2, MsgKind::ShRep));
    assert_eq!(msg.data, dirty);
    assert_eq!(dir.line_snapshot(A), DirState::Shared(sharers(&[2])));
}

// ══════════════════════════════════════════════════════════
// 6. MOSI
// ══════════════════════════════════════════════════════════

/// SH_REQ over a modified line leaves the dirty owner serving reads.
#[test]
fn mosi_sh_over_modified_keeps_owner() {
    let (dir, sink) = directory(CoherenceProtocol::Mosi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A))
        .expect("sh req");
    let _ = sink.try_next(); // WB_REQ

    dir.handle_msg_from_l2(1, &l2_data(MsgKind::WbRep, 2, A, vec![9; LINE]))
        .expect("write-back");
    let _ = sink.try_next(); // SH_REP
    assert_eq!(
        dir.line_snapshot(A),
        DirState::Owned {
            owner: 1,
            sharers: sharers(&[1, 2])
        }
    );
}

/// EX_REQ from a sharer of an owned line: the owner gets the combined
/// flush+invalidate, and the requester is granted a payload-free upgrade.
#[test]
fn mosi_ex_from_sharer_grants_upgrade() {
    let (dir, sink) = directory(CoherenceProtocol::Mosi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A))
        .expect("sh req");
    let _ = sink.try_next();
    dir.handle_msg_from_l2(1, &l2_data(MsgKind::WbRep, 2, A, vec![9; LINE]))
        .expect("write-back");
    let _ = sink.try_next();

    // Owned{1, {1,2}}: tile 2 wants to write.
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ExReq, 2, A))
        .expect("ex req");
    let (dest, msg) = sink.try_next().expect("combined demand");
    assert_eq!((dest, msg.kind), (1, MsgKind::InvFlushCombinedReq));
    assert_eq!(sink.pending(), 0, "no grant before the flush");

    dir.handle_msg_from_l2(1, &l2_data(MsgKind::FlushRep, 2, A, vec![9; LINE]))
        .expect("flush");
    let (dest, msg) = sink.try_next().expect("grant");
    assert_eq!((dest, msg.kind), (2, MsgKind::UpgradeRep));
    assert!(msg.data.is_empty(), "upgrades carry no payload");
    assert_eq!(dir.line_snapshot(A), DirState::Modified(2));
}

/// The owner of an owned line upgrading in place invalidates the sharers
/// and is granted without a payload.
#[test]
fn mosi_owner_upgrades_in_place() {
    let (dir, sink) = directory(CoherenceProtocol::Mosi);
    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("ex req");
    let _ = sink.try_next();
    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::ShReq, 2, A))
        .expect("sh req");
    let _ = sink.try_next();
    dir.handle_msg_from_l2(1, &l2_data(MsgKind::WbRep, 2, A, vec![9; LINE]))
        .expect("write-back");
    let _ = sink.try_next();

    dir.handle_msg_from_l2(1, &l2_ctl(MsgKind::ExReq, 1, A))
        .expect("owner upgrade");
    let (dest, msg) = sink.try_next().expect("invalidation demand");
    assert_eq!((dest, msg.kind), (2, MsgKind::InvReq));

    dir.handle_msg_from_l2(2, &l2_ctl(MsgKind::InvRep, 1, A))
        .expect("ack");
    let (dest, msg) = sink.try_next().expect("grant");
    assert_eq!((dest, msg.kind), (1, MsgKind::UpgradeRep));
    assert_eq!(dir.line_snapshot(A), DirState::Modified(1));
}
