//! Coherence protocol variants.
//!
//! MSI and MOSI share almost every transition; the differences sit behind
//! the [`Protocol`] trait so the L2 controller and the directory are written
//! once. The `Owned` state, the payload-free `UPGRADE_REP` grant, and the
//! combined flush-and-invalidate request are the only MOSI additions.

use crate::config::CoherenceProtocol;
use crate::mem::cache::CState;
use crate::mem::msg::MsgKind;

/// Variant-specific protocol decisions.
pub trait Protocol: Send + Sync {
    /// Variant name for logs and reports.
    fn name(&self) -> &'static str;

    /// Whether an exclusive request from the L1 over a read copy surrenders
    /// the line up front (invalidate plus INV_REP before forwarding). MSI
    /// does; MOSI keeps the copy and expects a payload-free upgrade grant.
    fn eager_upgrade_surrender(&self) -> bool;

    /// Local L2 states an exclusive request may be issued over.
    fn may_request_exclusive_over(&self, state: CState) -> bool;

    /// States a flush or write-back demand may be served from.
    fn may_surrender(&self, state: CState) -> bool;

    /// State an L2 line settles in after serving a write-back demand.
    fn after_writeback(&self) -> CState;

    /// Whether the directory grants payload-free upgrades to a requester
    /// that still shares the line.
    fn grants_upgrades(&self) -> bool;

    /// Whether the L2's directory-facing entry point understands `kind`.
    fn accepts_from_directory(&self, kind: MsgKind) -> bool;
}

/// Modified / Shared / Invalid.
#[derive(Debug)]
pub struct Msi;

impl Protocol for Msi {
    fn name(&self) -> &'static str {
        "MSI"
    }

    fn eager_upgrade_surrender(&self) -> bool {
        true
    }

    fn may_request_exclusive_over(&self, state: CState) -> bool {
        matches!(state, CState::Invalid | CState::Shared)
    }

    fn may_surrender(&self, state: CState) -> bool {
        state == CState::Modified
    }

    fn after_writeback(&self) -> CState {
        CState::Shared
    }

    fn grants_upgrades(&self) -> bool {
        false
    }

    fn accepts_from_directory(&self, kind: MsgKind) -> bool {
        matches!(
            kind,
            MsgKind::ExRep
                | MsgKind::ShRep
                | MsgKind::InvReq
                | MsgKind::FlushReq
                | MsgKind::WbReq
        )
    }
}

/// MSI plus the Owned state.
#[derive(Debug)]
pub struct Mosi;

impl Protocol for Mosi {
    fn name(&self) -> &'static str {
        "MOSI"
    }

    fn eager_upgrade_surrender(&self) -> bool {
        false
    }

    fn may_request_exclusive_over(&self, state: CState) -> bool {
        matches!(state, CState::Invalid | CState::Shared | CState::Owned)
    }

    fn may_surrender(&self, state: CState) -> bool {
        matches!(state, CState::Modified | CState::Owned)
    }

    fn after_writeback(&self) -> CState {
        CState::Owned
    }

    fn grants_upgrades(&self) -> bool {
        true
    }

    fn accepts_from_directory(&self, kind: MsgKind) -> bool {
        matches!(
            kind,
            MsgKind::ExRep
                | MsgKind::ShRep
                | MsgKind::InvReq
                | MsgKind::FlushReq
                | MsgKind::WbReq
                | MsgKind::UpgradeRep
                | MsgKind::InvFlushCombinedReq
        )
    }
}

static MSI: Msi = Msi;
static MOSI: Mosi = Mosi;

/// The dispatch object for a configured variant.
pub fn dispatch(kind: CoherenceProtocol) -> &'static dyn Protocol {
    match kind {
        CoherenceProtocol::Msi => &MSI,
        CoherenceProtocol::Mosi => &MOSI,
    }
}
