//! Fatal fault taxonomy for the coherence engine.
//!
//! There are no recoverable errors inside the coherence path: any deviation
//! from the protocol state table is a simulator bug and aborts the run. This
//! module provides:
//! 1. **Protocol faults:** unexpected (state, message) pairs and replies that
//!    do not match the outstanding request slot.
//! 2. **Configuration faults:** rejected at construction, before any tile
//!    starts.
//! 3. **Lock-order faults:** the network entry point re-entered from the
//!    application context.

use thiserror::Error;

use crate::common::types::{MemComponent, TileId};
use crate::config::ConfigError;
use crate::mem::cache::CState;
use crate::mem::msg::{MsgKind, WireError};

/// A fatal simulator fault.
///
/// Every variant carries enough of the offending tuple to diagnose the run
/// post-mortem; none of them is recoverable.
#[derive(Debug, Error)]
pub enum Fault {
    /// A message arrived against a cache state the protocol does not pair it
    /// with.
    #[error(
        "protocol violation on tile {tile}: {kind} for address {addr:#x} \
         against {component} in state {state}"
    )]
    ProtocolViolation {
        /// Tile observing the violation.
        tile: TileId,
        /// Component whose state disagreed with the message.
        component: MemComponent,
        /// Offending message kind.
        kind: MsgKind,
        /// Local coherence state at the time of receipt.
        state: CState,
        /// Line address named by the message.
        addr: u64,
    },

    /// A message that disagrees with the outstanding-request slot: a reply
    /// for an address the slot is not awaiting, or a new request while the
    /// slot is occupied.
    #[error(
        "protocol violation on tile {tile}: {kind} for address {addr:#x} \
         conflicts with the outstanding-request slot ({outstanding:?})"
    )]
    StrayReply {
        /// Tile observing the conflict.
        tile: TileId,
        /// Message kind involved.
        kind: MsgKind,
        /// Address named by the message.
        addr: u64,
        /// Address the slot is awaiting, if any.
        outstanding: Option<u64>,
    },

    /// A message outside the per-line serialization discipline of a home
    /// directory.
    #[error(
        "protocol violation at directory {tile}: {kind} for address \
         {addr:#x} against {entry} entry"
    )]
    DirectoryViolation {
        /// Home tile observing the violation.
        tile: TileId,
        /// Offending message kind.
        kind: MsgKind,
        /// Line address involved.
        addr: u64,
        /// Directory entry state at the time of receipt.
        entry: &'static str,
    },

    /// The instruction bank was asked to hold a line in a dirty state.
    #[error(
        "protocol violation on tile {tile}: instruction bank asked to hold \
         {addr:#x} in state {state}"
    )]
    IcacheWritable {
        /// Tile observing the violation.
        tile: TileId,
        /// Line address involved.
        addr: u64,
        /// Dirty state that was requested.
        state: CState,
    },

    /// A message addressed to a component that does not take network
    /// traffic.
    #[error("misrouted message on tile {tile}: {kind} addressed to {receiver}")]
    Misrouted {
        /// Tile whose dispatcher saw the message.
        tile: TileId,
        /// Message kind received.
        kind: MsgKind,
        /// Component the message named.
        receiver: MemComponent,
    },

    /// The network entry point was invoked while the same thread was inside
    /// an application-context access. In a release build this would be a
    /// silent self-deadlock, so it is promoted to a fatal fault.
    #[error("lock order violation on tile {tile}: network entry from the application context")]
    LockOrder {
        /// Tile whose entry points were misused.
        tile: TileId,
    },

    /// Invalid configuration, rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A message that could not be decoded off the wire.
    #[error(transparent)]
    Wire(#[from] WireError),
}
