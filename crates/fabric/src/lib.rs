//! Many-core tile-fabric simulator library.
//!
//! This crate implements the memory subsystem of a many-core architectural
//! simulator: private split L1s and a private L2 per tile, kept coherent by
//! home-node directories over a simulated network, running either the MSI
//! or the MOSI protocol. It provides:
//! 1. **Caches:** set-associative arrays with replacement policies and
//!    miss-type tracking.
//! 2. **Controllers:** the two-sided L2 state machine, the L1 banks, and
//!    the directory with its pending/buffered demand slots.
//! 3. **Concurrency:** the application/network context split, per-bank and
//!    per-L2 locking in a fixed order, and the reply-install rendezvous.
//! 4. **Fabric:** an in-process loopback network with per-tile FIFO
//!    delivery, plus statistics and a text report.

/// Common types and the fatal fault taxonomy.
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config).
pub mod config;
/// The memory subsystem: caches, controllers, directory, network.
pub mod mem;
/// Statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from
/// JSON.
pub use crate::config::Config;
/// Fatal fault type of the coherence path.
pub use crate::common::error::Fault;
/// Per-tile memory subsystem; the main entry point.
pub use crate::mem::manager::MemoryManager;
/// In-process network connecting the tiles.
pub use crate::mem::network::LoopbackFabric;
