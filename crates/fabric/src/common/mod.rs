//! Common types shared across the memory subsystem.
//!
//! This module provides the fundamental building blocks used by every
//! component of the simulator:
//! 1. **Identifiers:** tile, component, and L1-bank types.
//! 2. **Faults:** the fatal error taxonomy of the coherence path.

/// Fatal fault taxonomy.
pub mod error;

/// Tile, component, and access-kind identifiers.
pub mod types;

pub use error::Fault;
pub use types::{AccessKind, L1Bank, MemComponent, TileId};
