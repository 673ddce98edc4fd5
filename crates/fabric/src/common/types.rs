//! Tile and memory-component identifiers.
//!
//! This module defines the small identifier types shared across the memory
//! subsystem. It provides:
//! 1. **Tile identity:** `TileId` for naming nodes in the simulated fabric.
//! 2. **Component identity:** `MemComponent` for message routing between the
//!    caches and the directory.
//! 3. **L1 banks:** `L1Bank` for the split instruction/data caches.

use std::fmt;

/// Identifier of one tile in the simulated fabric.
///
/// Tiles own private L1/L2 caches and serve as directory home for a subset
/// of addresses.
pub type TileId = i32;

/// One of the memory-subsystem components participating in the protocol.
///
/// Messages carry a sender and receiver component so a tile's dispatcher can
/// route them without inspecting the message kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MemComponent {
    /// The core-facing side (issues loads and stores).
    Core = 0,
    /// L1 instruction cache bank.
    L1Icache = 1,
    /// L1 data cache bank.
    L1Dcache = 2,
    /// Private unified L2 cache.
    L2Cache = 3,
    /// The home-node directory.
    DramDirectory = 4,
}

impl MemComponent {
    /// Decodes a component from its wire byte.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Core),
            1 => Some(Self::L1Icache),
            2 => Some(Self::L1Dcache),
            3 => Some(Self::L2Cache),
            4 => Some(Self::DramDirectory),
            _ => None,
        }
    }
}

impl fmt::Display for MemComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Core => "core",
            Self::L1Icache => "l1-i",
            Self::L1Dcache => "l1-d",
            Self::L2Cache => "l2",
            Self::DramDirectory => "directory",
        };
        write!(f, "{name}")
    }
}

/// One of the two split L1 banks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum L1Bank {
    /// Instruction cache. Never holds writable lines.
    Icache,
    /// Data cache.
    Dcache,
}

impl L1Bank {
    /// The message component corresponding to this bank.
    pub fn component(self) -> MemComponent {
        match self {
            Self::Icache => MemComponent::L1Icache,
            Self::Dcache => MemComponent::L1Dcache,
        }
    }

    /// The bank a message component names, if it names one.
    pub fn from_component(component: MemComponent) -> Option<Self> {
        match component {
            MemComponent::L1Icache => Some(Self::Icache),
            MemComponent::L1Dcache => Some(Self::Dcache),
            _ => None,
        }
    }
}

impl fmt::Display for L1Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icache => write!(f, "l1-i"),
            Self::Dcache => write!(f, "l1-d"),
        }
    }
}

/// Kind of memory operation presented by the application context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    /// Read access (instruction fetch or data load).
    Load,
    /// Write access.
    Store,
}
