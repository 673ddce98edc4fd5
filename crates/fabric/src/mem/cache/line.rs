//! Per-line coherence metadata.
//!
//! Every cached line carries its tag, its coherence state, and (for L2
//! lines) the L1 bank that also holds it. The state alphabet covers both
//! protocol variants; MSI simply never produces `Owned` or `Exclusive`.

use std::fmt;

use crate::common::types::L1Bank;

/// Coherence state of a cached line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CState {
    /// Not present.
    #[default]
    Invalid,
    /// Clean, possibly held by other tiles.
    Shared,
    /// Dirty, but other tiles may hold read copies. Only the owner writes
    /// the line back.
    Owned,
    /// Clean and held by this tile alone.
    Exclusive,
    /// Dirty and held by this tile alone.
    Modified,
}

impl CState {
    /// Whether a load may be served from a line in this state.
    pub fn readable(self) -> bool {
        matches!(
            self,
            Self::Shared | Self::Owned | Self::Exclusive | Self::Modified
        )
    }

    /// Whether a store may be served from a line in this state.
    pub fn writable(self) -> bool {
        matches!(self, Self::Exclusive | Self::Modified)
    }

    /// Whether the line's data differs from the home node's copy.
    pub fn dirty(self) -> bool {
        matches!(self, Self::Owned | Self::Modified)
    }
}

impl fmt::Display for CState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Self::Invalid => 'I',
            Self::Shared => 'S',
            Self::Owned => 'O',
            Self::Exclusive => 'E',
            Self::Modified => 'M',
        };
        write!(f, "{c}")
    }
}

/// Metadata of one cache line.
///
/// `cached_loc` is only used by the L2: it records which L1 bank, if any,
/// also holds this line, so directory-initiated downgrades know which bank
/// lock to take. Invariant: `cached_loc` is `None` iff no L1 bank holds the
/// line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineInfo {
    /// Tag bits identifying the line within its set.
    pub tag: u64,
    /// Coherence state.
    pub state: CState,
    /// L1 bank also holding this line, if any.
    pub cached_loc: Option<L1Bank>,
}

impl LineInfo {
    /// Metadata for a freshly installed line not yet mirrored into an L1.
    pub fn new(tag: u64, state: CState) -> Self {
        Self {
            tag,
            state,
            cached_loc: None,
        }
    }

    /// Whether this entry holds a live line.
    pub fn valid(&self) -> bool {
        self.state != CState::Invalid
    }
}
