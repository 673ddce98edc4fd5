//! Address-to-home-tile lookup.
//!
//! Every line address has exactly one home tile whose directory serializes
//! its transitions. Lines are distributed block-cyclically: consecutive
//! lines land on consecutive tiles.

use crate::common::types::TileId;

/// Pure address → home-tile mapping.
#[derive(Clone, Copy, Debug)]
pub struct HomeLookup {
    num_tiles: usize,
    line_shift: u32,
}

impl HomeLookup {
    /// Builds the lookup for a fabric of `num_tiles` with `line_bytes`
    /// lines. `line_bytes` must be a power of two (validated by the
    /// configuration).
    pub fn new(num_tiles: usize, line_bytes: usize) -> Self {
        debug_assert!(line_bytes.is_power_of_two());
        Self {
            num_tiles,
            line_shift: line_bytes.trailing_zeros(),
        }
    }

    /// Home tile of `addr`.
    pub fn home(&self, addr: u64) -> TileId {
        ((addr >> self.line_shift) % self.num_tiles as u64) as TileId
    }
}
