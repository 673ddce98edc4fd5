//! First-In, First-Out replacement.
//!
//! Round-robin over the ways of each set. The pointer only advances when
//! the way it designates is filled, preserving insertion order.

use super::ReplacementPolicy;

/// FIFO policy state: the next eviction pointer per set.
pub struct FifoPolicy {
    next: Vec<usize>,
    ways: usize,
}

impl FifoPolicy {
    /// Builds the policy for a `sets` x `ways` cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            next: vec![0; sets],
            ways,
        }
    }
}

impl ReplacementPolicy for FifoPolicy {
    fn touch(&mut self, set: usize, way: usize) {
        if self.next[set] == way {
            self.next[set] = (way + 1) % self.ways;
        }
    }

    fn victim(&mut self, set: usize) -> usize {
        self.next[set]
    }
}
