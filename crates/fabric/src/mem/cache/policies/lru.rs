//! Least Recently Used replacement.
//!
//! Maintains one usage stack per set; the front is the most recently used
//! way, the back is the victim. `touch` is O(ways), `victim` is O(1).

use super::ReplacementPolicy;

/// LRU policy state: one usage stack per set.
pub struct LruPolicy {
    stacks: Vec<Vec<usize>>,
}

impl LruPolicy {
    /// Builds the policy for a `sets` x `ways` cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            stacks: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }
}

impl ReplacementPolicy for LruPolicy {
    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.stacks[set];
        if let Some(pos) = stack.iter().position(|&w| w == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }

    fn victim(&mut self, set: usize) -> usize {
        *self.stacks[set].last().expect("nonzero associativity")
    }
}
