//! Cache replacement policies.
//!
//! Victim selection for set-associative caches. Each policy tracks per-set
//! usage and answers two questions: which way to evict, and how an access
//! reshuffles the bookkeeping.

/// First-In, First-Out replacement.
pub mod fifo;

/// Least Recently Used replacement.
pub mod lru;

/// Most Recently Used replacement.
pub mod mru;

/// Pseudo-LRU (tree-bit) replacement.
pub mod plru;

/// Pseudo-random replacement.
pub mod random;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use mru::MruPolicy;
pub use plru::PlruPolicy;
pub use random::RandomPolicy;

use crate::config::ReplacementPolicy as PolicyKind;

/// Victim selection and usage bookkeeping for one cache.
pub trait ReplacementPolicy: Send {
    /// Records an access to `way` of `set`.
    fn touch(&mut self, set: usize, way: usize);

    /// Picks the way of `set` to evict next.
    fn victim(&mut self, set: usize) -> usize;
}

/// Builds the policy named by the configuration.
pub fn build(kind: PolicyKind, sets: usize, ways: usize) -> Box<dyn ReplacementPolicy> {
    match kind {
        PolicyKind::Lru => Box::new(LruPolicy::new(sets, ways)),
        PolicyKind::Plru => Box::new(PlruPolicy::new(sets, ways)),
        PolicyKind::Fifo => Box::new(FifoPolicy::new(sets, ways)),
        PolicyKind::Random => Box::new(RandomPolicy::new(ways)),
        PolicyKind::Mru => Box::new(MruPolicy::new(sets, ways)),
    }
}
