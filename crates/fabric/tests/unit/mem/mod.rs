//! Memory-subsystem unit tests, leaves first.




/// Directory controller transitions.
pub mod directory;


/// Context interleavings, lock order, and deadlock avoidance.
pub mod concurrency;
