//! Two-context rendezvous at reply-install time.
//!
//! When the application context misses past the L2 it parks in
//! [`Rendezvous::collect`] until the network context installs the matching
//! directory grant and hands over a token via [`Rendezvous::deliver`].
//! Delivery blocks until the token is collected, so a grant is never
//! overwritten and wake-up order matches install order one-to-one.
//!
//! This single-slot channel replaces a pair of binary semaphores: the same
//! two hand-shakes, but misordered signals are unrepresentable.

use std::sync::{Condvar, Mutex};

/// Single-slot channel between the network and application contexts.
#[derive(Debug)]
pub struct Rendezvous<T> {
    slot: Mutex<Option<T>>,
    filled: Condvar,
    drained: Condvar,
}

impl<T> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Rendezvous<T> {
    /// An empty rendezvous.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            filled: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Places `token` for the application context and blocks until it is
    /// collected. Network-context side.
    pub fn deliver(&self, token: T) {
        let mut slot = self.slot.lock().expect("rendezvous lock");
        while slot.is_some() {
            slot = self.drained.wait(slot).expect("rendezvous lock");
        }
        *slot = Some(token);
        self.filled.notify_one();
        while slot.is_some() {
            slot = self.drained.wait(slot).expect("rendezvous lock");
        }
    }

    /// Blocks until a token arrives, takes it, and releases the delivering
    /// context. Application-context side.
    pub fn collect(&self) -> T {
        let mut slot = self.slot.lock().expect("rendezvous lock");
        loop {
            if let Some(token) = slot.take() {
                self.drained.notify_all();
                return token;
            }
            slot = self.filled.wait(slot).expect("rendezvous lock");
        }
    }
}
