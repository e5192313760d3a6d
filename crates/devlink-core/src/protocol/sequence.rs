//! Per-link packet counter stamped into every envelope.
//!
//! # What is the counter for? (for beginners)
//!
//! Each packet carries a one-byte `counter` chosen by the sender.  The device
//! echoes it in the matching response, which lets the host pair a
//! `FileDataResponse` with the request that produced it and spot a response
//! that arrives twice after a retry.  With only 8 bits the value wraps from
//! 255 back to 0, so it identifies a packet only among the ones currently in
//! flight, not for the lifetime of the link.
//!
//! # Thread safety
//!
//! The counter is an `AtomicU8`, so a link's sender and a retry timer can both
//! draw values through a shared reference without a lock.

use std::sync::atomic::{AtomicU8, Ordering};

/// A wrapping, lock-free 8-bit counter for envelope `counter` fields.
///
/// # Examples
///
/// ```rust
/// use devlink_core::protocol::PacketCounter;
///
/// let counter = PacketCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug, Default)]
pub struct PacketCounter {
    inner: AtomicU8,
}

impl PacketCounter {
    /// Creates a counter whose first value is 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose first value is `value`.
    pub fn starting_at(value: u8) -> Self {
        Self {
            inner: AtomicU8::new(value),
        }
    }

    /// Returns the next counter value, wrapping from 255 to 0.
    pub fn next(&self) -> u8 {
        // `fetch_add` on atomics wraps on overflow and returns the old value.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) will hand out.
    pub fn current(&self) -> u8 {
        self.inner.load(Ordering::Relaxed)
    }
}
