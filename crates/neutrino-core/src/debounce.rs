//! Debounced proximity edges.
//!
//! The interrupt side calls [`EdgeDebouncer::record_edge`] on every pin
//! transition; the main cycle calls [`EdgeDebouncer::take_pending`]. Both
//! sides only touch atomics, so the debouncer can live in a `static` and be
//! used from an interrupt handler or another task without a lock.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_time::Instant;

use crate::config::NodeConfig;

pub struct EdgeDebouncer {
    window_ms: u32,
    last_accept_ms: AtomicU32,
    pending: AtomicBool,
}

impl EdgeDebouncer {
    pub const fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            last_accept_ms: AtomicU32::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// Debouncer using the window from `config`.
    pub const fn for_config(config: &NodeConfig) -> Self {
        Self::new(config.debounce_window_ms)
    }

    /// Record a transition seen at `now`.
    ///
    /// Returns true if the edge was accepted, i.e. more than the window has
    /// elapsed since the last accepted edge. Timestamps wrap at 32 bits.
    pub fn record_edge(&self, now: Instant) -> bool {
        let now_ms = now.as_millis() as u32;
        let last = self.last_accept_ms.load(Ordering::Relaxed);

        if now_ms.wrapping_sub(last) <= self.window_ms {
            return false;
        }

        self.last_accept_ms.store(now_ms, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
        true
    }

    /// Whether an edge was accepted since the last call. Clears the flag.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::Acquire)
    }

    /// Whether an edge is waiting, without clearing it.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}
