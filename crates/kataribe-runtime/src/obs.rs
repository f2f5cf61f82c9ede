//! Minimal runtime counters.
//!
//! No external dependencies; a handful of atomic counters incremented on the
//! dispatch paths and read through [`RuntimeStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct RuntimeStats {
    pub(crate) envelopes_in: AtomicU64,
    pub(crate) envelopes_out: AtomicU64,
    pub(crate) rpc_calls: AtomicU64,
    pub(crate) rpc_timeouts: AtomicU64,
    pub(crate) validation_failures: AtomicU64,
    pub(crate) frames_dropped: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub envelopes_in: u64,
    pub envelopes_out: u64,
    pub rpc_calls: u64,
    pub rpc_timeouts: u64,
    pub validation_failures: u64,
    pub frames_dropped: u64,
}

impl RuntimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            envelopes_in: self.envelopes_in.load(Ordering::Relaxed),
            envelopes_out: self.envelopes_out.load(Ordering::Relaxed),
            rpc_calls: self.rpc_calls.load(Ordering::Relaxed),
            rpc_timeouts: self.rpc_timeouts.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}
