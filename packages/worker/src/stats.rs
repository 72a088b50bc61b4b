//! Job counters shared by the workers of one process.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct WorkerStats {
    complete: AtomicU64,
    failed: AtomicU64,
    ongoing: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub complete: u64,
    pub failed: u64,
    pub ongoing: u64,
}

impl WorkerStats {
    /// Count a job as running until the guard is dropped.
    pub(crate) fn track(&self) -> OngoingGuard<'_> {
        self.ongoing.fetch_add(1, Ordering::Relaxed);
        OngoingGuard { stats: self }
    }

    pub(crate) fn record(&self, success: bool) {
        let counter = if success { &self.complete } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            complete: self.complete.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            ongoing: self.ongoing.load(Ordering::Relaxed),
        }
    }
}

pub(crate) struct OngoingGuard<'a> {
    stats: &'a WorkerStats,
}

impl Drop for OngoingGuard<'_> {
    fn drop(&mut self) {
        self.stats.ongoing.fetch_sub(1, Ordering::Relaxed);
    }
}
