//! Run counters kept by the dispatcher.

use crate::core::RunStatus;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of dispatched runs.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    processed: AtomicU64,
    completed: AtomicU64,
    filtered: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    invalid: AtomicU64,
}

impl DispatcherStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, status: RunStatus) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match status {
            RunStatus::Completed => &self.completed,
            RunStatus::FilteredOut => &self.filtered,
            RunStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a message that could not be decoded or was reported as an
    /// error by the message-bus client.
    pub fn record_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of pipeline runs that finished.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Returns the number of completed runs.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Returns the number of filtered-out runs.
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    /// Returns the number of failed runs, timeouts included.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Returns the number of runs abandoned on a deadline.
    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Returns the number of invalid inbound messages.
    pub fn invalid(&self) -> u64 {
        self.invalid.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed(),
            completed: self.completed(),
            filtered: self.filtered(),
            failed: self.failed(),
            timed_out: self.timed_out(),
            invalid: self.invalid(),
        }
    }
}

/// A copy of [`DispatcherStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Finished runs.
    pub processed: u64,
    /// Completed runs.
    pub completed: u64,
    /// Filtered-out runs.
    pub filtered: u64,
    /// Failed runs.
    pub failed: u64,
    /// Runs abandoned on a deadline.
    pub timed_out: u64,
    /// Invalid inbound messages.
    pub invalid: u64,
}
