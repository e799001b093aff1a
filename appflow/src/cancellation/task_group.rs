//! Tracking of spawned pipeline runs so shutdown can drain them.

use parking_lot::Mutex;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A set of in-flight run tasks.
///
/// Finished tasks are reaped on every spawn; [`InFlightRuns::drain`] waits
/// for the rest.
#[derive(Default)]
pub struct InFlightRuns {
    tasks: Mutex<JoinSet<()>>,
}

impl InFlightRuns {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` onto the runtime and tracks it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        while let Some(finished) = tasks.try_join_next() {
            log_join(finished);
        }
        tasks.spawn(task);
    }

    /// Returns the number of tracked tasks, including finished ones not
    /// yet reaped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for every tracked task to finish.
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        debug!(in_flight = tasks.len(), "draining in-flight runs");
        while let Some(finished) = tasks.join_next().await {
            log_join(finished);
        }
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        warn!(error = %err, "pipeline run task did not complete");
    }
}

impl std::fmt::Debug for InFlightRuns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRuns").field("tasks", &self.len()).finish()
    }
}
