//! Cancellable scheduled tasks owned by one engine instance.
//!
//! Every task an engine spawns (its driver and any delayed completion) is
//! tracked here so that skip and unmount can abort them together. Aborting
//! is paired with the engine's generation bump: a task that slips past the
//! abort still fails its generation check before mutating state.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Set of outstanding tasks.
#[derive(Debug, Default)]
pub struct TimerSet {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TimerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` and tracks its handle.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        if let Ok(mut handles) = self.handles.lock() {
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        } else {
            handle.abort();
        }
    }

    /// Spawns `task` to run after `delay`.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }

    /// Aborts every tracked task.
    pub fn clear(&self) {
        if let Ok(mut handles) = self.handles.lock() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
    }

    /// Number of tracked tasks that have not finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .map_or(0, |h| h.iter().filter(|h| !h.is_finished()).count())
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.clear();
    }
}
