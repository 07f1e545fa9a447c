// src/exec/group.rs

//! Bounded task group with "stop on first error, drain in-flight" semantics.
//!
//! Used by the storage listing and by each orchestration stage:
//!
//! - at most `limit` tasks run at the same time; [`BoundedGroup::spawn`]
//!   waits for a free slot;
//! - once any task fails, the group is *stopped*: further `spawn` calls
//!   return `false` without running anything;
//! - tasks that were already started are never aborted; [`BoundedGroup::wait`]
//!   joins all of them before reporting the first error.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

pub struct BoundedGroup<E> {
    slots: Arc<Semaphore>,
    stopped: Arc<AtomicBool>,
    first_error: Arc<Mutex<Option<E>>>,
    tasks: JoinSet<()>,
    stop_on_error: bool,
}

impl<E: Send + 'static> BoundedGroup<E> {
    /// Group that stops launching new tasks after the first failure.
    pub fn new(limit: usize) -> Self {
        Self::with_policy(limit, true)
    }

    /// With `stop_on_error = false` every task is launched regardless of
    /// failures; `wait` still reports the first error.
    pub fn with_policy(limit: usize, stop_on_error: bool) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(limit.max(1))),
            stopped: Arc::new(AtomicBool::new(false)),
            first_error: Arc::new(Mutex::new(None)),
            tasks: JoinSet::new(),
            stop_on_error,
        }
    }

    /// Whether a failure has stopped the group.
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait for a free slot and run `fut` on it.
    ///
    /// Returns `false` (and drops `fut` unpolled) if the group was stopped
    /// before the task could start.
    pub async fn spawn<F>(&mut self, fut: F) -> bool
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        if self.stopped() {
            return false;
        }

        let Ok(permit) = Arc::clone(&self.slots).acquire_owned().await else {
            return false;
        };

        // A task may have failed while we were waiting for its slot.
        if self.stopped() {
            return false;
        }

        let stopped = Arc::clone(&self.stopped);
        let first_error = Arc::clone(&self.first_error);
        let stop_on_error = self.stop_on_error;

        self.tasks.spawn(async move {
            let result = fut.await;
            if let Err(err) = result {
                if stop_on_error {
                    stopped.store(true, Ordering::SeqCst);
                }
                let mut slot = first_error.lock().unwrap_or_else(|e| e.into_inner());
                if slot.is_none() {
                    *slot = Some(err);
                } else {
                    debug!("task group: dropping subsequent error");
                }
            }
            // Release the slot only once the outcome is recorded.
            drop(permit);
        });

        true
    }

    /// Join every started task, then return the first error, if any.
    ///
    /// A panic inside a task is resumed here.
    pub async fn wait(mut self) -> Result<(), E> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(join_err) = joined {
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
            }
        }

        let mut slot = self.first_error.lock().unwrap_or_else(|e| e.into_inner());
        match slot.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
