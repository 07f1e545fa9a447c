// src/exec/pool.rs

//! Fixed-size pool of remote workers.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, trace};

use crate::errors::{OrchestratorError, Result};
use crate::exec::client::ClientFactory;
use crate::exec::worker::Worker;
use crate::types::Modules;

/// Owns exactly `size` workers and lends them out one caller at a time.
///
/// A semaphore with `size` permits gates access to a free list holding the
/// idle workers. A worker is returned to the free list before its permit is
/// released, so a caller holding a permit always finds a worker.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Worker>>,
    size: usize,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.inner.size)
            .field("available", &self.available())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(
        worker_count: usize,
        original_modules: Modules,
        client_factory: ClientFactory,
    ) -> Self {
        info!(worker_count, "initiating worker pool");

        let idle = (0..worker_count)
            .map(|id| {
                Worker::new(id, Modules::clone(&original_modules), Arc::clone(&client_factory))
            })
            .collect();

        Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(worker_count)),
                idle: Mutex::new(idle),
                size: worker_count,
            }),
        }
    }

    /// Total number of workers.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Workers not currently borrowed.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Wait until a worker is free and take exclusive use of it.
    ///
    /// The worker goes back to the pool when the returned guard is dropped.
    pub async fn borrow(&self) -> Result<PooledWorker> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| OrchestratorError::Other(anyhow::anyhow!("worker pool closed")))?;

        let worker = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .ok_or_else(|| {
                OrchestratorError::Other(anyhow::anyhow!("worker pool has no idle worker"))
            })?;

        trace!(worker = worker.id(), "worker borrowed");
        Ok(PooledWorker {
            worker: Some(worker),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }
}

/// A borrowed worker. Dropping it returns the worker to its pool, on every
/// exit path of the borrower.
pub struct PooledWorker {
    worker: Option<Worker>,
    pool: Arc<PoolInner>,
    // Dropped after `drop` below has put the worker back.
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledWorker {
    type Target = Worker;

    fn deref(&self) -> &Worker {
        self.worker
            .as_ref()
            .expect("pooled worker is only taken on drop")
    }
}

impl Drop for PooledWorker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            trace!(worker = worker.id(), "worker returned");
            self.pool
                .idle
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(worker);
        }
    }
}
