// src/orchestrator/mod.rs

//! Parallel backfill of the store modules a requested module depends on.
//!
//! - [`plan`] diffs the store modules a request needs against the
//!   [`StorageState`](crate::storage::StorageState) and stages the resulting
//!   jobs by store dependency depth.
//! - [`runner`] drives those stages through the worker pool, stage by stage,
//!   and collects the ranges each job committed.
//!
//! Merging those partial ranges into contiguous store state ("squashing")
//! is left to an external [`Squasher`].

pub mod plan;
pub mod runner;

use std::future::Future;
use std::pin::Pin;

use crate::block::BlockRange;

pub use plan::{plan_backfill, BackfillPlan, Stage};
pub use runner::Orchestrator;

/// Orchestration policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Split missing ranges into jobs of at most this many blocks. `None`
    /// dispatches one job per missing range.
    pub chunk_size: Option<u64>,
    /// Stop dispatching a stage's remaining jobs after the first failure.
    /// In-flight jobs always finish.
    pub fail_fast: bool,
    /// How many times a job failing on a client or stream error is
    /// re-dispatched.
    pub job_retries: u32,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            chunk_size: None,
            fail_fast: true,
            job_retries: 0,
        }
    }
}

/// One range a job reported as committed partial state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartialWritten {
    pub store: String,
    pub range: BlockRange,
}

/// Everything the backfill wrote, in stage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub written: Vec<PartialWritten>,
}

impl BackfillReport {
    /// Ranges written for one store.
    pub fn ranges_of(&self, store: &str) -> Vec<BlockRange> {
        self.written
            .iter()
            .filter(|p| p.store == store)
            .map(|p| p.range)
            .collect()
    }
}

/// Merges the partial ranges of a store into contiguous committed state.
pub trait Squasher: Send + Sync {
    fn squash<'a>(
        &'a self,
        store: &'a str,
        ranges: &'a [BlockRange],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}
