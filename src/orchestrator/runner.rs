// src/orchestrator/runner.rs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::block::BlockRange;
use crate::dag::ModuleGraph;
use crate::errors::{OrchestratorError, Result};
use crate::exec::{BoundedGroup, Job, ResponseFunc, WorkerPool};
use crate::storage::StorageState;

use super::plan::{plan_backfill, BackfillPlan, Stage};
use super::{BackfillReport, OrchestratorOptions, PartialWritten, Squasher};

/// Drives a [`BackfillPlan`] through a [`WorkerPool`], one stage at a time.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    pool: WorkerPool,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(pool: WorkerPool, options: OrchestratorOptions) -> Self {
        Self { pool, options }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Plan with this orchestrator's chunking, then run the plan.
    #[allow(clippy::too_many_arguments)]
    pub async fn backfill(
        &self,
        cancel: &CancellationToken,
        graph: &ModuleGraph,
        storage: &StorageState,
        target: &str,
        up_to_block: u64,
        resp_fn: ResponseFunc,
        squasher: Option<Arc<dyn Squasher>>,
    ) -> Result<BackfillReport> {
        let plan = plan_backfill(graph, storage, target, up_to_block, self.options.chunk_size)?;
        self.run(cancel, &plan, resp_fn, squasher).await
    }

    /// Run every stage of `plan` in order.
    ///
    /// All jobs of a stage are terminal before the next stage starts. When
    /// a squasher is given, it receives each store's written ranges as soon
    /// as their stage succeeded.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        plan: &BackfillPlan,
        resp_fn: ResponseFunc,
        squasher: Option<Arc<dyn Squasher>>,
    ) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        if plan.is_empty() {
            info!(module = %plan.target, up_to_block = plan.up_to_block, "no backfill needed");
            return Ok(report);
        }

        info!(
            module = %plan.target,
            up_to_block = plan.up_to_block,
            stages = plan.stages.len(),
            jobs = plan.job_count(),
            "starting backfill"
        );

        for (index, stage) in plan.stages.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Canceled);
            }

            info!(stage = index, stores = ?stage.stores, jobs = stage.jobs.len(), "running stage");
            let written = self.run_stage(cancel, stage, &resp_fn).await?;

            if let Some(squasher) = &squasher {
                squash_stage(squasher.as_ref(), &written).await?;
            }
            report.written.extend(written);
        }

        info!(ranges = report.written.len(), "backfill completed");
        Ok(report)
    }

    async fn run_stage(
        &self,
        cancel: &CancellationToken,
        stage: &Stage,
        resp_fn: &ResponseFunc,
    ) -> Result<Vec<PartialWritten>> {
        let collected: Arc<Mutex<Vec<PartialWritten>>> = Arc::new(Mutex::new(Vec::new()));
        let mut group: BoundedGroup<OrchestratorError> =
            BoundedGroup::with_policy(self.pool.size(), self.options.fail_fast);

        for job in &stage.jobs {
            let pool = self.pool.clone();
            let cancel = cancel.clone();
            let resp_fn = Arc::clone(resp_fn);
            let collected = Arc::clone(&collected);
            let task_job = job.clone();
            let retries = self.options.job_retries;

            let launched = group
                .spawn(async move {
                    let ranges = run_job(&pool, &cancel, &task_job, &resp_fn, retries)
                        .await
                        .map_err(|err| OrchestratorError::JobFailed {
                            job: task_job.to_string(),
                            source: Box::new(err),
                        })?;

                    let mut out = collected.lock().unwrap_or_else(|e| e.into_inner());
                    out.extend(ranges.into_iter().map(|range| PartialWritten {
                        store: task_job.module_name.clone(),
                        range,
                    }));
                    Ok(())
                })
                .await;

            if !launched {
                warn!(
                    job = %job,
                    "stage stopped after a job failure; remaining jobs not dispatched"
                );
                break;
            }
        }

        group.wait().await?;

        let mut written =
            std::mem::take(&mut *collected.lock().unwrap_or_else(|e| e.into_inner()));
        written.sort();
        Ok(written)
    }
}

/// Borrow a worker and run `job`, re-dispatching on a fresh worker up to
/// `retries` times when the failure is a client or stream error.
async fn run_job(
    pool: &WorkerPool,
    cancel: &CancellationToken,
    job: &Job,
    resp_fn: &ResponseFunc,
    retries: u32,
) -> Result<Vec<BlockRange>> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let worker = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Canceled),
            borrowed = pool.borrow() => borrowed?,
        };
        let result = worker.run(cancel, job, resp_fn).await;
        drop(worker);

        match result {
            Err(err) if err.is_retryable() && attempt <= retries => {
                warn!(job = %job, attempt, error = %err, "job failed; re-dispatching");
            }
            other => return other,
        }
    }
}

async fn squash_stage(squasher: &dyn Squasher, written: &[PartialWritten]) -> Result<()> {
    let mut by_store: BTreeMap<&str, Vec<BlockRange>> = BTreeMap::new();
    for partial in written {
        by_store.entry(partial.store.as_str()).or_default().push(partial.range);
    }

    for (store, ranges) in by_store {
        squasher
            .squash(store, &ranges)
            .await
            .map_err(|source| OrchestratorError::SquashError {
                store: store.to_string(),
                source,
            })?;
    }
    Ok(())
}
