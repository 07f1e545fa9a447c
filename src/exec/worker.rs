// src/exec/worker.rs

//! Execution of a single job as one remote streaming call.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::block::{parse_ranges, BlockRange};
use crate::errors::{OrchestratorError, Result};
use crate::exec::client::{
    ClientFactory, Metadata, Response, ResponseFunc, PARTIALS_WRITTEN_TRAILER,
    PARTIAL_MODE_HEADER,
};
use crate::exec::job::Job;
use crate::types::Modules;

/// Capability to run jobs remotely. Holds nothing but the module set of the
/// original request and the factory used to reach the remote side.
#[derive(Clone)]
pub struct Worker {
    id: usize,
    original_request_modules: Modules,
    client_factory: ClientFactory,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(
        id: usize,
        original_request_modules: Modules,
        client_factory: ClientFactory,
    ) -> Self {
        Self {
            id,
            original_request_modules,
            client_factory,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run `job` to completion and return the ranges the remote side
    /// committed as partial state.
    ///
    /// - Progress events are forwarded to `resp_fn`; an error from it aborts
    ///   the job.
    /// - Snapshot events and data events are consumed but not surfaced.
    /// - Cancelling `cancel` aborts the job promptly with
    ///   [`OrchestratorError::Canceled`]; nothing is credited.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        job: &Job,
        resp_fn: &ResponseFunc,
    ) -> Result<Vec<BlockRange>> {
        let start = Instant::now();
        info!(job = %job, worker = self.id, "running job");

        let result = self.run_inner(cancel, job, resp_fn).await;

        info!(
            job = %job,
            worker = self.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            success = result.is_ok(),
            "job completed"
        );
        result
    }

    async fn run_inner(
        &self,
        cancel: &CancellationToken,
        job: &Job,
        resp_fn: &ResponseFunc,
    ) -> Result<Vec<BlockRange>> {
        let client = (self.client_factory)().map_err(|err| {
            error!(job = %job, error = %err, "getting grpc client");
            OrchestratorError::ClientError(err)
        })?;

        let mut metadata = Metadata::new();
        metadata.insert(PARTIAL_MODE_HEADER, "true");

        let request = job.create_request(&self.original_request_modules);

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(job = %job, "context canceled before stream was opened");
                return Err(OrchestratorError::Canceled);
            }
            opened = client.blocks(request, metadata) => opened.map_err(|err| {
                OrchestratorError::StreamError(err.context("getting block stream"))
            })?,
        };

        loop {
            if cancel.is_cancelled() {
                warn!(
                    job = %job,
                    "context canceled while waiting for stream data, worker is terminating"
                );
                return Err(OrchestratorError::Canceled);
            }

            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(
                    job = %job,
                    "context canceled while waiting for stream data, worker is terminating"
                );
                    return Err(OrchestratorError::Canceled);
                }
                received = stream.recv() => received,
            };

            let resp = match received {
                Ok(Some(resp)) => resp,
                Ok(None) => {
                    debug!(job = %job, "worker done");
                    return partials_written(&stream.trailer());
                }
                Err(err) => {
                    warn!(job = %job, error = %err, "worker done on stream error");
                    return Err(OrchestratorError::StreamError(err));
                }
            };

            match &resp {
                Response::Progress(_) => {
                    if let Err(err) = resp_fn(&resp) {
                        warn!(job = %job, error = %err, "worker done on respFunc error");
                        return Err(OrchestratorError::CallbackError(err));
                    }
                }
                Response::SnapshotData(data) => {
                    trace!(job = %job, module = %data.module_name, "snapshot data received");
                }
                Response::SnapshotComplete => {
                    trace!(job = %job, "snapshot complete received");
                }
                // Partial jobs return no outputs: the trailer is the result.
                Response::Data(_) => {}
            }
        }
    }
}

/// Ranges listed by every value of the partials-written trailer.
fn partials_written(trailer: &Metadata) -> Result<Vec<BlockRange>> {
    let mut written = Vec::new();
    for raw in trailer.get_all(PARTIALS_WRITTEN_TRAILER) {
        info!(trailer = %raw, "partial written");
        let ranges = parse_ranges(raw).map_err(|err| {
            let context = format!("parsing {PARTIALS_WRITTEN_TRAILER} trailer");
            OrchestratorError::StreamError(err.context(context))
        })?;
        written.extend(ranges);
    }
    Ok(written)
}
