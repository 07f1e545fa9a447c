// src/lib.rs

pub mod block;
pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod orchestrator;
pub mod storage;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::dag::ModuleGraph;
use crate::exec::{ClientFactory, Response, ResponseFunc, WorkerPool};
use crate::fs::RealFileSystem;
use crate::orchestrator::{plan_backfill, Orchestrator};
use crate::storage::{LocalSnapshotLister, StorageState};

/// High-level entry point used by `main.rs`: a dry run that prints the
/// staging groups and the jobs a backfill would dispatch.
///
/// See [`run_with_client`].
pub async fn run(args: CliArgs) -> Result<()> {
    run_with_client(args, None).await
}

/// Plan the backfill for `args.module` and, given a client factory, run it.
///
/// This wires together:
/// - manifest loading
/// - module graph construction
/// - storage state discovery in the local state store
/// - backfill planning, with the `[config]` chunking
/// - the worker pool and orchestrator built from `[config]`
/// - Ctrl-C handling
///
/// Without a client factory nothing is dispatched.
pub async fn run_with_client(args: CliArgs, client_factory: Option<ClientFactory>) -> Result<()> {
    let cfg = load_and_validate(&args.manifest)?;
    let graph = ModuleGraph::new(cfg.modules.clone())?;
    let options = cfg.orchestrator_options();

    if args.mermaid {
        println!("{}", graph.to_mermaid());
    }

    let start_block = match args.start_block {
        Some(block) => block,
        None => graph.module_start_block(&args.module)?,
    };

    // Ctrl-C → stop listing the state store and cancel running jobs.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            cancel.cancel();
        });
    }

    let state_store = args
        .state_store
        .clone()
        .unwrap_or_else(|| cfg.config.state_store.clone());
    let lister = LocalSnapshotLister::new(Arc::new(RealFileSystem), state_store);
    info!(root = ?lister.root(), module = %args.module, start_block, "fetching storage state");

    let stores: Vec<String> = graph
        .stores_down_to(&args.module)?
        .into_iter()
        .map(|m| m.name.clone())
        .collect();
    let storage = StorageState::fetch(
        &cancel,
        Arc::new(lister),
        stores,
        cfg.config.listing_concurrency,
    )
    .await?;

    print_stages(&graph, &args.module)?;

    let plan = plan_backfill(&graph, &storage, &args.module, start_block, options.chunk_size)?;
    print!("{plan}");

    let Some(client_factory) = client_factory else {
        debug!(
            jobs = plan.job_count(),
            workers = cfg.config.workers,
            "planning complete (no job dispatched)"
        );
        return Ok(());
    };

    info!(
        workers = cfg.config.workers,
        chunk_size = ?options.chunk_size,
        fail_fast = options.fail_fast,
        job_retries = options.job_retries,
        "orchestrator configured"
    );
    let pool = WorkerPool::new(cfg.config.workers, cfg.module_set(), client_factory);
    let orchestrator = Orchestrator::new(pool, options);

    let report = orchestrator
        .run(&cancel, &plan, progress_logger(), None)
        .await?;
    for partial in &report.written {
        println!("written {}{}", partial.store, partial.range);
    }
    Ok(())
}

/// Logs module progress reported by running jobs.
fn progress_logger() -> ResponseFunc {
    Arc::new(|resp: &Response| {
        if let Response::Progress(modules) = resp {
            for module in modules {
                debug!(
                    module = %module.name,
                    ranges = module.processed_ranges.len(),
                    failed = module.failed,
                    "progress"
                );
            }
        }
        Ok(())
    })
}

/// Print the staging groups of `module`, farthest dependencies first.
fn print_stages(graph: &ModuleGraph, module: &str) -> Result<()> {
    println!("staging groups for {module}:");
    for (i, group) in graph.grouped_modules_down_to(module)?.iter().enumerate() {
        let names: Vec<String> = group
            .iter()
            .map(|m| format!("{} ({})", m.name, m.kind))
            .collect();
        println!("  {i}: {}", names.join(", "));
    }
    println!();
    Ok(())
}
