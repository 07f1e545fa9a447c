// src/orchestrator/plan.rs

//! Turning the module graph and the storage state into staged jobs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::block::BlockRange;
use crate::dag::ModuleGraph;
use crate::errors::Result;
use crate::exec::Job;
use crate::storage::StorageState;

/// Jobs for the store modules of one stage.
///
/// No store of a stage depends on a store of the same or a later stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Store modules of the group that need backfilling, manifest order.
    pub stores: Vec<String>,
    pub jobs: Vec<Job>,
}

/// Ordered stages of backfill work for one request; run front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillPlan {
    pub target: String,
    pub up_to_block: u64,
    pub stages: Vec<Stage>,
}

impl BackfillPlan {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn job_count(&self) -> usize {
        self.stages.iter().map(|s| s.jobs.len()).sum()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.stages.iter().flat_map(|s| s.jobs.iter())
    }
}

impl fmt::Display for BackfillPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stages.is_empty() {
            return writeln!(
                f,
                "nothing to backfill for {} up to block {}",
                self.target, self.up_to_block
            );
        }

        writeln!(
            f,
            "backfill for {} up to block {} ({} jobs):",
            self.target,
            self.up_to_block,
            self.job_count()
        )?;
        for (i, stage) in self.stages.iter().enumerate() {
            writeln!(f, "  stage {} [{}]", i, stage.stores.join(", "))?;
            for job in &stage.jobs {
                writeln!(f, "    - {job}")?;
            }
        }
        Ok(())
    }
}

/// Plan the jobs that bring every store needed by `target` up to
/// `up_to_block`.
///
/// Each store must hold state for `[initial_block, up_to_block)`, ending on
/// a snapshot boundary at `up_to_block`; see [`Snapshots::backfill_ranges`].
/// The resulting ranges become jobs, split into `chunk_size` blocks when set.
///
/// Stores are staged by their store depth: a store that reads no other
/// store (directly or through maps) runs in stage 0, and any other store
/// runs one stage after the deepest store it depends on. Stages with nothing
/// to do are left out.
///
/// [`Snapshots::backfill_ranges`]: crate::storage::Snapshots::backfill_ranges
pub fn plan_backfill(
    graph: &ModuleGraph,
    storage: &StorageState,
    target: &str,
    up_to_block: u64,
    chunk_size: Option<u64>,
) -> Result<BackfillPlan> {
    let depths = store_depths(graph);
    let mut by_depth: BTreeMap<usize, Stage> = BTreeMap::new();

    for module in graph.stores_down_to(target)? {
        if up_to_block <= module.initial_block {
            debug!(
                store = %module.name,
                initial_block = module.initial_block,
                "store starts after requested block"
            );
            continue;
        }

        let required = BlockRange::new(module.initial_block, up_to_block);
        let ranges = match storage.snapshots(&module.name) {
            Some(snapshots) => snapshots.backfill_ranges(required),
            None => vec![required],
        };
        if ranges.is_empty() {
            debug!(store = %module.name, range = %required, "store state already committed");
            continue;
        }

        let depth = depths.get(module.name.as_str()).copied().unwrap_or(0);
        let stage = by_depth.entry(depth).or_insert_with(|| Stage {
            stores: Vec::new(),
            jobs: Vec::new(),
        });
        stage.stores.push(module.name.clone());
        for range in ranges {
            for chunk in range.split(chunk_size.unwrap_or(0)) {
                stage.jobs.push(Job::new(module.name.clone(), chunk));
            }
        }
    }

    Ok(BackfillPlan {
        target: target.to_string(),
        up_to_block,
        stages: by_depth.into_values().collect(),
    })
}

/// Length of the longest chain of stores below each module.
///
/// A store depending on another store always gets a strictly larger depth,
/// whatever the number of maps in between.
fn store_depths(graph: &ModuleGraph) -> HashMap<&str, usize> {
    let mut depths: HashMap<&str, usize> = HashMap::with_capacity(graph.len());

    for module in graph.topological_order() {
        let depth = module
            .dependency_names()
            .filter_map(|dep| {
                let parent = graph.module(dep)?;
                let below = depths.get(parent.name.as_str()).copied().unwrap_or(0);
                Some(below + usize::from(parent.is_store()))
            })
            .max()
            .unwrap_or(0);
        depths.insert(module.name.as_str(), depth);
    }

    depths
}
