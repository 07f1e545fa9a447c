#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};

use substreams_orchestrator::block::BlockRange;
use substreams_orchestrator::storage::{Snapshot, SnapshotLister, Snapshots};

/// In-memory `SnapshotLister`.
///
/// - records which stores were listed, in start order;
/// - stores marked failing return an error;
/// - every listing can be slowed down by a fixed delay.
#[derive(Clone, Default)]
pub struct FakeLister {
    snapshots: HashMap<String, Vec<Snapshot>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    started: Arc<Mutex<Vec<String>>>,
}

impl FakeLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, store: &str, snapshot: Snapshot) -> Self {
        self.snapshots
            .entry(store.to_string())
            .or_default()
            .push(snapshot);
        self
    }

    /// Full snapshot of `[start, end)`.
    pub fn with_full(self, store: &str, start: u64, end: u64) -> Self {
        let path = format!("{store}/{end}-{start}.kv");
        self.with_snapshot(store, Snapshot::full(BlockRange::new(start, end), path))
    }

    pub fn failing(mut self, store: &str) -> Self {
        self.failing.insert(store.to_string());
        self
    }

    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl SnapshotLister for FakeLister {
    fn list<'a>(
        &'a self,
        store: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Snapshots>> + Send + 'a>> {
        Box::pin(async move {
            self.started.lock().unwrap().push(store.to_string());

            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }

            if self.failing.contains(store) {
                return Err(anyhow!("store {store} unreachable"));
            }

            Ok(Snapshots::new(
                self.snapshots.get(store).cloned().unwrap_or_default(),
            ))
        })
    }
}
