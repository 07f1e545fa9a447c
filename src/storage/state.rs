// src/storage/state.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{OrchestratorError, Result};
use crate::exec::group::BoundedGroup;
use crate::storage::{SnapshotLister, Snapshots};

/// Existing snapshots per store module.
///
/// Built in two phases: during [`StorageState::fetch`] concurrent listings
/// write into a single mutex-guarded map; once every listing has finished the
/// map is moved out and the returned value is plain, read-only data.
#[derive(Debug, Clone, Default)]
pub struct StorageState {
    snapshots: HashMap<String, Snapshots>,
}

impl StorageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// List the snapshots of every store in `stores`, at most `concurrency`
    /// listings at a time.
    ///
    /// The first listing error stops new listings from starting; listings
    /// already running are allowed to finish before that error is returned.
    pub async fn fetch<I, S>(
        cancel: &CancellationToken,
        lister: Arc<dyn SnapshotLister>,
        stores: I,
        concurrency: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collected: Arc<Mutex<HashMap<String, Snapshots>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let mut group: BoundedGroup<OrchestratorError> = BoundedGroup::new(concurrency);

        for store in stores {
            let store: String = store.into();
            if cancel.is_cancelled() {
                debug!(store = %store, "storage listing canceled before start");
                break;
            }

            let lister = Arc::clone(&lister);
            let collected = Arc::clone(&collected);
            let cancel = cancel.clone();

            let launched = group
                .spawn(async move {
                    let snapshots = tokio::select! {
                        _ = cancel.cancelled() => return Err(OrchestratorError::Canceled),
                        listed = lister.list(&store) => listed.map_err(|source| {
                            OrchestratorError::ListingError {
                                store: store.clone(),
                                source,
                            }
                        })?,
                    };

                    debug!(store = %store, count = snapshots.len(), "listed store snapshots");
                    collected
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(store, snapshots);
                    Ok(())
                })
                .await;

            if !launched {
                debug!("storage listing stopped after a failure");
                break;
            }
        }

        group.wait().await?;

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Canceled);
        }

        let snapshots = std::mem::take(&mut *collected.lock().unwrap_or_else(|e| e.into_inner()));
        info!(stores = snapshots.len(), "storage state fetched");
        Ok(Self { snapshots })
    }

    /// Record the snapshots of one store (for callers assembling the state
    /// themselves).
    pub fn insert(&mut self, store: impl Into<String>, snapshots: Snapshots) {
        self.snapshots.insert(store.into(), snapshots);
    }

    pub fn snapshots(&self, store: &str) -> Option<&Snapshots> {
        self.snapshots.get(store)
    }

    pub fn stores(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
