// src/storage/local.rs

//! Snapshot listing over a local state-store directory.
//!
//! Layout, one directory per store module:
//!
//! ```text
//! <root>/<store>/0000000100-0000000000.kv       full state of [0, 100)
//! <root>/<store>/0000000200-0000000100.partial  partial state of [100, 200)
//! ```
//!
//! File names are `<end>-<start>`, zero padded to ten digits when written.
//! Files that do not follow the naming scheme are ignored.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::trace;

use crate::block::BlockRange;
use crate::fs::FileSystem;
use crate::storage::{Snapshot, SnapshotLister, Snapshots};

pub const FULL_SNAPSHOT_EXT: &str = "kv";
pub const PARTIAL_SNAPSHOT_EXT: &str = "partial";

#[derive(Debug, Clone)]
pub struct LocalSnapshotLister {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl LocalSnapshotLister {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SnapshotLister for LocalSnapshotLister {
    fn list<'a>(
        &'a self,
        store: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Snapshots>> + Send + 'a>> {
        let fs = Arc::clone(&self.fs);
        let dir = self.root.join(store);

        Box::pin(async move {
            tokio::task::spawn_blocking(move || list_store_dir(fs.as_ref(), &dir))
                .await
                .context("snapshot listing task")?
        })
    }
}

/// File name of a snapshot, as the lister expects to find it.
pub fn snapshot_file_name(range: BlockRange, partial: bool) -> String {
    let ext = if partial {
        PARTIAL_SNAPSHOT_EXT
    } else {
        FULL_SNAPSHOT_EXT
    };
    format!(
        "{:010}-{:010}.{}",
        range.exclusive_end_block, range.start_block, ext
    )
}

fn list_store_dir(fs: &dyn FileSystem, dir: &Path) -> Result<Snapshots> {
    if !fs.is_dir(dir) {
        return Ok(Snapshots::default());
    }

    let mut items = Vec::new();
    for path in fs.read_dir(dir)? {
        if !fs.is_file(&path) {
            continue;
        }
        match parse_snapshot_path(&path) {
            Some(snapshot) => items.push(snapshot),
            None => trace!(path = ?path, "ignoring non-snapshot file"),
        }
    }

    Ok(Snapshots::new(items))
}

fn parse_snapshot_path(path: &Path) -> Option<Snapshot> {
    let ext = path.extension()?.to_str()?;
    let stem = path.file_stem()?.to_str()?;
    let (end, start) = stem.split_once('-')?;
    let range = BlockRange::new(start.parse().ok()?, end.parse().ok()?);
    if range.is_empty() {
        return None;
    }

    let location = path.display().to_string();
    match ext {
        FULL_SNAPSHOT_EXT => Some(Snapshot::full(range, location)),
        PARTIAL_SNAPSHOT_EXT => Some(Snapshot::partial(range, location)),
        _ => None,
    }
}
