// src/storage/mod.rs

//! Persisted store state discovery.
//!
//! - [`state`] builds a [`StorageState`] by listing every store's committed
//!   snapshots concurrently.
//! - [`local`] is a [`SnapshotLister`] over a local state-store directory.
//!
//! The listing itself is an external collaborator: anything implementing
//! [`SnapshotLister`] can back a [`StorageState`].

pub mod local;
pub mod state;

use std::future::Future;
use std::pin::Pin;

use crate::block::BlockRange;

pub use local::LocalSnapshotLister;
pub use state::StorageState;

/// Whether a snapshot holds the full state since the module's initial block
/// or only the state produced by one partial (backfill) job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Full,
    Partial,
}

/// Descriptor of one committed, contiguous range of a store's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub range: BlockRange,
    pub kind: SnapshotKind,
    /// Location of the snapshot in the backing storage.
    pub path: String,
}

impl Snapshot {
    pub fn full(range: BlockRange, path: impl Into<String>) -> Self {
        Self {
            range,
            kind: SnapshotKind::Full,
            path: path.into(),
        }
    }

    pub fn partial(range: BlockRange, path: impl Into<String>) -> Self {
        Self {
            range,
            kind: SnapshotKind::Partial,
            path: path.into(),
        }
    }
}

/// Ordered snapshots of a single store (by end block, then start block).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshots {
    items: Vec<Snapshot>,
}

impl Snapshots {
    pub fn new(mut items: Vec<Snapshot>) -> Self {
        items.sort_by_key(|s| (s.range.exclusive_end_block, s.range.start_block));
        Self { items }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// End block of the most advanced full snapshot.
    pub fn last_full_block(&self) -> Option<u64> {
        self.items
            .iter()
            .filter(|s| s.kind == SnapshotKind::Full)
            .map(|s| s.range.exclusive_end_block)
            .max()
    }

    /// Sub-ranges of `required` that no snapshot covers, in block order.
    pub fn missing_ranges(&self, required: BlockRange) -> Vec<BlockRange> {
        let mut covered: Vec<BlockRange> = self.items.iter().map(|s| s.range).collect();
        covered.sort();

        let mut missing = Vec::new();
        let mut cursor = required.start_block;

        for range in covered {
            if cursor >= required.exclusive_end_block {
                break;
            }
            if range.exclusive_end_block <= cursor {
                continue;
            }
            if range.start_block > cursor {
                let gap_end = range.start_block.min(required.exclusive_end_block);
                missing.push(BlockRange::new(cursor, gap_end));
            }
            cursor = cursor.max(range.exclusive_end_block);
        }

        if cursor < required.exclusive_end_block {
            missing.push(BlockRange::new(cursor, required.exclusive_end_block));
        }

        missing
    }

    /// Ranges to produce so that the store holds state for `required` and
    /// has a snapshot boundary at its end block.
    ///
    /// These are the [`missing_ranges`](Self::missing_ranges) of `required`.
    /// When a snapshot straddles the end of `required`, its state is only
    /// usable up to that end, so the tail past it is produced again as well.
    pub fn backfill_ranges(&self, required: BlockRange) -> Vec<BlockRange> {
        let mut ranges = self.missing_ranges(required);

        let end = required.exclusive_end_block;
        let straddling_end = self
            .items
            .iter()
            .filter(|s| s.range.start_block < end && end < s.range.exclusive_end_block)
            .map(|s| s.range.exclusive_end_block)
            .max();
        if let Some(tail_end) = straddling_end {
            ranges.push(BlockRange::new(end, tail_end));
        }

        ranges
    }
}

/// Lists the committed snapshots of one store.
pub trait SnapshotLister: Send + Sync {
    fn list<'a>(
        &'a self,
        store: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Snapshots>> + Send + 'a>>;
}
