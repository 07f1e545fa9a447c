// tests/local_lister.rs

use std::fs;
use std::sync::Arc;

use substreams_orchestrator::block::BlockRange;
use substreams_orchestrator::fs::mock::MockFileSystem;
use substreams_orchestrator::fs::RealFileSystem;
use substreams_orchestrator::storage::local::snapshot_file_name;
use substreams_orchestrator::storage::{LocalSnapshotLister, SnapshotKind, SnapshotLister};

#[tokio::test]
async fn lists_full_and_partial_snapshots() {
    let fs = MockFileSystem::new();
    fs.add_file("state/S/0000000100-0000000000.kv");
    fs.add_file("state/S/0000000200-0000000100.partial");
    fs.add_file("state/S/notes.txt");
    fs.add_file("state/S/0000000300-0000000200.tmp");

    let lister = LocalSnapshotLister::new(Arc::new(fs), "state");
    let snapshots = lister.list("S").await.unwrap();

    let found: Vec<(BlockRange, SnapshotKind)> =
        snapshots.iter().map(|s| (s.range, s.kind)).collect();
    assert_eq!(
        found,
        vec![
            (BlockRange::new(0, 100), SnapshotKind::Full),
            (BlockRange::new(100, 200), SnapshotKind::Partial),
        ]
    );
}

#[tokio::test]
async fn missing_store_directory_has_no_snapshots() {
    let fs = MockFileSystem::new();
    fs.add_file("state/other/0000000100-0000000000.kv");

    let lister = LocalSnapshotLister::new(Arc::new(fs), "state");
    assert!(lister.list("S").await.unwrap().is_empty());
}

#[tokio::test]
async fn unreadable_store_directory_is_an_error() {
    let fs = MockFileSystem::new();
    fs.add_file("state/S/0000000100-0000000000.kv");
    fs.break_dir("state/S");

    let lister = LocalSnapshotLister::new(Arc::new(fs), "state");
    let err = lister.list("S").await.unwrap_err();
    assert!(err.to_string().contains("permission denied"));
}

#[tokio::test]
async fn reads_a_real_state_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_dir = dir.path().join("store_balances");
    fs::create_dir_all(store_dir.join("nested")).unwrap();

    fs::write(store_dir.join(snapshot_file_name(BlockRange::new(0, 1000), false)), b"").unwrap();
    fs::write(store_dir.join(snapshot_file_name(BlockRange::new(1000, 1500), true)), b"").unwrap();
    fs::write(store_dir.join("README"), b"").unwrap();

    let lister = LocalSnapshotLister::new(Arc::new(RealFileSystem), dir.path());
    let snapshots = lister.list("store_balances").await.unwrap();

    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots.last_full_block(), Some(1000));
    assert_eq!(
        snapshots.missing_ranges(BlockRange::new(0, 2000)),
        vec![BlockRange::new(1500, 2000)]
    );
}

#[test]
fn snapshot_file_names_are_zero_padded() {
    assert_eq!(
        snapshot_file_name(BlockRange::new(100, 200), false),
        "0000000200-0000000100.kv"
    );
    assert_eq!(
        snapshot_file_name(BlockRange::new(0, 50), true),
        "0000000050-0000000000.partial"
    );
}
