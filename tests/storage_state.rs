// tests/storage_state.rs

mod common;
use crate::common::{init_tracing, with_timeout, TestResult};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use substreams_orchestrator::block::BlockRange;
use substreams_orchestrator::errors::OrchestratorError;
use substreams_orchestrator::storage::{Snapshot, Snapshots, StorageState};
use substreams_orchestrator_test_utils::fake_lister::FakeLister;

#[tokio::test]
async fn fetch_lists_every_store() -> TestResult {
    init_tracing();

    let lister = FakeLister::new()
        .with_full("A", 0, 100)
        .with_full("A", 100, 200);
    let cancel = CancellationToken::new();

    let state = StorageState::fetch(&cancel, Arc::new(lister.clone()), ["A", "B"], 10).await?;

    assert_eq!(state.len(), 2);
    assert_eq!(state.snapshots("A").map(|s| s.len()), Some(2));
    assert_eq!(state.snapshots("B").map(|s| s.is_empty()), Some(true));
    assert!(state.snapshots("C").is_none());

    let mut started = lister.started();
    started.sort();
    assert_eq!(started, vec!["A", "B"]);
    Ok(())
}

#[tokio::test]
async fn first_listing_error_stops_new_listings() -> TestResult {
    init_tracing();

    let lister = FakeLister::new().with_full("A", 0, 10).failing("B");
    let cancel = CancellationToken::new();

    let result = StorageState::fetch(&cancel, Arc::new(lister.clone()), ["A", "B", "C"], 1).await;

    match result {
        Err(OrchestratorError::ListingError { store, source }) => {
            assert_eq!(store, "B");
            assert!(source.to_string().contains("unreachable"));
        }
        Err(e) => panic!("Expected ListingError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }

    // With one listing at a time, C cannot have started once B failed.
    assert_eq!(lister.started(), vec!["A", "B"]);
    Ok(())
}

#[tokio::test]
async fn listing_error_message_names_the_store() {
    let lister = FakeLister::new().failing("store_balances");
    let cancel = CancellationToken::new();

    let err = StorageState::fetch(&cancel, Arc::new(lister), ["store_balances"], 4)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("store_balances"));
}

#[tokio::test]
async fn cancelled_token_returns_canceled() {
    let lister = FakeLister::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = StorageState::fetch(&cancel, Arc::new(lister.clone()), ["A"], 4).await;
    assert!(matches!(result, Err(OrchestratorError::Canceled)));
    assert!(lister.started().is_empty());
}

#[tokio::test]
async fn cancel_interrupts_slow_listings() {
    let lister = FakeLister::new().with_delay(Duration::from_secs(60));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = with_timeout(StorageState::fetch(&cancel, Arc::new(lister), ["A", "B"], 4)).await;
    assert!(matches!(result, Err(OrchestratorError::Canceled)));
}

#[test]
fn missing_ranges_are_the_uncovered_gaps() {
    let snapshots = Snapshots::new(vec![
        Snapshot::full(BlockRange::new(0, 100), "0000000100-0000000000.kv"),
        Snapshot::partial(BlockRange::new(200, 300), "0000000300-0000000200.partial"),
    ]);

    assert_eq!(
        snapshots.missing_ranges(BlockRange::new(0, 400)),
        vec![BlockRange::new(100, 200), BlockRange::new(300, 400)]
    );
    assert_eq!(
        snapshots.missing_ranges(BlockRange::new(0, 150)),
        vec![BlockRange::new(100, 150)]
    );
    assert!(snapshots.missing_ranges(BlockRange::new(0, 100)).is_empty());
    assert!(snapshots.missing_ranges(BlockRange::new(0, 50)).is_empty());
    assert!(snapshots.missing_ranges(BlockRange::new(220, 280)).is_empty());
}

#[test]
fn overlapping_snapshots_are_merged() {
    let snapshots = Snapshots::new(vec![
        Snapshot::partial(BlockRange::new(50, 150), "b"),
        Snapshot::full(BlockRange::new(0, 100), "a"),
    ]);

    assert_eq!(
        snapshots.missing_ranges(BlockRange::new(0, 200)),
        vec![BlockRange::new(150, 200)]
    );
    assert_eq!(
        Snapshots::default().missing_ranges(BlockRange::new(10, 20)),
        vec![BlockRange::new(10, 20)]
    );
}

#[test]
fn backfill_ranges_redo_the_tail_of_a_straddling_snapshot() {
    let snapshots = Snapshots::new(vec![Snapshot::full(BlockRange::new(0, 100), "a")]);

    assert_eq!(
        snapshots.backfill_ranges(BlockRange::new(0, 50)),
        vec![BlockRange::new(50, 100)]
    );
    assert!(snapshots.backfill_ranges(BlockRange::new(0, 100)).is_empty());
    assert_eq!(
        snapshots.backfill_ranges(BlockRange::new(0, 150)),
        vec![BlockRange::new(100, 150)]
    );

    let holed = Snapshots::new(vec![
        Snapshot::full(BlockRange::new(0, 100), "a"),
        Snapshot::partial(BlockRange::new(200, 300), "b"),
    ]);
    assert_eq!(
        holed.backfill_ranges(BlockRange::new(0, 250)),
        vec![BlockRange::new(100, 200), BlockRange::new(250, 300)]
    );
}

#[test]
fn last_full_block_ignores_partials() {
    let snapshots = Snapshots::new(vec![
        Snapshot::full(BlockRange::new(0, 100), "a"),
        Snapshot::partial(BlockRange::new(100, 200), "b"),
    ]);
    assert_eq!(snapshots.last_full_block(), Some(100));
    assert_eq!(Snapshots::default().last_full_block(), None);

    // sorted by end block
    let ends: Vec<u64> = snapshots.iter().map(|s| s.range.exclusive_end_block).collect();
    assert_eq!(ends, vec![100, 200]);
}
