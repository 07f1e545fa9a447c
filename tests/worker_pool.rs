// tests/worker_pool.rs

mod common;
use crate::common::builders::{module_set, store_and_map};
use crate::common::{init_tracing, with_timeout, TestResult};

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::timeout;

use substreams_orchestrator::exec::WorkerPool;
use substreams_orchestrator_test_utils::fake_client::FakeClient;

fn pool(size: usize) -> WorkerPool {
    WorkerPool::new(size, module_set(&store_and_map()), FakeClient::committing().factory())
}

#[tokio::test]
async fn borrowing_beyond_size_waits_for_a_return() -> TestResult {
    init_tracing();
    let pool = pool(2);
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.available(), 2);

    let first = pool.borrow().await?;
    let second = pool.borrow().await?;
    assert_eq!(pool.available(), 0);
    assert_ne!(first.id(), second.id());

    // No worker left: the third borrow must not complete.
    assert!(timeout(Duration::from_millis(50), pool.borrow()).await.is_err());

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.borrow().await.map(|w| w.id()) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    let returned_id = first.id();
    drop(first);

    let id = with_timeout(waiter).await??;
    assert_eq!(id, returned_id);
    drop(second);
    Ok(())
}

#[tokio::test]
async fn concurrent_borrowers_get_distinct_workers() -> TestResult {
    let pool = pool(3);

    let a = pool.borrow().await?;
    let b = pool.borrow().await?;
    let c = pool.borrow().await?;
    let ids: HashSet<usize> = [a.id(), b.id(), c.id()].into_iter().collect();
    assert_eq!(ids.len(), 3);

    drop((a, b, c));
    assert_eq!(pool.available(), 3);
    Ok(())
}

#[tokio::test]
async fn worker_is_returned_when_the_borrower_panics() {
    let pool = pool(1);

    let borrower = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let _worker = pool.borrow().await.unwrap();
            panic!("borrower blew up");
        })
    };
    assert!(borrower.await.unwrap_err().is_panic());

    assert_eq!(pool.available(), 1);
    let worker = with_timeout(pool.borrow()).await;
    assert!(worker.is_ok());
}

#[tokio::test]
async fn worker_is_returned_when_the_borrower_is_aborted() {
    let pool = pool(1);

    let borrower = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let _worker = pool.borrow().await.unwrap();
            std::future::pending::<()>().await;
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.available(), 0);

    borrower.abort();
    assert!(borrower.await.unwrap_err().is_cancelled());

    assert_eq!(pool.available(), 1);
}
