// tests/task_group.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use substreams_orchestrator::exec::BoundedGroup;

#[tokio::test]
async fn all_tasks_succeed() {
    let done = Arc::new(AtomicUsize::new(0));
    let mut group: BoundedGroup<String> = BoundedGroup::new(2);

    for _ in 0..5 {
        let done = Arc::clone(&done);
        assert!(
            group
                .spawn(async move {
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
        );
    }

    assert_eq!(group.wait().await, Ok(()));
    assert_eq!(done.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn first_error_stops_new_tasks_but_drains_running_ones() {
    let finished = Arc::new(AtomicUsize::new(0));
    let mut group: BoundedGroup<String> = BoundedGroup::new(2);

    // Slow task that must be allowed to finish.
    {
        let finished = Arc::clone(&finished);
        group
            .spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
    }
    group.spawn(async { Err("boom".to_string()) }).await;

    // Both slots were taken; this one only gets a slot after the failure.
    let launched = group.spawn(async { Err("late".to_string()) }).await;
    assert!(!launched);
    assert!(group.stopped());

    assert_eq!(group.wait().await, Err("boom".to_string()));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn without_stop_on_error_every_task_runs() {
    let ran = Arc::new(AtomicUsize::new(0));
    let mut group: BoundedGroup<String> = BoundedGroup::with_policy(1, false);

    for i in 0..4 {
        let ran = Arc::clone(&ran);
        let launched = group
            .spawn(async move {
                ran.fetch_add(1, Ordering::SeqCst);
                if i == 1 { Err(format!("task {i}")) } else { Ok(()) }
            })
            .await;
        assert!(launched);
    }

    assert_eq!(group.wait().await, Err("task 1".to_string()));
    assert_eq!(ran.load(Ordering::SeqCst), 4);
}
