// tests/worker_run.rs

mod common;
use crate::common::builders::{module_set, store_and_map};
use crate::common::{init_tracing, with_timeout, TestResult};

use std::time::{Duration, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use substreams_orchestrator::block::BlockRange;
use substreams_orchestrator::errors::OrchestratorError;
use substreams_orchestrator::exec::client::{
    BlockScopedData, Clock, ModuleOutput, ModuleProgress, SnapshotData, PARTIAL_MODE_HEADER,
};
use substreams_orchestrator::exec::{ClientFactory, Job, Response, Worker};
use substreams_orchestrator_test_utils::fake_client::{
    failing_factory, failing_resp_fn, noop_resp_fn, recording_resp_fn, FakeClient, Script,
};

fn worker(factory: ClientFactory) -> Worker {
    Worker::new(0, module_set(&store_and_map()), factory)
}

fn job() -> Job {
    Job::new("S", BlockRange::new(200, 300))
}

fn progress() -> Response {
    Response::Progress(vec![ModuleProgress {
        name: "S".to_string(),
        processed_ranges: vec![BlockRange::new(200, 250)],
        failed: false,
        failure_reason: None,
    }])
}

#[tokio::test]
async fn trailer_reports_the_written_ranges() -> TestResult {
    init_tracing();
    let client = FakeClient::new(|_, _| Script::new().partials_written("[200,300)"));

    let ranges = worker(client.factory())
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await?;

    assert_eq!(ranges, vec![BlockRange::new(200, 300)]);
    Ok(())
}

#[tokio::test]
async fn several_ranges_in_one_trailer() -> TestResult {
    let client =
        FakeClient::new(|_, _| Script::new().partials_written("[200, 250),[250, 300)"));

    let ranges = worker(client.factory())
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await?;

    assert_eq!(
        ranges,
        vec![BlockRange::new(200, 250), BlockRange::new(250, 300)]
    );
    Ok(())
}

#[tokio::test]
async fn every_trailer_value_is_reported() -> TestResult {
    let client = FakeClient::new(|_, _| {
        Script::new()
            .partials_written("[200,250)")
            .partials_written("250-300")
    });

    let ranges = worker(client.factory())
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await?;

    assert_eq!(
        ranges,
        vec![BlockRange::new(200, 250), BlockRange::new(250, 300)]
    );
    Ok(())
}

#[tokio::test]
async fn missing_trailer_means_nothing_written() -> TestResult {
    let client = FakeClient::new(|_, _| Script::new());

    let ranges = worker(client.factory())
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await?;

    assert!(ranges.is_empty());
    Ok(())
}

#[tokio::test]
async fn request_is_a_partial_call_for_the_job() -> TestResult {
    let client = FakeClient::committing();

    worker(client.factory())
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await?;

    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.metadata.get(PARTIAL_MODE_HEADER), Some("true"));
    assert_eq!(call.request.output_modules, vec!["S".to_string()]);
    assert_eq!(call.request.start_block_num, 200);
    assert_eq!(call.request.stop_block_num, 300);
    assert_eq!(call.request.modules.len(), 2);
    Ok(())
}

#[tokio::test]
async fn only_progress_reaches_the_callback() -> TestResult {
    let client = FakeClient::new(|_, _| {
        Script::new()
            .respond(progress())
            .respond(Response::SnapshotData(SnapshotData {
                module_name: "S".to_string(),
                sent_keys: 10,
                total_keys: 20,
            }))
            .respond(Response::SnapshotComplete)
            .respond(Response::Data(BlockScopedData {
                clock: Clock {
                    id: "0xabc".to_string(),
                    number: 201,
                    timestamp: Some(UNIX_EPOCH),
                },
                outputs: vec![ModuleOutput {
                    name: "S".to_string(),
                    data: vec![1, 2, 3],
                }],
            }))
            .partials_written("[200,300)")
    });
    let (resp_fn, seen) = recording_resp_fn();

    let ranges = worker(client.factory())
        .run(&CancellationToken::new(), &job(), &resp_fn)
        .await?;

    assert_eq!(ranges, vec![BlockRange::new(200, 300)]);
    assert_eq!(*seen.lock().unwrap(), vec![progress()]);
    Ok(())
}

#[tokio::test]
async fn cancel_mid_stream_credits_nothing() {
    init_tracing();
    let client = FakeClient::new(|_, _| {
        Script::new()
            .respond(progress())
            .hang()
            .partials_written("[200,300)")
    });
    let (resp_fn, seen) = recording_resp_fn();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = with_timeout(worker(client.factory()).run(&cancel, &job(), &resp_fn)).await;

    assert!(matches!(result, Err(OrchestratorError::Canceled)));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_before_start() {
    let client = FakeClient::committing();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = worker(client.factory())
        .run(&cancel, &job(), &noop_resp_fn())
        .await;
    assert!(matches!(result, Err(OrchestratorError::Canceled)));
}

#[tokio::test]
async fn callback_error_aborts_the_job() {
    let client = FakeClient::new(|_, _| {
        Script::new().respond(progress()).partials_written("[200,300)")
    });

    let result = worker(client.factory())
        .run(&CancellationToken::new(), &job(), &failing_resp_fn("ui gone"))
        .await;

    match result {
        Err(err @ OrchestratorError::CallbackError(_)) => {
            assert!(!err.is_retryable());
            assert!(err.to_string().contains("ui gone"));
        }
        other => panic!("Expected CallbackError, got: {:?}", other),
    }
}

#[tokio::test]
async fn factory_error_is_a_client_error() {
    let result = worker(failing_factory("no endpoint"))
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await;

    match result {
        Err(err @ OrchestratorError::ClientError(_)) => {
            assert!(err.is_retryable());
            assert!(err.to_string().contains("no endpoint"));
        }
        other => panic!("Expected ClientError, got: {:?}", other),
    }
}

#[tokio::test]
async fn stream_failures_are_stream_errors() {
    let mid_stream =
        FakeClient::new(|_, _| Script::new().respond(progress()).fail("connection reset"));
    let result = worker(mid_stream.factory())
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await;
    match result {
        Err(err @ OrchestratorError::StreamError(_)) => {
            assert!(err.to_string().contains("connection reset"));
        }
        other => panic!("Expected StreamError, got: {:?}", other),
    }

    let on_open = FakeClient::new(|_, _| Script::new().open_error("unavailable"));
    let result = worker(on_open.factory())
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await;
    assert!(matches!(result, Err(OrchestratorError::StreamError(_))));
}

#[tokio::test]
async fn unparsable_trailer_is_a_stream_error() {
    let client = FakeClient::new(|_, _| Script::new().partials_written("not ranges"));

    let result = worker(client.factory())
        .run(&CancellationToken::new(), &job(), &noop_resp_fn())
        .await;
    assert!(matches!(result, Err(OrchestratorError::StreamError(_))));
}
