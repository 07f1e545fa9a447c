#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};

use substreams_orchestrator::block::{format_ranges, BlockRange};
use substreams_orchestrator::exec::client::PARTIALS_WRITTEN_TRAILER;
use substreams_orchestrator::exec::{
    ClientFactory, Metadata, Request, Response, ResponseFunc, ResponseStream, StreamClient,
};

/// One scripted step of a fake streaming call.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(Response),
    Fail(String),
    Delay(Duration),
    /// Never yields again; only cancellation ends the call.
    Hang,
}

/// What a fake call does, from opening to its trailer.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub open_error: Option<String>,
    pub steps: Vec<Step>,
    pub trailer: Metadata,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, resp: Response) -> Self {
        self.steps.push(Step::Respond(resp));
        self
    }

    pub fn fail(mut self, msg: &str) -> Self {
        self.steps.push(Step::Fail(msg.to_string()));
        self
    }

    pub fn delay(mut self, d: Duration) -> Self {
        self.steps.push(Step::Delay(d));
        self
    }

    pub fn hang(mut self) -> Self {
        self.steps.push(Step::Hang);
        self
    }

    pub fn open_error(mut self, msg: &str) -> Self {
        self.open_error = Some(msg.to_string());
        self
    }

    /// Add a raw value to the `substreams-partials-written` trailer.
    pub fn partials_written(mut self, raw: &str) -> Self {
        self.trailer.append(PARTIALS_WRITTEN_TRAILER, raw);
        self
    }

    /// Trailer reporting exactly the request range as written.
    pub fn commit_request(self, req: &Request) -> Self {
        let range = BlockRange::new(req.start_block_num, req.stop_block_num);
        self.partials_written(&format_ranges(&[range]))
    }
}

/// A call as the fake client received it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: Request,
    pub metadata: Metadata,
}

type Scripter = Arc<dyn Fn(&Request, usize) -> Script + Send + Sync>;

/// Scripted `StreamClient`.
///
/// The scripter receives each request and the number of calls opened so far
/// for the same output modules and range (0 for the first attempt), so
/// retries can be scripted.
#[derive(Clone)]
pub struct FakeClient {
    scripter: Scripter,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeClient {
    pub fn new<F>(scripter: F) -> Self
    where
        F: Fn(&Request, usize) -> Script + Send + Sync + 'static,
    {
        Self {
            scripter: Arc::new(scripter),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every call commits its whole request range.
    pub fn committing() -> Self {
        Self::new(|req, _| Script::new().commit_request(req))
    }

    /// Like [`committing`](Self::committing), each call taking `d`.
    pub fn committing_after(d: Duration) -> Self {
        Self::new(move |req, _| Script::new().delay(d).commit_request(req))
    }

    /// Factory handing out this client.
    pub fn factory(&self) -> ClientFactory {
        let client = self.clone();
        Arc::new(move || Ok(Arc::new(client.clone()) as Arc<dyn StreamClient>))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// `module[start, end)` of every call, in call order.
    pub fn called_jobs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| {
                format!(
                    "{}{}",
                    c.request.output_modules.join(","),
                    BlockRange::new(c.request.start_block_num, c.request.stop_block_num)
                )
            })
            .collect()
    }

    /// Highest number of streams open at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl StreamClient for FakeClient {
    fn blocks(
        &self,
        request: Request,
        metadata: Metadata,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ResponseStream>>> + Send + '_>> {
        Box::pin(async move {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let attempt = calls
                    .iter()
                    .filter(|c| {
                        c.request.output_modules == request.output_modules
                            && c.request.start_block_num == request.start_block_num
                            && c.request.stop_block_num == request.stop_block_num
                    })
                    .count();
                calls.push(RecordedCall {
                    request: request.clone(),
                    metadata,
                });
                attempt
            };

            let script = (self.scripter)(&request, attempt);
            if let Some(msg) = script.open_error {
                return Err(anyhow!(msg));
            }

            let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(open, Ordering::SeqCst);

            Ok(Box::new(FakeStream {
                steps: script.steps.into(),
                trailer: script.trailer,
                in_flight: Arc::clone(&self.in_flight),
            }) as Box<dyn ResponseStream>)
        })
    }
}

struct FakeStream {
    steps: VecDeque<Step>,
    trailer: Metadata,
    in_flight: Arc<AtomicUsize>,
}

impl ResponseStream for FakeStream {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<Response>>> + Send + '_>> {
        Box::pin(async move {
            loop {
                match self.steps.pop_front() {
                    None => return Ok(None),
                    Some(Step::Respond(resp)) => return Ok(Some(resp)),
                    Some(Step::Fail(msg)) => return Err(anyhow!(msg)),
                    Some(Step::Delay(d)) => tokio::time::sleep(d).await,
                    Some(Step::Hang) => std::future::pending::<()>().await,
                }
            }
        })
    }

    fn trailer(&self) -> Metadata {
        self.trailer.clone()
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Factory that never produces a client.
pub fn failing_factory(msg: &'static str) -> ClientFactory {
    Arc::new(move || Err(anyhow!(msg)))
}

/// Response callback recording every event it receives.
pub fn recording_resp_fn() -> (ResponseFunc, Arc<Mutex<Vec<Response>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let resp_fn: ResponseFunc = Arc::new(move |resp: &Response| {
        sink.lock().unwrap().push(resp.clone());
        Ok(())
    });
    (resp_fn, seen)
}

/// Response callback rejecting every event.
pub fn failing_resp_fn(msg: &'static str) -> ResponseFunc {
    Arc::new(move |_: &Response| Err(anyhow!(msg)))
}

pub fn noop_resp_fn() -> ResponseFunc {
    Arc::new(|_: &Response| Ok(()))
}
