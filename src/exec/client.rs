// src/exec/client.rs

//! Remote execution collaborator.
//!
//! The orchestrator never talks to the transport directly: it asks a
//! [`ClientFactory`] for a [`StreamClient`], opens one streaming call per job
//! and consumes [`Response`] events from the returned [`ResponseStream`].
//! A gRPC implementation maps these onto its generated client; tests plug in
//! scripted fakes.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;

use crate::block::BlockRange;
use crate::types::Modules;

/// Call annotation marking a request as a partial (backfill) computation.
pub const PARTIAL_MODE_HEADER: &str = "substreams-partial-mode";

/// Trailer listing the ranges a partial computation committed.
pub const PARTIALS_WRITTEN_TRAILER: &str = "substreams-partials-written";

/// Out-of-band call metadata (headers or trailers), multi-valued per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, Vec<String>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `key` with `value`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(|s| s.as_str())
    }

    /// Every value of `key`, in the order they were added.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Streaming request sent for one job.
#[derive(Debug, Clone)]
pub struct Request {
    pub start_block_num: u64,
    pub stop_block_num: u64,
    pub output_modules: Vec<String>,
    pub modules: Modules,
}

/// Block reference attached to data events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    pub id: String,
    pub number: u64,
    pub timestamp: Option<SystemTime>,
}

/// Processing progress of one module on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProgress {
    pub name: String,
    pub processed_ranges: Vec<BlockRange>,
    pub failed: bool,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotData {
    pub module_name: String,
    pub sent_keys: u64,
    pub total_keys: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutput {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockScopedData {
    pub clock: Clock,
    pub outputs: Vec<ModuleOutput>,
}

/// One event of a streaming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Progress(Vec<ModuleProgress>),
    SnapshotData(SnapshotData),
    SnapshotComplete,
    Data(BlockScopedData),
}

/// Receiving half of an open streaming call.
pub trait ResponseStream: Send {
    /// Next event; `Ok(None)` once the remote side closed the stream cleanly.
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<Response>>> + Send + '_>>;

    /// Trailing metadata; meaningful once `recv` returned `Ok(None)`.
    fn trailer(&self) -> Metadata;
}

/// Opens streaming calls against a remote executor.
pub trait StreamClient: Send + Sync {
    fn blocks(
        &self,
        request: Request,
        metadata: Metadata,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ResponseStream>>> + Send + '_>>;
}

/// Produces a client for each job.
pub type ClientFactory = Arc<dyn Fn() -> Result<Arc<dyn StreamClient>> + Send + Sync>;

/// Receives the progress events of running jobs.
pub type ResponseFunc = Arc<dyn Fn(&Response) -> Result<()> + Send + Sync>;
