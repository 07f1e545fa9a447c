// src/exec/mod.rs

//! Remote job execution layer.
//!
//! This module is responsible for running backfill jobs on remote executors
//! and reporting which partial ranges they committed.
//!
//! - [`client`] defines the remote execution collaborator (streaming client,
//!   request / response events, call metadata).
//! - [`job`] is the unit of dispatchable work.
//! - [`worker`] drives one streaming call per job.
//! - [`pool`] bounds how many workers run at once and lends them out.
//! - [`group`] is the bounded "stop on first error, drain in-flight" task
//!   group shared by the storage listing and the orchestrator.

pub mod client;
pub mod group;
pub mod job;
pub mod pool;
pub mod worker;

pub use client::{
    ClientFactory, Metadata, Request, Response, ResponseFunc, ResponseStream, StreamClient,
};
pub use group::BoundedGroup;
pub use job::Job;
pub use pool::{PooledWorker, WorkerPool};
pub use worker::Worker;
