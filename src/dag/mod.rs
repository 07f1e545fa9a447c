// src/dag/mod.rs

//! Module dependency graph.
//!
//! - [`graph`] builds the DAG of modules from a manifest's module list,
//!   rejects cycles, and answers the ancestor / staging queries the
//!   orchestrator plans its backfill from.

pub mod graph;

pub use graph::ModuleGraph;
