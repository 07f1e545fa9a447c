// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cycle detected in module graph: {0}")]
    DagCycle(String),

    #[error("could not find module {0} in graph")]
    ModuleNotFound(String),

    #[error("listing snapshots of store '{store}': {source:#}")]
    ListingError {
        store: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("grpc client factory: {0:#}")]
    ClientError(#[source] anyhow::Error),

    #[error("receiving stream resp: {0:#}")]
    StreamError(#[source] anyhow::Error),

    #[error("operation canceled")]
    Canceled,

    #[error("sending progress: {0:#}")]
    CallbackError(#[source] anyhow::Error),

    #[error("job {job} failed: {source}")]
    JobFailed {
        job: String,
        #[source]
        source: Box<OrchestratorError>,
    },

    #[error("squashing partial ranges of store '{store}': {source:#}")]
    SquashError {
        store: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Whether re-dispatching the same job on a fresh worker may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::ClientError(_) | OrchestratorError::StreamError(_)
        )
    }

    /// Whether this error (or the job error it wraps) is a cancellation.
    pub fn is_canceled(&self) -> bool {
        match self {
            OrchestratorError::Canceled => true,
            OrchestratorError::JobFailed { source, .. } => source.is_canceled(),
            _ => false,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OrchestratorError>;
