// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::orchestrator::OrchestratorOptions;
use crate::types::{Module, Modules};

/// Manifest as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 4
/// chunk_size = 1000
/// state_store = "./localdata"
///
/// [[module]]
/// name = "map_transfers"
/// kind = "map"
/// initial_block = 12000000
/// output_type = "proto:eth.erc20.v1.Transfers"
/// inputs = [{ source = "sf.ethereum.type.v1.Block" }]
///
/// [[module]]
/// name = "store_balances"
/// kind = "store"
/// initial_block = 12000000
/// output_type = "bigint"
/// inputs = [{ map = "map_transfers" }]
/// ```
///
/// Modules keep their declaration order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default, rename = "module")]
    pub modules: Vec<Module>,
}

/// Validated manifest. Only obtainable through `TryFrom<RawConfigFile>`
/// (see `config::validate`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub modules: Vec<Module>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, modules: Vec<Module>) -> Self {
        Self { config, modules }
    }

    /// The module list as the shared set sent with every remote request.
    pub fn module_set(&self) -> Modules {
        Modules::new(self.modules.clone())
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            chunk_size: self.config.chunk_size,
            fail_fast: self.config.fail_fast,
            job_retries: self.config.job_retries,
        }
    }
}

/// `[config]` section: orchestration settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Size of the worker pool, i.e. concurrent remote jobs.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Concurrent store listings while fetching the storage state.
    #[serde(default = "default_listing_concurrency")]
    pub listing_concurrency: usize,

    /// Maximum blocks per job; unset means one job per missing range.
    #[serde(default)]
    pub chunk_size: Option<u64>,

    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,

    #[serde(default)]
    pub job_retries: u32,

    /// Root directory of the local state store.
    #[serde(default = "default_state_store")]
    pub state_store: PathBuf,
}

fn default_workers() -> usize {
    4
}

fn default_listing_concurrency() -> usize {
    10
}

fn default_fail_fast() -> bool {
    true
}

fn default_state_store() -> PathBuf {
    PathBuf::from("./localdata")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            listing_concurrency: default_listing_concurrency(),
            chunk_size: None,
            fail_fast: default_fail_fast(),
            job_retries: 0,
            state_store: default_state_store(),
        }
    }
}
