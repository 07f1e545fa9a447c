#![allow(dead_code)]

use substreams_orchestrator::config::{ConfigFile, ConfigSection, RawConfigFile};
use substreams_orchestrator::dag::ModuleGraph;
use substreams_orchestrator::types::{Module, ModuleInput, Modules};

pub const BLOCK_TYPE: &str = "sf.ethereum.type.v1.Block";

/// Builder for `Module`.
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn map(name: &str) -> Self {
        Self {
            module: Module::map(name),
        }
    }

    /// Store modules get a value type so they pass manifest validation.
    pub fn store(name: &str) -> Self {
        let mut module = Module::store(name);
        module.output_type = "bigint".to_string();
        Self { module }
    }

    pub fn initial_block(mut self, block: u64) -> Self {
        self.module.initial_block = block;
        self
    }

    pub fn source(mut self, ty: &str) -> Self {
        self.module.inputs.push(ModuleInput::Source(ty.to_string()));
        self
    }

    pub fn map_input(mut self, name: &str) -> Self {
        self.module.inputs.push(ModuleInput::Map(name.to_string()));
        self
    }

    pub fn store_input(mut self, name: &str) -> Self {
        self.module.inputs.push(ModuleInput::Store(name.to_string()));
        self
    }

    pub fn output_type(mut self, ty: &str) -> Self {
        self.module.output_type = ty.to_string();
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                modules: Vec::new(),
            },
        }
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.config.modules.push(module);
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.config.workers = n;
        self
    }

    pub fn chunk_size(mut self, n: u64) -> Self {
        self.config.config.chunk_size = Some(n);
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A small but complete module set:
///
/// ```text
/// map_transfers -> store_balances -> map_changes -> store_totals -> map_report
///               \-> store_counts ---/
/// ```
///
/// Staging groups for `map_report`, farthest first:
/// `[map_transfers]`, `[store_balances, store_counts]`, `[map_changes]`,
/// `[store_totals]`, `[map_report]`.
pub fn sample_modules() -> Vec<Module> {
    vec![
        ModuleBuilder::map("map_transfers").source(BLOCK_TYPE).build(),
        ModuleBuilder::store("store_balances")
            .map_input("map_transfers")
            .build(),
        ModuleBuilder::store("store_counts")
            .map_input("map_transfers")
            .build(),
        ModuleBuilder::map("map_changes")
            .store_input("store_balances")
            .store_input("store_counts")
            .build(),
        ModuleBuilder::store("store_totals")
            .map_input("map_changes")
            .build(),
        ModuleBuilder::map("map_report")
            .source(BLOCK_TYPE)
            .store_input("store_totals")
            .build(),
    ]
}

/// Single store `S` fed by a map `M` reading blocks; the request targets `S`.
pub fn store_and_map() -> Vec<Module> {
    vec![
        ModuleBuilder::map("M").source(BLOCK_TYPE).build(),
        ModuleBuilder::store("S").map_input("M").build(),
    ]
}

/// Store `S` reading blocks, and a map `M` reading `S`; the request targets `M`.
pub fn map_over_store() -> Vec<Module> {
    vec![
        ModuleBuilder::store("S").source(BLOCK_TYPE).build(),
        ModuleBuilder::map("M").store_input("S").build(),
    ]
}

/// Store `B` reads store `A`, and map `T` reads both, so `A` is one hop from
/// `T` directly and two hops through `B`.
pub fn stacked_stores() -> Vec<Module> {
    vec![
        ModuleBuilder::store("A").source(BLOCK_TYPE).build(),
        ModuleBuilder::store("B").store_input("A").build(),
        ModuleBuilder::map("T").store_input("A").store_input("B").build(),
    ]
}

pub fn graph_of(modules: Vec<Module>) -> ModuleGraph {
    ModuleGraph::new(modules).expect("module set should be acyclic")
}

pub fn module_set(modules: &[Module]) -> Modules {
    Modules::new(modules.to_vec())
}
