// src/types.rs

//! Module model shared by the graph, the planner and the remote requests.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

/// Whether a module is a stateless map or an accumulating store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Map,
    Store,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Map => f.write_str("map"),
            ModuleKind::Store => f.write_str("store"),
        }
    }
}

/// One declared input of a module.
///
/// In the manifest these read as `{ source = "sf.ethereum.type.v1.Block" }`,
/// `{ map = "map_transfers" }` or `{ store = "store_balances" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleInput {
    /// Raw chain data; never an edge in the module graph.
    Source(String),
    /// Output of another map module.
    Map(String),
    /// State of another store module.
    Store(String),
}

impl ModuleInput {
    /// Name of the module this input depends on, if any.
    pub fn module_name(&self) -> Option<&str> {
        match self {
            ModuleInput::Source(_) => None,
            ModuleInput::Map(name) | ModuleInput::Store(name) => Some(name.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Module {
    pub name: String,
    pub kind: ModuleKind,

    /// First block this module processes.
    #[serde(default)]
    pub initial_block: u64,

    #[serde(default)]
    pub inputs: Vec<ModuleInput>,

    /// Protobuf type of the output; for stores, the persisted value type.
    #[serde(default)]
    pub output_type: String,
}

impl Module {
    pub fn map(name: impl Into<String>) -> Self {
        Self::new(name, ModuleKind::Map)
    }

    pub fn store(name: impl Into<String>) -> Self {
        Self::new(name, ModuleKind::Store)
    }

    fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            initial_block: 0,
            inputs: Vec::new(),
            output_type: String::new(),
        }
    }

    pub fn is_store(&self) -> bool {
        self.kind == ModuleKind::Store
    }

    /// Names of the modules this one reads from, in declaration order.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().filter_map(ModuleInput::module_name)
    }
}

/// The full, immutable module set of one request.
pub type Modules = Arc<Vec<Module>>;
