// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::{dijkstra, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::errors::{OrchestratorError, Result};
use crate::types::{Module, ModuleInput};

/// Dependency graph of the modules of one request.
///
/// Node `i` is `modules[i]`; there is an edge `i -> j` whenever module `i`
/// declares a map or store input naming module `j`. The graph is checked for
/// cycles once, at construction, and never mutated afterwards, so every query
/// below can run concurrently without locking.
///
/// Query results follow manifest order.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    graph: DiGraph<usize, ()>,
    modules: Vec<Module>,
    module_index: HashMap<String, usize>,
    /// Dependencies first.
    topo_order: Vec<usize>,
}

impl ModuleGraph {
    /// Build the graph, failing if the module dependencies contain a cycle.
    ///
    /// Inputs naming a module that is not part of `modules` do not produce an
    /// edge; the manifest validation reports those separately.
    pub fn new(modules: Vec<Module>) -> Result<Self> {
        let mut module_index = HashMap::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            if module_index.insert(module.name.clone(), i).is_some() {
                return Err(OrchestratorError::ConfigError(format!(
                    "module '{}' is declared more than once",
                    module.name
                )));
            }
        }

        let mut graph = DiGraph::with_capacity(modules.len(), modules.len());
        for i in 0..modules.len() {
            graph.add_node(i);
        }

        for (i, module) in modules.iter().enumerate() {
            for dep in module.dependency_names() {
                if let Some(&j) = module_index.get(dep) {
                    graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
                }
            }
        }

        // Edges point from dependent to dependency, so the sort yields
        // dependents first; reverse it.
        let order = toposort(&graph, None).map_err(|cycle| {
            let name = &modules[cycle.node_id().index()].name;
            OrchestratorError::DagCycle(format!(
                "cycle detected in module graph involving module '{}'",
                name
            ))
        })?;
        let topo_order = order.into_iter().rev().map(|n| n.index()).collect();

        Ok(Self {
            graph,
            modules,
            module_index,
            topo_order,
        })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// All modules, in manifest order.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.module_index.get(name).map(|&i| &self.modules[i])
    }

    /// All modules ordered so that every dependency precedes its dependents.
    pub fn topological_order(&self) -> Vec<&Module> {
        self.topo_order.iter().map(|&i| &self.modules[i]).collect()
    }

    /// Every module reachable from `name` (distance >= 1).
    pub fn ancestors_of(&self, name: &str) -> Result<Vec<&Module>> {
        self.select(name, |d, _| d >= 1)
    }

    /// Store modules among [`ancestors_of`](Self::ancestors_of).
    pub fn ancestor_stores_of(&self, name: &str) -> Result<Vec<&Module>> {
        self.select(name, |d, m| d >= 1 && m.is_store())
    }

    /// Immediate dependencies of `name` (distance == 1).
    pub fn parents_of(&self, name: &str) -> Result<Vec<&Module>> {
        self.select(name, |d, _| d == 1)
    }

    /// `name` itself plus all its ancestors.
    pub fn modules_down_to(&self, name: &str) -> Result<Vec<&Module>> {
        self.select(name, |_, _| true)
    }

    /// Store modules among [`modules_down_to`](Self::modules_down_to).
    pub fn stores_down_to(&self, name: &str) -> Result<Vec<&Module>> {
        self.select(name, |_, m| m.is_store())
    }

    /// [`modules_down_to`](Self::modules_down_to) grouped by distance from
    /// `name`, farthest group first and `name` alone in the last group.
    ///
    /// A module reachable through paths of different lengths is placed by
    /// its shortest one, so a group may hold a module together with one of
    /// its dependencies. Backfill stages are therefore planned by dependency
    /// depth instead.
    pub fn grouped_modules_down_to(&self, name: &str) -> Result<Vec<Vec<&Module>>> {
        let distances = self.distances_from(name)?;

        let mut by_distance: BTreeMap<u32, Vec<&Module>> = BTreeMap::new();
        for (i, module) in self.modules.iter().enumerate() {
            if let Some(&d) = distances.get(&i) {
                by_distance.entry(d).or_default().push(module);
            }
        }

        Ok(by_distance.into_values().rev().collect())
    }

    /// First block processed by `name`.
    pub fn module_start_block(&self, name: &str) -> Result<u64> {
        self.module(name)
            .map(|m| m.initial_block)
            .ok_or_else(|| OrchestratorError::ModuleNotFound(name.to_string()))
    }

    /// Render the graph as a Mermaid flowchart, data flowing top-down.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD;\n");
        for module in &self.modules {
            out.push_str(&format!("  {}[{}: {}];\n", module.name, module.kind, module.name));
            for input in &module.inputs {
                let line = match input {
                    ModuleInput::Source(ty) => {
                        format!("  {ty}[source: {ty}] --> {};\n", module.name)
                    }
                    ModuleInput::Map(dep) => format!("  {dep} --> {};\n", module.name),
                    ModuleInput::Store(dep) => format!("  {dep} -- store --> {};\n", module.name),
                };
                out.push_str(&line);
            }
        }
        out
    }

    fn select<F>(&self, name: &str, keep: F) -> Result<Vec<&Module>>
    where
        F: Fn(u32, &Module) -> bool,
    {
        let distances = self.distances_from(name)?;
        Ok(self
            .modules
            .iter()
            .enumerate()
            .filter_map(|(i, m)| match distances.get(&i) {
                Some(&d) if keep(d, m) => Some(m),
                _ => None,
            })
            .collect())
    }

    /// Shortest path length from `name` to every reachable module, keyed by
    /// module index. Recomputed on every call.
    fn distances_from(&self, name: &str) -> Result<HashMap<usize, u32>> {
        let &start = self
            .module_index
            .get(name)
            .ok_or_else(|| OrchestratorError::ModuleNotFound(name.to_string()))?;

        let costs = dijkstra(&self.graph, NodeIndex::new(start), None, |_| 1u32);
        Ok(costs.into_iter().map(|(n, d)| (n.index(), d)).collect())
    }
}
