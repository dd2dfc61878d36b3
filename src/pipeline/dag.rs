// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! Step-definition builder and dependency graph
//!
//! Turns raw pipeline steps into validated [`StepDefinition`]s: 1-based
//! indexes, derived ids, resolved `dependsOn` references. Forward and
//! self references are banned, so declaration order is already a valid
//! topological order; the petgraph view exists for graph rendering and
//! as a structural cycle check.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::errors::ForgeError;
use crate::pipeline::document::{PipelineDocument, RawStep};
use crate::tasks::TaskKind;

/// A validated pipeline step
#[derive(Debug, Clone)]
pub struct StepDefinition {
    /// 1-based position in the pipeline
    pub index: usize,
    /// Task kind
    pub task: TaskKind,
    /// Explicit id, or `<task>-<index>`
    pub id: String,
    /// Raw `dependsOn` entries as written
    pub depends_on: Vec<String>,
    /// Resolved dependency indexes: deduped, ascending, all < `index`
    pub dependency_indexes: Vec<usize>,
    /// The raw step JSON
    pub element: Value,
    /// Directory of the declaring document
    pub base_dir: PathBuf,
}

impl StepDefinition {
    /// Cache key for this step: `<stepIndex>:<task>`
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.index, self.task)
    }

    /// The step's `mode` tag, lowercased (empty when absent)
    pub fn mode(&self) -> String {
        self.element
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_lowercase()
    }

    /// Fetch a string option from the raw step
    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.element.get(key).and_then(Value::as_str)
    }

    /// Fetch a bool option from the raw step
    pub fn opt_bool(&self, key: &str) -> Option<bool> {
        self.element.get(key).and_then(Value::as_bool)
    }

    /// Resolve a string option as a path against the step's base dir
    pub fn opt_path(&self, key: &str) -> Option<PathBuf> {
        self.opt_str(key).map(|s| self.resolve(s))
    }

    /// Resolve a path against the step's base dir
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            p
        } else {
            self.base_dir.join(p)
        }
    }
}

/// Build validated step definitions from a loaded document
///
/// Steps with an empty or missing `task` are skipped. Indexes are
/// assigned to the surviving steps, starting at 1.
pub fn build_step_definitions(
    document: &PipelineDocument,
) -> Result<Vec<StepDefinition>, ForgeError> {
    let kept: Vec<&RawStep> = document
        .steps
        .iter()
        .filter(|s| !s.task().trim().is_empty())
        .collect();

    // First pass: indexes, ids, and the alias map.
    let mut definitions = Vec::with_capacity(kept.len());
    let mut aliases: HashMap<String, usize> = HashMap::new();

    for (i, raw) in kept.iter().enumerate() {
        let index = i + 1;
        let task_name = raw.task().trim().to_lowercase();
        let task = task_name
            .parse::<TaskKind>()
            .map_err(|_| ForgeError::UnknownTask {
                task: task_name.clone(),
            })?;

        let id = raw
            .element
            .get("id")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{}-{}", task_name, index));

        if aliases.contains_key(&id) {
            return Err(ForgeError::DuplicateStepId { id });
        }
        aliases.insert(id.clone(), index);
        aliases.insert(format!("{}#{}", task_name, index), index);
        // First-seen wins for the bare task name.
        aliases.entry(task_name.clone()).or_insert(index);

        let depends_on = parse_depends_on(&raw.element);

        definitions.push(StepDefinition {
            index,
            task,
            id,
            depends_on,
            dependency_indexes: Vec::new(),
            element: raw.element.clone(),
            base_dir: raw.base_dir.clone(),
        });
    }

    // Second pass: resolve dependsOn now that every alias is known.
    let total = definitions.len();
    for i in 0..total {
        let mut resolved = Vec::new();
        for dep in definitions[i].depends_on.clone() {
            let reference = dep.trim().to_lowercase();
            if reference.is_empty() {
                continue;
            }

            let target = if let Ok(number) = reference.parse::<usize>() {
                if number < 1 || number > total {
                    return Err(ForgeError::UnknownDependency {
                        step: definitions[i].id.clone(),
                        dependency: dep,
                    });
                }
                number
            } else {
                *aliases
                    .get(&reference)
                    .ok_or_else(|| ForgeError::UnknownDependency {
                        step: definitions[i].id.clone(),
                        dependency: dep.clone(),
                    })?
            };

            if target >= definitions[i].index {
                return Err(ForgeError::ForwardOrSelfDependency {
                    step: definitions[i].id.clone(),
                    target,
                });
            }

            resolved.push(target);
        }

        resolved.sort_unstable();
        resolved.dedup();
        definitions[i].dependency_indexes = resolved;
    }

    Ok(definitions)
}

/// `dependsOn` accepts a single string or an array of strings
fn parse_depends_on(element: &Value) -> Vec<String> {
    match element.get("dependsOn") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Dependency graph over step definitions
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    node_by_index: HashMap<usize, NodeIndex>,
    id_by_index: HashMap<usize, String>,
}

impl DependencyGraph {
    /// Build the graph from validated definitions
    pub fn build(definitions: &[StepDefinition]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_by_index = HashMap::new();
        let mut id_by_index = HashMap::new();

        for def in definitions {
            let node = graph.add_node(def.index);
            node_by_index.insert(def.index, node);
            id_by_index.insert(def.index, def.id.clone());
        }

        for def in definitions {
            let to = node_by_index[&def.index];
            for dep in &def.dependency_indexes {
                let from = node_by_index[dep];
                graph.add_edge(from, to, ());
            }
        }

        Self {
            graph,
            node_by_index,
            id_by_index,
        }
    }

    /// Structural cycle check
    ///
    /// Forward-reference validation already guarantees acyclicity; this
    /// is the belt-and-braces pass run by `powerforge validate`.
    pub fn is_acyclic(&self) -> bool {
        toposort(&self.graph, None).is_ok()
    }

    /// Direct dependency ids of a step
    pub fn dependencies(&self, index: usize) -> Vec<String> {
        let Some(node) = self.node_by_index.get(&index) else {
            return Vec::new();
        };
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Incoming)
            .map(|n| self.id_by_index[&self.graph[n]].clone())
            .collect();
        deps.sort();
        deps
    }

    /// Generate a Mermaid diagram of the pipeline
    pub fn to_mermaid(&self, definitions: &[StepDefinition]) -> String {
        let mut out = String::from("graph TD\n");

        for def in definitions {
            out.push_str(&format!("    {}[{}]\n", def.id, def.id));
        }

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                let from_id = &self.id_by_index[&self.graph[from]];
                let to_id = &self.id_by_index[&self.graph[to]];
                out.push_str(&format!("    {} --> {}\n", from_id, to_id));
            }
        }

        out
    }

    /// Generate a DOT diagram of the pipeline
    pub fn to_dot(&self, definitions: &[StepDefinition]) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                let from_id = &self.id_by_index[&self.graph[from]];
                let to_id = &self.id_by_index[&self.graph[to]];
                out.push_str(&format!("    \"{}\" -> \"{}\";\n", from_id, to_id));
            }
        }

        for def in definitions {
            let node = self.node_by_index[&def.index];
            if self.graph.neighbors_undirected(node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", def.id));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate a text listing of the execution order
    pub fn to_text(&self, definitions: &[StepDefinition]) -> String {
        let mut out = String::new();

        for def in definitions {
            let deps = self.dependencies(def.index);
            out.push_str(&format!("{}. {} ({})", def.index, def.id, def.task));
            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }
            out.push('\n');
        }

        out
    }
}
