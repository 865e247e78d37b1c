//! Task dependency graph.
//!
//! Built from the manifest's task table before anything executes; rejects
//! self-dependencies and cycles up front and yields the execution order.

use crate::config::manifest::TaskSpec;
use petgraph::algo::{has_path_connecting, is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Dependency cycle: '{0}' -> '{1}'")]
    CycleDetected(String, String),

    #[error("Unknown task: '{0}'")]
    UnknownTask(String),

    #[error("Task '{0}' may not depend on itself")]
    SelfDependency(String),
}

/// Directed dependency graph over task names
#[derive(Debug, Default)]
pub struct TaskGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Build a graph from task specs; fails on self-deps, unknown deps or cycles
    pub fn from_specs<'a>(
        specs: impl IntoIterator<Item = &'a TaskSpec>,
    ) -> Result<Self, GraphError> {
        let specs: Vec<_> = specs.into_iter().collect();
        let mut graph = Self::new();

        for spec in &specs {
            graph.add_task(&spec.name);
        }
        for spec in &specs {
            for dep in &spec.depends_on {
                graph.add_dependency(&spec.name, dep)?;
            }
        }

        Ok(graph)
    }

    pub fn add_task(&mut self, name: &str) {
        if !self.node_map.contains_key(name) {
            let idx = self.graph.add_node(name.to_string());
            self.node_map.insert(name.to_string(), idx);
        }
    }

    /// Add an edge meaning "`depends_on` must complete before `task`"
    pub fn add_dependency(&mut self, task: &str, depends_on: &str) -> Result<(), GraphError> {
        if task == depends_on {
            return Err(GraphError::SelfDependency(task.to_string()));
        }

        let task_idx = *self
            .node_map
            .get(task)
            .ok_or_else(|| GraphError::UnknownTask(task.to_string()))?;
        let dep_idx = *self
            .node_map
            .get(depends_on)
            .ok_or_else(|| GraphError::UnknownTask(depends_on.to_string()))?;

        self.graph.add_edge(dep_idx, task_idx, ());

        if is_cyclic_directed(&self.graph) {
            if let Some(edge) = self.graph.find_edge(dep_idx, task_idx) {
                self.graph.remove_edge(edge);
            }
            return Err(GraphError::CycleDetected(
                task.to_string(),
                depends_on.to_string(),
            ));
        }

        Ok(())
    }

    /// Every task after all of its declared dependencies
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let idx = cycle.node_id();
                let node = self.graph.node_weight(idx).cloned().unwrap_or_default();
                // Name one real edge of the cycle: a dependent of this node
                // that can reach back to it
                let back = self
                    .graph
                    .neighbors_directed(idx, petgraph::Direction::Outgoing)
                    .find(|&n| has_path_connecting(&self.graph, n, idx, None))
                    .and_then(|n| self.graph.node_weight(n).cloned())
                    .unwrap_or_else(|| node.clone());
                Err(GraphError::CycleDetected(back, node))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, deps: &[&str]) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            sources: vec!["*.css".to_string()],
            dest: "out".into(),
            bundle: None,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            stages: vec![],
        }
    }

    #[test]
    fn empty_graph() {
        let graph = TaskGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let specs = [
            spec("c", &["b"]),
            spec("a", &[]),
            spec("b", &["a"]),
            spec("vendor", &[]),
        ];
        let graph = TaskGraph::from_specs(&specs).unwrap();
        let order = graph.topological_order().unwrap();

        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn cycle_detected() {
        let specs = [spec("a", &["c"]), spec("b", &["a"]), spec("c", &["b"])];
        let result = TaskGraph::from_specs(&specs);
        assert!(matches!(result, Err(GraphError::CycleDetected(_, _))));
    }

    #[test]
    fn cycle_error_names_a_real_edge() {
        let specs = [spec("a", &["c"]), spec("b", &["a"]), spec("c", &["b"])];
        let err = TaskGraph::from_specs(&specs).unwrap_err();
        match err {
            GraphError::CycleDetected(task, dep) => assert_ne!(task, dep),
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn self_dependency_rejected() {
        let specs = [spec("a", &["a"])];
        let result = TaskGraph::from_specs(&specs);
        assert!(matches!(result, Err(GraphError::SelfDependency(_))));
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut graph = TaskGraph::new();
        graph.add_task("a");
        let result = graph.add_dependency("a", "ghost");
        assert!(matches!(result, Err(GraphError::UnknownTask(_))));
    }
}
