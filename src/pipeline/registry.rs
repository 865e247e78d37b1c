// Stage registry: maps the closed set of stage kinds to node factories.
// Built once at startup; unknown stage names never reach this table because
// the manifest parser rejects them.
use super::core::PipeNode;
use super::nodes::basic::ConcatNode;
use super::nodes::exec::ExecNode;
use super::nodes::lint::LintJsNode;
use super::nodes::minify::{CssMinifyNode, JsMinifyNode};
use super::nodes::text::{PrettifyNode, TokenReplaceNode};
use crate::config::constants;
use crate::config::manifest::{StageKind, StageSpec};
use std::collections::HashMap;

/// Factory function type for creating pipeline nodes from a stage entry
pub type NodeFactory = Box<dyn Fn(&StageSpec) -> Box<dyn PipeNode> + Send + Sync>;

/// Registry for stage nodes
pub struct StageRegistry {
    nodes: HashMap<StageKind, NodeFactory>,
}

impl StageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Registry with every built-in stage kind registered
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register(StageKind::Concat, |_| Box::new(ConcatNode));
        registry.register(StageKind::ReplaceTokens, |_| Box::new(TokenReplaceNode));
        registry.register(StageKind::Prettify, |spec| {
            Box::new(PrettifyNode::new(
                spec.indent.unwrap_or(constants::DEFAULT_INDENT),
            ))
        });
        registry.register(StageKind::MinifyCss, |spec| {
            Box::new(CssMinifyNode::new(spec.rename.clone()))
        });
        registry.register(StageKind::MinifyJs, |spec| {
            Box::new(JsMinifyNode::new(spec.rename.clone()))
        });
        registry.register(StageKind::LintJs, |_| Box::new(LintJsNode));
        registry.register(StageKind::Exec, |spec| {
            Box::new(ExecNode::new(spec.command.clone().unwrap_or_default()))
        });

        registry
    }

    /// Register a node factory for a stage kind
    pub fn register<F>(&mut self, kind: StageKind, factory: F)
    where
        F: Fn(&StageSpec) -> Box<dyn PipeNode> + Send + Sync + 'static,
    {
        self.nodes.insert(kind, Box::new(factory));
    }

    /// Create a node instance for a stage entry
    pub fn create(&self, spec: &StageSpec) -> Option<Box<dyn PipeNode>> {
        self.nodes.get(&spec.kind).map(|factory| factory(spec))
    }

    /// Check if a stage kind is registered
    pub fn contains(&self, kind: StageKind) -> bool {
        self.nodes.contains_key(&kind)
    }

    /// List all registered stage kinds
    pub fn kinds(&self) -> Vec<StageKind> {
        self.nodes.keys().copied().collect()
    }

    /// Get the number of registered stage kinds
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
