// Pipeline core - sequential stage execution framework

use super::PipeMap;
use crate::error::{StageError, StageResult};
use async_trait::async_trait;
use tracing::debug;

/// Pipeline node trait. Stage N's complete output is stage N+1's input.
/// Declared input/output keys are checked around every `process` call;
/// a trailing `?` marks a key as optional.
#[async_trait]
pub trait PipeNode: Send + Sync {
    fn name(&self) -> String;
    fn input(&self) -> Vec<String>;
    fn output(&self) -> Vec<String>;

    async fn process(&self, data: PipeMap) -> StageResult<PipeMap>;
}

/// Pipeline - orchestrates execution of nodes strictly in declared order
pub struct Pipeline {
    name: String,
    nodes: Vec<Box<dyn PipeNode>>,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    pub fn add_node(mut self, node: Box<dyn PipeNode>) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run every node in order, checking its declared inputs before and its
    /// declared outputs after. A failure aborts the remainder of the
    /// pipeline; the caller decides what it means for the build.
    pub async fn execute(&self, mut data: PipeMap) -> StageResult<PipeMap> {
        for node in &self.nodes {
            debug!("Pipeline '{}': running node '{}'", self.name, node.name());
            check_keys(&node.input(), &data, |key| {
                StageError::missing_input(node.name(), key)
            })?;
            data = node.process(data).await?;
            check_keys(&node.output(), &data, |key| StageError::MissingOutput {
                node: node.name(),
                declared: key,
            })?;
        }
        Ok(data)
    }
}

/// Keys ending in `?` are optional; every other declared key must be present
fn check_keys<E>(keys: &[String], data: &PipeMap, err: E) -> StageResult<()>
where
    E: Fn(String) -> StageError,
{
    for key in keys {
        if key.ends_with('?') {
            continue;
        }
        if !data.contains_key(key) {
            return Err(err(key.clone()));
        }
    }
    Ok(())
}
