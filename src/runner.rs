//! Build runner: executes the task graph.
//!
//! Tasks run sequentially in topological order. A failing stage aborts only
//! its own task; transitive dependents are skipped, unrelated tasks still
//! run, and the report carries the per-task outcome.

use crate::config::manifest::{Environment, Manifest, TaskSpec};
use crate::config::tokens::TokenTable;
use crate::error::{ForgeError, Result};
use crate::graph::TaskGraph;
use crate::pipeline::nodes::basic::{SourceCollectorNode, WriterNode};
use crate::pipeline::{PipeMap, Pipeline, StageRegistry};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Outcome of one task in a build pass
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Succeeded,
    Failed(String),
    /// Not started because a dependency did not complete
    Skipped,
}

/// Per-task outcomes of one build pass, in execution order
#[derive(Debug, Default)]
pub struct BuildReport {
    pub outcomes: indexmap::IndexMap<String, TaskStatus>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.outcomes
            .values()
            .all(|s| matches!(s, TaskStatus::Succeeded))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, s)| matches!(s, TaskStatus::Failed(_)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, s)| matches!(s, TaskStatus::Skipped))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Run the manifest's tasks once. `only` restricts execution to the named
/// tasks (watch mode rebuilds affected tasks this way); unselected tasks are
/// treated as up to date. The dependency graph is validated before anything
/// executes, so a cycle fails the build with no task started.
pub async fn run_build(
    manifest: &Manifest,
    tokens: &TokenTable,
    env: Environment,
    only: Option<&HashSet<String>>,
) -> Result<BuildReport> {
    let graph = TaskGraph::from_specs(&manifest.tasks)?;
    let order = graph.topological_order()?;
    let registry = StageRegistry::standard();

    debug!("Execution order: {:?} (environment: {})", order, env);

    let mut report = BuildReport::default();

    for name in order {
        let Some(task) = manifest.task(&name) else {
            continue;
        };

        if let Some(filter) = only
            && !filter.contains(&name)
        {
            continue;
        }

        let blocked = task.depends_on.iter().find(|dep| {
            matches!(
                report.outcomes.get(dep.as_str()),
                Some(TaskStatus::Failed(_)) | Some(TaskStatus::Skipped)
            )
        });
        if let Some(dep) = blocked {
            warn!("Skipping task '{}': dependency '{}' did not complete", name, dep);
            report.outcomes.insert(name, TaskStatus::Skipped);
            continue;
        }

        info!("Running task '{}'", name);
        match run_task(task, manifest, tokens, env, &registry).await {
            Ok(()) => {
                report.outcomes.insert(name, TaskStatus::Succeeded);
            }
            Err(e) => {
                error!("Task '{}' failed: {}", name, e);
                report.outcomes.insert(name, TaskStatus::Failed(e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Assemble and execute one task's stage pipeline
async fn run_task(
    task: &TaskSpec,
    manifest: &Manifest,
    tokens: &TokenTable,
    env: Environment,
    registry: &StageRegistry,
) -> Result<()> {
    let pipeline = assemble_pipeline(task, manifest, env, registry)?;

    let mut data = PipeMap::new();
    data.insert("task", task.name.clone());
    data.insert("env", env);
    data.insert("tokens", tokens.clone());
    if let Some(bundle) = &task.bundle {
        data.insert("bundle_name", bundle.clone());
    }

    pipeline.execute(data).await.map_err(|source| ForgeError::Task {
        task: task.name.clone(),
        source,
    })?;

    Ok(())
}

/// Build the node sequence for a task: collector, declared stages filtered by
/// the environment flag (with checkpoint writes where requested), final write.
fn assemble_pipeline(
    task: &TaskSpec,
    manifest: &Manifest,
    env: Environment,
    registry: &StageRegistry,
) -> Result<Pipeline> {
    let dest = manifest.base_dir.join(&task.dest);

    let mut pipeline = Pipeline::new(format!("{}Pipeline", task.name)).add_node(Box::new(
        SourceCollectorNode::new(
            task.name.clone(),
            manifest.base_dir.clone(),
            task.sources.clone(),
        ),
    ));

    for stage in &task.stages {
        if !stage.enabled_for(env) {
            debug!(
                "Task '{}': stage '{}' disabled for {} builds",
                task.name, stage.kind, env
            );
            continue;
        }

        if stage.checkpoint {
            pipeline = pipeline.add_node(Box::new(WriterNode::new(dest.clone())));
        }

        let node = registry.create(stage).ok_or_else(|| {
            ForgeError::invalid_manifest(format!("unregistered stage kind '{}'", stage.kind))
        })?;
        pipeline = pipeline.add_node(node);
    }

    Ok(pipeline.add_node(Box::new(WriterNode::new(dest))))
}
