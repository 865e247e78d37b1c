//! Watch mode: rebuild affected tasks on filesystem change.
//!
//! After the initial full build, each task's glob roots are watched. A change
//! re-runs only the tasks whose globs match the changed path; a change to the
//! metadata or overlay files re-runs the token-substituting tasks with a
//! freshly loaded table. A failing rebuild is logged and the loop keeps
//! watching. Runs until the process is terminated.

use crate::config::constants;
use crate::config::manifest::{Environment, Manifest};
use crate::config::tokens::TokenTable;
use crate::error::Result;
use crate::runner::run_build;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use wax::{CandidatePath, Glob, Pattern};

/// Precompiled change matcher for one task
pub struct TaskMatcher {
    name: String,
    base: PathBuf,
    globs: Vec<Glob<'static>>,
    substitutes_tokens: bool,
}

/// Compile every task's globs against the canonical manifest directory
pub fn build_matchers(manifest: &Manifest) -> Result<Vec<TaskMatcher>> {
    let base = manifest
        .base_dir
        .canonicalize()
        .unwrap_or_else(|_| manifest.base_dir.clone());

    let mut matchers = Vec::with_capacity(manifest.tasks.len());
    for task in &manifest.tasks {
        // Matching happens against paths relative to the manifest directory,
        // so the patterns stay in one piece here (no prefix split)
        let globs = task
            .sources
            .iter()
            .filter_map(|p| Glob::new(p).ok().map(Glob::into_owned))
            .collect();

        matchers.push(TaskMatcher {
            name: task.name.clone(),
            base: base.clone(),
            globs,
            substitutes_tokens: task.substitutes_tokens(),
        });
    }
    Ok(matchers)
}

/// Canonical metadata + overlay paths for the running environment
pub fn metadata_files(manifest: &Manifest, env: Environment) -> Vec<PathBuf> {
    [manifest.metadata_path(), manifest.overlay_path(env)]
        .into_iter()
        .flatten()
        .map(|p| p.canonicalize().unwrap_or(p))
        .collect()
}

/// Map a batch of changed paths to the set of tasks that must re-run
pub fn affected_tasks(
    matchers: &[TaskMatcher],
    metadata: &[PathBuf],
    changed: &HashSet<PathBuf>,
) -> HashSet<String> {
    let mut affected = HashSet::new();

    for path in changed {
        let path = path.canonicalize().unwrap_or_else(|_| path.clone());

        if metadata.contains(&path) {
            for matcher in matchers {
                if matcher.substitutes_tokens {
                    affected.insert(matcher.name.clone());
                }
            }
            continue;
        }

        for matcher in matchers {
            if affected.contains(&matcher.name) {
                continue;
            }
            let Ok(rel) = path.strip_prefix(&matcher.base) else {
                continue;
            };
            if matcher
                .globs
                .iter()
                .any(|g| g.is_match(CandidatePath::from(rel)))
            {
                affected.insert(matcher.name.clone());
            }
        }
    }

    affected
}

/// Watch for file changes, rebuild affected tasks and signal live clients
pub async fn watch_and_rebuild(
    manifest: Manifest,
    env: Environment,
    reload: broadcast::Sender<()>,
) -> Result<()> {
    let matchers = build_matchers(&manifest)?;
    let metadata = metadata_files(&manifest, env);
    let mut tokens = TokenTable::load(&manifest, env)?;

    let (tx, rx) = mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |res| {
            if let Err(e) = tx.send(res) {
                error!("Failed to send watch event: {}", e);
            }
        },
        Config::default(),
    )?;

    let mut watched: HashSet<PathBuf> = HashSet::new();
    for task in &manifest.tasks {
        for (prefix, _) in task.compiled_globs()? {
            let root = manifest.base_dir.join(prefix);
            let root = root.canonicalize().unwrap_or(root);
            if root.is_dir() {
                if watched.insert(root.clone()) {
                    watcher.watch(&root, RecursiveMode::Recursive)?;
                    debug!("Watching directory: {:?}", root);
                }
            } else if root.is_file()
                && let Some(parent) = root.parent()
                && watched.insert(parent.to_path_buf())
            {
                watcher.watch(parent, RecursiveMode::NonRecursive)?;
                debug!("Watching file parent directory: {:?}", parent);
            }
        }
    }
    for path in &metadata {
        if let Some(parent) = path.parent()
            && watched.insert(parent.to_path_buf())
        {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
            debug!("Watching metadata directory: {:?}", parent);
        }
    }

    debug!("File watcher initialized. Waiting for changes...");

    let mut pending_changes: HashSet<PathBuf> = HashSet::new();
    let mut last_event_time = std::time::Instant::now();
    let debounce = Duration::from_millis(constants::WATCH_DEBOUNCE_MS);

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(Ok(event)) => match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    if !event.paths.is_empty() {
                        pending_changes.extend(event.paths.iter().cloned());
                        last_event_time = std::time::Instant::now();
                    }
                }
                _ => {}
            },
            Ok(Err(e)) => {
                warn!("Watch error: {}", e);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if pending_changes.is_empty() || last_event_time.elapsed() < debounce {
                    continue;
                }
                let changed: HashSet<PathBuf> = pending_changes.drain().collect();

                let metadata_changed = changed
                    .iter()
                    .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
                    .any(|p| metadata.contains(&p));
                if metadata_changed {
                    match TokenTable::load(&manifest, env) {
                        Ok(table) => {
                            debug!("Reloaded token table ({} entries)", table.len());
                            tokens = table;
                        }
                        Err(e) => {
                            error!("Failed to reload token table: {}", e);
                            continue;
                        }
                    }
                }

                let affected = affected_tasks(&matchers, &metadata, &changed);
                if affected.is_empty() {
                    continue;
                }

                info!("Detected changes affecting task(s): {:?}", affected);
                match run_build(&manifest, &tokens, env, Some(&affected)).await {
                    Ok(report) if report.is_success() => {
                        debug!("Rebuild completed successfully");
                        // No receiver just means no connected client
                        let _ = reload.send(());
                    }
                    Ok(report) => {
                        error!("Rebuild finished with failed task(s): {:?}", report.failed());
                    }
                    Err(e) => {
                        error!("Rebuild failed: {}", e);
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                error!("Watch channel disconnected");
                break;
            }
        }
    }

    Ok(())
}
