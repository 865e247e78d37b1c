use super::SourceFile;
use crate::error::{StageError, StageResult};
use crate::pipeline::{PipeMap, PipeNode};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs as async_fs;
use tracing::{debug, info, warn};
use wax::Glob;

/// Source collector node - resolve the task's globs into file contents.
/// Globs are matched in declaration order; matches within one glob are
/// sorted, and a file is collected at most once.
pub struct SourceCollectorNode {
    task: String,
    base: PathBuf,
    patterns: Vec<String>,
}

impl SourceCollectorNode {
    pub fn new(task: impl Into<String>, base: PathBuf, patterns: Vec<String>) -> Self {
        Self {
            task: task.into(),
            base,
            patterns,
        }
    }
}

#[async_trait]
impl PipeNode for SourceCollectorNode {
    fn name(&self) -> String {
        "SourceCollector".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec![]
    }

    fn output(&self) -> Vec<String> {
        vec!["files".to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> StageResult<PipeMap> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut files: Vec<SourceFile> = Vec::new();

        for pattern in &self.patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| StageError::Pattern(format!("{pattern}: {e}")))?;

            let mut matched: Vec<PathBuf> = Vec::new();
            for entry in glob.walk(&self.base) {
                match entry {
                    Ok(entry) => {
                        let path = entry.path().to_path_buf();
                        if path.is_file() {
                            matched.push(path);
                        }
                    }
                    Err(e) => warn!("Skipping unreadable entry under {:?}: {}", self.base, e),
                }
            }
            matched.sort();

            for path in matched {
                if seen.insert(path.clone()) {
                    let text = async_fs::read_to_string(&path).await?;
                    debug!("Collected {:?}", path);
                    files.push(SourceFile::new(path, text));
                }
            }
        }

        if files.is_empty() {
            return Err(StageError::NoInputs {
                task: self.task.clone(),
            });
        }

        info!("Task '{}': collected {} source file(s)", self.task, files.len());
        data.insert("files", files);
        Ok(data)
    }
}

/// Concat node - join all collected files into a single bundle
pub struct ConcatNode;

#[async_trait]
impl PipeNode for ConcatNode {
    fn name(&self) -> String {
        "Concat".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec!["files".to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec!["bundle".to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> StageResult<PipeMap> {
        let files = data
            .get::<Vec<SourceFile>>("files")
            .ok_or_else(|| StageError::missing_input(self.name(), "files"))?;

        let mut bundle = String::new();
        for file in files {
            bundle.push_str(&file.text);
            if !file.text.ends_with('\n') {
                bundle.push('\n');
            }
        }

        debug!("Concatenated {} file(s), {} bytes", files.len(), bundle.len());
        data.insert("bundle", bundle);
        Ok(data)
    }
}

/// Writer node - flush the current artifact to the destination directory.
/// Used both as the final pipeline node and for checkpoint writes, so a task
/// can retain an intermediate artifact (e.g. the unminified bundle) next to
/// the final one.
pub struct WriterNode {
    dest: PathBuf,
}

impl WriterNode {
    pub fn new(dest: PathBuf) -> Self {
        Self { dest }
    }

    async fn write_one(&self, name: &str, text: &str) -> StageResult<()> {
        let path = self.dest.join(name);
        async_fs::write(&path, text).await?;
        info!("Wrote {:?} ({} bytes)", path, text.len());
        Ok(())
    }
}

#[async_trait]
impl PipeNode for WriterNode {
    fn name(&self) -> String {
        "Writer".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec!["files".to_string(), "bundle?".to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec![]
    }

    async fn process(&self, data: PipeMap) -> StageResult<PipeMap> {
        async_fs::create_dir_all(&self.dest).await?;

        if let Some(bundle) = data.get::<String>("bundle") {
            let name = data
                .get::<String>("bundle_name")
                .ok_or_else(|| StageError::missing_input(self.name(), "bundle_name"))?;
            self.write_one(name, bundle).await?;
        } else {
            let files = data
                .get::<Vec<SourceFile>>("files")
                .ok_or_else(|| StageError::missing_input(self.name(), "files"))?;
            for file in files {
                self.write_one(&file.name, &file.text).await?;
            }
        }

        Ok(data)
    }
}
