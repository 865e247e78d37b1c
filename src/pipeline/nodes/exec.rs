use super::SourceFile;
use crate::error::{StageError, StageResult};
use crate::pipeline::{PipeMap, PipeNode};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Exec node - pipe the artifact through an external command's stdin/stdout.
/// This is how real compilers (Sass and friends) plug into a pipeline; a
/// non-zero exit aborts the task with the tool's stderr as the diagnostic.
pub struct ExecNode {
    command: String,
}

impl ExecNode {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn tool(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or("<exec>")
    }

    async fn run(&self, input: &str) -> StageResult<String> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| StageError::tool("<exec>", "empty command line"))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StageError::tool(program, e.to_string()))?;

        // Feed stdin from its own task: writing the whole artifact before
        // reading stdout deadlocks once the tool fills the stdout pipe
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = input.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&bytes).await {
                    debug!("Child stdin closed early: {}", e);
                }
                // Dropping stdin closes the pipe so the tool sees EOF
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| StageError::tool(program, e.to_string()))?;

        if !output.status.success() {
            return Err(StageError::tool(
                program,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| StageError::tool(program, format!("non-UTF-8 output: {e}")))
    }
}

#[async_trait]
impl PipeNode for ExecNode {
    fn name(&self) -> String {
        format!("Exec({})", self.tool())
    }

    fn input(&self) -> Vec<String> {
        vec!["files".to_string(), "bundle?".to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec!["files".to_string(), "bundle?".to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> StageResult<PipeMap> {
        if let Some(bundle) = data.get::<String>("bundle") {
            debug!("Piping bundle through '{}'", self.command);
            let out = self.run(bundle).await?;
            data.insert("bundle", out);
            return Ok(data);
        }

        let files = data
            .get::<Vec<SourceFile>>("files")
            .ok_or_else(|| StageError::missing_input(self.name(), "files"))?;

        let mut out = files.clone();
        for file in &mut out {
            debug!("Piping {:?} through '{}'", file.path, self.command);
            file.text = self.run(&file.text).await?;
        }
        data.insert("files", out);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipes_bundle_through_command() {
        let node = ExecNode::new("cat");
        let mut data = PipeMap::new();
        data.insert("bundle", String::from("hello"));
        let out = node.process(data).await.unwrap();
        assert_eq!(out.get::<String>("bundle"), Some(&String::from("hello")));
    }

    #[tokio::test]
    async fn large_bundle_streams_through_command() {
        // Well past the OS pipe buffer size
        let big = "x".repeat(4 * 1024 * 1024);
        let node = ExecNode::new("cat");
        let mut data = PipeMap::new();
        data.insert("bundle", big.clone());
        let out = node.process(data).await.unwrap();
        assert_eq!(out.get::<String>("bundle").map(String::len), Some(big.len()));
    }

    #[tokio::test]
    async fn failing_command_reports_tool_error() {
        let node = ExecNode::new("false");
        let mut data = PipeMap::new();
        data.insert("bundle", String::from("x"));
        let err = node.process(data).await.unwrap_err();
        assert!(matches!(err, StageError::Tool { .. }));
    }

    #[tokio::test]
    async fn unknown_command_reports_tool_error() {
        let node = ExecNode::new("definitely-not-a-real-tool");
        let mut data = PipeMap::new();
        data.insert("bundle", String::from("x"));
        let err = node.process(data).await.unwrap_err();
        assert!(matches!(err, StageError::Tool { .. }));
    }
}
