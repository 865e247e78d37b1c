/// Stage-level error taxonomy
///
/// A stage failure aborts the task that owns the pipeline, never the whole
/// build: the runner records the failure, skips dependents and keeps going.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    /// A checker stage found malformed input. Reported with file/line context.
    #[error("{file}:{line}: {message}")]
    Lint {
        file: String,
        line: usize,
        message: String,
    },

    /// An external tool invoked by a stage failed; carries its diagnostic.
    #[error("'{tool}' failed: {diagnostic}")]
    Tool { tool: String, diagnostic: String },

    #[error("Missing required input '{required}' for node '{node}'")]
    MissingInput { node: String, required: String },

    #[error("Node '{node}' did not produce declared output '{declared}'")]
    MissingOutput { node: String, declared: String },

    #[error("No input files matched for task '{task}'")]
    NoInputs { task: String },

    #[error("Invalid glob pattern: {0}")]
    Pattern(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for stage operations
pub type StageResult<T> = std::result::Result<T, StageError>;

impl StageError {
    /// Create a lint violation with file/line context
    pub fn lint(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Lint {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an external tool failure
    pub fn tool(tool: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Create a missing input error
    pub fn missing_input(node: impl Into<String>, required: impl Into<String>) -> Self {
        Self::MissingInput {
            node: node.into(),
            required: required.into(),
        }
    }
}
