/// Unified error type for webforge
use crate::error::StageError;
use crate::graph::GraphError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Required file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Manifest parse error: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("Metadata parse error: {0}")]
    MetadataParse(#[from] serde_json::Error),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    // Task graph errors
    #[error("Task graph error: {0}")]
    Graph(#[from] GraphError),

    // Pipeline errors
    #[error("Task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: StageError,
    },

    #[error("{0} task(s) failed")]
    TasksFailed(usize),

    // Watch mode errors
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Result type alias using ForgeError
pub type Result<T> = std::result::Result<T, ForgeError>;

impl ForgeError {
    /// Create an invalid manifest error
    pub fn invalid_manifest(msg: impl Into<String>) -> Self {
        Self::InvalidManifest(msg.into())
    }
}
