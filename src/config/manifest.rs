//! Build manifest: the declarative task table loaded from `webforge.toml`.
//!
//! Stage kinds form a closed set; an unknown stage name is rejected when the
//! manifest is parsed, never at run time.

use crate::error::{ForgeError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use wax::Glob;

/// Build environment flag, set once per invocation and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Closed set of transform stage variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Join all collected files into one bundle
    Concat,
    /// Substitute `@_@name@_@` tokens from the merged token table
    ReplaceTokens,
    /// Re-indent HTML output
    Prettify,
    /// Conservative stylesheet compaction
    MinifyCss,
    /// Conservative script compaction
    MinifyJs,
    /// Pass-through script checker, aborts the task on violation
    LintJs,
    /// Pipe the artifact through an external command
    Exec,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Concat => "concat",
            StageKind::ReplaceTokens => "replace-tokens",
            StageKind::Prettify => "prettify",
            StageKind::MinifyCss => "minify-css",
            StageKind::MinifyJs => "minify-js",
            StageKind::LintJs => "lint-js",
            StageKind::Exec => "exec",
        };
        write!(f, "{name}")
    }
}

/// One stage entry within a task's pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub kind: StageKind,
    /// Run this stage only in the given environment
    #[serde(default)]
    pub only: Option<Environment>,
    /// Replace the artifact's last extension after this stage, e.g. ".min.css"
    #[serde(default)]
    pub rename: Option<String>,
    /// Write the current artifact to the destination before this stage runs,
    /// retaining the intermediate output alongside the final one
    #[serde(default)]
    pub checkpoint: bool,
    /// Command line for the `exec` stage
    #[serde(default)]
    pub command: Option<String>,
    /// Indent width for the `prettify` stage
    #[serde(default)]
    pub indent: Option<usize>,
}

impl StageSpec {
    pub fn enabled_for(&self, env: Environment) -> bool {
        self.only.is_none_or(|only| only == env)
    }
}

/// A named unit of work producing one build artifact from one set of inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    /// Source globs, relative to the manifest directory, in declaration order
    pub sources: Vec<String>,
    /// Destination directory, relative to the manifest directory
    pub dest: PathBuf,
    /// Bundle file name; required when the pipeline concatenates
    #[serde(default)]
    pub bundle: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

impl TaskSpec {
    /// Compile the task's source globs, split into (directory prefix, glob)
    pub fn compiled_globs(&self) -> Result<Vec<(PathBuf, Glob<'static>)>> {
        let mut globs = Vec::with_capacity(self.sources.len());
        for pattern in &self.sources {
            let glob = Glob::new(pattern).map_err(|e| {
                ForgeError::invalid_manifest(format!(
                    "task '{}': invalid glob '{}': {}",
                    self.name, pattern, e
                ))
            })?;
            let (prefix, glob) = glob.into_owned().partition();
            globs.push((prefix, glob));
        }
        Ok(globs)
    }

    /// True if this task reads the token table anywhere in its pipeline
    pub fn substitutes_tokens(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.kind == StageKind::ReplaceTokens)
    }

    fn has_stage(&self, kind: StageKind) -> bool {
        self.stages.iter().any(|s| s.kind == kind)
    }
}

/// Project-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Project metadata file (name/version/description key-value pairs)
    #[serde(default)]
    pub metadata: Option<PathBuf>,
    /// Environment-specific overlay files, merged over the metadata with
    /// overlay values taking precedence
    #[serde(default)]
    pub overlays: IndexMap<String, PathBuf>,
    /// Directory served by the `serve` and `dev` commands
    #[serde(default = "default_site_root")]
    pub site_root: PathBuf,
}

fn default_site_root() -> PathBuf {
    PathBuf::from(".")
}

/// The parsed build manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub project: ProjectSpec,
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskSpec>,
    /// Directory the manifest was loaded from; all task paths resolve here
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Manifest {
    /// Load and validate a manifest file. A missing file fails fast.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForgeError::MissingFile(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&text, base_dir)
    }

    /// Parse manifest text with an explicit base directory
    pub fn parse(text: &str, base_dir: PathBuf) -> Result<Self> {
        let mut manifest: Manifest = toml::from_str(text)?;
        manifest.base_dir = base_dir;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Resolved metadata file path, if configured
    pub fn metadata_path(&self) -> Option<PathBuf> {
        self.project.metadata.as_ref().map(|p| self.base_dir.join(p))
    }

    /// Resolved overlay file path for the given environment, if configured
    pub fn overlay_path(&self, env: Environment) -> Option<PathBuf> {
        self.project
            .overlays
            .get(env.to_string().as_str())
            .map(|p| self.base_dir.join(p))
    }

    /// Resolved site root for the static server
    pub fn site_root(&self) -> PathBuf {
        self.base_dir.join(&self.project.site_root)
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for task in &self.tasks {
            if !names.insert(task.name.as_str()) {
                return Err(ForgeError::invalid_manifest(format!(
                    "duplicate task name '{}'",
                    task.name
                )));
            }
        }

        for task in &self.tasks {
            if task.sources.is_empty() {
                return Err(ForgeError::invalid_manifest(format!(
                    "task '{}' declares no sources",
                    task.name
                )));
            }

            // Globs must compile; this also rejects bad patterns up front
            task.compiled_globs()?;

            for dep in &task.depends_on {
                if dep == &task.name {
                    return Err(ForgeError::invalid_manifest(format!(
                        "task '{}' depends on itself",
                        task.name
                    )));
                }
                if !names.contains(dep.as_str()) {
                    return Err(ForgeError::invalid_manifest(format!(
                        "task '{}' depends on unknown task '{}'",
                        task.name, dep
                    )));
                }
            }

            if task.has_stage(StageKind::Concat) && task.bundle.is_none() {
                return Err(ForgeError::invalid_manifest(format!(
                    "task '{}' concatenates but declares no bundle file name",
                    task.name
                )));
            }

            for stage in &task.stages {
                if stage.kind == StageKind::Exec
                    && stage.command.as_deref().unwrap_or("").trim().is_empty()
                {
                    return Err(ForgeError::invalid_manifest(format!(
                        "task '{}': exec stage declares no command",
                        task.name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [project]
        metadata = "package.json"
        site_root = "dist"

        [project.overlays]
        production = "package.production.json"

        [[task]]
        name = "styles"
        sources = ["css/**/*.css"]
        dest = "dist/css"
        bundle = "main.bundle.css"

        [[task.stages]]
        kind = "concat"

        [[task.stages]]
        kind = "minify-css"
        only = "production"
        rename = ".min.css"
        checkpoint = true

        [[task]]
        name = "templates"
        sources = ["templates/**/*.html"]
        dest = "dist"
        depends_on = ["styles"]

        [[task.stages]]
        kind = "replace-tokens"

        [[task.stages]]
        kind = "prettify"
        only = "development"
    "#;

    #[test]
    fn parses_sample_manifest() {
        let manifest = Manifest::parse(SAMPLE, PathBuf::from("/proj")).unwrap();
        assert_eq!(manifest.tasks.len(), 2);
        assert_eq!(manifest.site_root(), PathBuf::from("/proj/dist"));
        assert_eq!(
            manifest.overlay_path(Environment::Production),
            Some(PathBuf::from("/proj/package.production.json"))
        );
        assert_eq!(manifest.overlay_path(Environment::Development), None);

        let styles = manifest.task("styles").unwrap();
        assert_eq!(styles.stages[1].kind, StageKind::MinifyCss);
        assert_eq!(styles.stages[1].only, Some(Environment::Production));
        assert!(styles.stages[1].checkpoint);

        let templates = manifest.task("templates").unwrap();
        assert!(templates.substitutes_tokens());
        assert_eq!(templates.depends_on, vec!["styles".to_string()]);
    }

    #[test]
    fn stage_gating_defaults_to_both_environments() {
        let spec = StageSpec {
            kind: StageKind::Concat,
            only: None,
            rename: None,
            checkpoint: false,
            command: None,
            indent: None,
        };
        assert!(spec.enabled_for(Environment::Development));
        assert!(spec.enabled_for(Environment::Production));
    }

    #[test]
    fn rejects_duplicate_task_names() {
        let text = r#"
            [[task]]
            name = "a"
            sources = ["*.css"]
            dest = "out"

            [[task]]
            name = "a"
            sources = ["*.js"]
            dest = "out"
        "#;
        let err = Manifest::parse(text, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidManifest(_)));
    }

    #[test]
    fn rejects_unknown_stage_kind() {
        let text = r#"
            [[task]]
            name = "a"
            sources = ["*.css"]
            dest = "out"

            [[task.stages]]
            kind = "uglify"
        "#;
        let err = Manifest::parse(text, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ForgeError::ManifestParse(_)));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let text = r#"
            [[task]]
            name = "a"
            sources = ["*.css"]
            dest = "out"
            depends_on = ["missing"]
        "#;
        let err = Manifest::parse(text, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidManifest(_)));
    }

    #[test]
    fn rejects_self_dependency() {
        let text = r#"
            [[task]]
            name = "a"
            sources = ["*.css"]
            dest = "out"
            depends_on = ["a"]
        "#;
        let err = Manifest::parse(text, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidManifest(_)));
    }

    #[test]
    fn rejects_concat_without_bundle_name() {
        let text = r#"
            [[task]]
            name = "a"
            sources = ["*.css"]
            dest = "out"

            [[task.stages]]
            kind = "concat"
        "#;
        let err = Manifest::parse(text, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidManifest(_)));
    }

    #[test]
    fn rejects_exec_without_command() {
        let text = r#"
            [[task]]
            name = "a"
            sources = ["*.scss"]
            dest = "out"
            bundle = "main.css"

            [[task.stages]]
            kind = "exec"
        "#;
        let err = Manifest::parse(text, PathBuf::new()).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidManifest(_)));
    }
}
