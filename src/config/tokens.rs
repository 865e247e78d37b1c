//! Configuration token table.
//!
//! Tokens come from the project metadata file merged with an optional
//! environment overlay (overlay values win). Substitution replaces
//! `@_@name@_@` in place; an unknown token becomes an empty string with a
//! warning, never a build failure.

use crate::config::constants;
use crate::config::manifest::{Environment, Manifest};
use crate::error::{ForgeError, Result};
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(constants::TOKEN_PATTERN).expect("token pattern is valid"))
}

/// Immutable token table, constructed once at build start and passed into
/// every substitution stage.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    values: IndexMap<String, String>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table for one build: metadata file plus environment overlay.
    /// Configured files that are missing fail fast.
    pub fn load(manifest: &Manifest, env: Environment) -> Result<Self> {
        let mut table = Self::new();

        if let Some(path) = manifest.metadata_path() {
            table.merge_file(&path)?;
        }
        if let Some(path) = manifest.overlay_path(env) {
            table.merge_file(&path)?;
        }

        debug!("Token table loaded with {} entries", table.len());
        Ok(table)
    }

    fn merge_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(ForgeError::MissingFile(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        self.merge_json(value);
        Ok(())
    }

    /// Merge top-level scalar entries of a JSON object; later merges win
    fn merge_json(&mut self, value: Value) {
        let Value::Object(map) = value else {
            debug!("Ignoring non-object metadata document");
            return;
        };
        for (key, value) in map {
            match value {
                Value::String(s) => {
                    self.values.insert(key, s);
                }
                Value::Number(n) => {
                    self.values.insert(key, n.to_string());
                }
                Value::Bool(b) => {
                    self.values.insert(key, b.to_string());
                }
                _ => debug!("Skipping non-scalar metadata entry '{key}'"),
            }
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every delimited token in `text`. Returns the substituted text
    /// and the distinct missing token names, each warned about exactly once.
    pub fn substitute(&self, text: &str) -> (String, Vec<String>) {
        let mut missing: Vec<String> = Vec::new();

        let out = token_re().replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match self.values.get(name) {
                Some(value) => value.clone(),
                None => {
                    if !missing.iter().any(|m| m == name) {
                        warn!("No matching token found for {name}");
                        missing.push(name.to_string());
                    }
                    String::new()
                }
            }
        });

        (out.into_owned(), missing)
    }
}

impl FromIterator<(String, String)> for TokenTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
