pub mod basic;
pub mod exec;
pub mod lint;
pub mod minify;
pub mod text;

use crate::error::{StageError, StageResult};
use crate::pipeline::PipeMap;
use std::path::PathBuf;

/// One collected source file flowing through a task's pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Output file name, relative to the task destination
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: PathBuf, text: String) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name, text }
    }
}

/// Replace the last extension of an output name, keeping everything before it.
/// `rename_ext("main.bundle.css", ".min.css")` is `main.bundle.min.css`.
pub fn rename_ext(name: &str, ext: &str) -> String {
    match name.rfind('.') {
        Some(pos) => format!("{}{}", &name[..pos], ext),
        None => format!("{name}{ext}"),
    }
}

/// Apply a text transform to the in-flight artifact: the bundle when the task
/// has concatenated, otherwise every collected file.
pub(crate) fn map_texts<F>(data: &mut PipeMap, node: &str, f: F) -> StageResult<()>
where
    F: Fn(&str) -> StageResult<String>,
{
    if let Some(bundle) = data.get::<String>("bundle") {
        let out = f(bundle)?;
        data.insert("bundle", out);
        return Ok(());
    }

    let files = data
        .get::<Vec<SourceFile>>("files")
        .ok_or_else(|| StageError::missing_input(node, "files"))?;

    let mut out = files.clone();
    for file in &mut out {
        file.text = f(&file.text)?;
    }
    data.insert("files", out);
    Ok(())
}

/// Apply an output rename to the in-flight artifact names
pub(crate) fn apply_rename(data: &mut PipeMap, node: &str, ext: &str) -> StageResult<()> {
    if data.contains_key("bundle") {
        let name = data
            .get::<String>("bundle_name")
            .ok_or_else(|| StageError::missing_input(node, "bundle_name"))?;
        let renamed = rename_ext(name, ext);
        data.insert("bundle_name", renamed);
        return Ok(());
    }

    let files = data
        .get::<Vec<SourceFile>>("files")
        .ok_or_else(|| StageError::missing_input(node, "files"))?;
    let mut out = files.clone();
    for file in &mut out {
        file.name = rename_ext(&file.name, ext);
    }
    data.insert("files", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_replaces_last_extension() {
        assert_eq!(rename_ext("main.bundle.css", ".min.css"), "main.bundle.min.css");
        assert_eq!(rename_ext("app.js", ".min.js"), "app.min.js");
        assert_eq!(rename_ext("LICENSE", ".txt"), "LICENSE.txt");
    }
}
