use super::SourceFile;
use crate::error::{StageError, StageResult};
use crate::pipeline::{PipeMap, PipeNode};
use async_trait::async_trait;
use tracing::debug;

/// Script lint node - passes content through unchanged, but aborts the task
/// on a violation with file/line context. Runs before concatenation so the
/// reported location points at the real source file.
pub struct LintJsNode;

#[async_trait]
impl PipeNode for LintJsNode {
    fn name(&self) -> String {
        "LintJs".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec!["files".to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec!["files".to_string()]
    }

    async fn process(&self, data: PipeMap) -> StageResult<PipeMap> {
        if let Some(files) = data.get::<Vec<SourceFile>>("files") {
            for file in files {
                lint_source(&file.path.to_string_lossy(), &file.text)?;
            }
            debug!("Linted {} file(s), no violations", files.len());
        } else if let Some(bundle) = data.get::<String>("bundle") {
            lint_source("<bundle>", bundle)?;
        } else {
            return Err(StageError::missing_input(self.name(), "files"));
        }
        Ok(data)
    }
}

fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Check one script for structural problems: unbalanced delimiters,
/// unterminated string literals and leftover `debugger` statements.
pub fn lint_source(file: &str, text: &str) -> StageResult<()> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut in_block_comment = false;
    let mut in_template = false;

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let mut code = String::with_capacity(line.len());
        let mut in_string: Option<char> = if in_template { Some('`') } else { None };
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_block_comment = false;
                }
                continue;
            }

            if let Some(quote) = in_string {
                if c == '\\' {
                    chars.next();
                } else if c == quote {
                    in_string = None;
                    if quote == '`' {
                        in_template = false;
                    }
                }
                continue;
            }

            match c {
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    in_block_comment = true;
                }
                '"' | '\'' => in_string = Some(c),
                '`' => {
                    in_string = Some('`');
                    in_template = true;
                }
                '(' | '{' | '[' => {
                    stack.push((c, lineno));
                    code.push(c);
                }
                ')' | '}' | ']' => {
                    match stack.pop() {
                        Some((open, _)) if closer_for(open) == c => {}
                        Some((open, open_line)) => {
                            return Err(StageError::lint(
                                file,
                                lineno,
                                format!(
                                    "unexpected '{c}'; '{open}' from line {open_line} is still open"
                                ),
                            ));
                        }
                        None => {
                            return Err(StageError::lint(
                                file,
                                lineno,
                                format!("unexpected '{c}'"),
                            ));
                        }
                    }
                    code.push(c);
                }
                _ => code.push(c),
            }
        }

        if let Some(quote) = in_string
            && quote != '`'
        {
            return Err(StageError::lint(file, lineno, "unterminated string literal"));
        }

        if contains_word(&code, "debugger") {
            return Err(StageError::lint(file, lineno, "leftover 'debugger' statement"));
        }
    }

    if let Some((open, line)) = stack.first() {
        return Err(StageError::lint(
            file,
            *line,
            format!("'{open}' is never closed"),
        ));
    }

    Ok(())
}

/// Word-boundary search, no regex needed for a single keyword
fn contains_word(haystack: &str, word: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(word) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        let after = abs + word.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if before_ok && after_ok {
            return true;
        }
        start = abs + word.len();
    }
    false
}
