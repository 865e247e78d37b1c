//! Conservative bundle compaction.
//!
//! These stages shrink whitespace and comments without reinterpreting the
//! language; anything heavier belongs in an `exec` stage pointed at a real
//! minifier.

use super::{apply_rename, map_texts};
use crate::error::StageResult;
use crate::pipeline::{PipeMap, PipeNode};
use async_trait::async_trait;
use tracing::debug;

/// CSS minify node - strips comments and redundant whitespace
pub struct CssMinifyNode {
    rename: Option<String>,
}

impl CssMinifyNode {
    pub fn new(rename: Option<String>) -> Self {
        Self { rename }
    }
}

#[async_trait]
impl PipeNode for CssMinifyNode {
    fn name(&self) -> String {
        "CssMinify".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec!["files".to_string(), "bundle?".to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec!["files".to_string(), "bundle?".to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> StageResult<PipeMap> {
        map_texts(&mut data, "CssMinify", |text| Ok(minify_css(text)))?;
        if let Some(ext) = &self.rename {
            apply_rename(&mut data, "CssMinify", ext)?;
        }
        debug!("Minified stylesheet artifact");
        Ok(data)
    }
}

/// JS minify node - drops comments, indentation and blank lines. No mangling.
pub struct JsMinifyNode {
    rename: Option<String>,
}

impl JsMinifyNode {
    pub fn new(rename: Option<String>) -> Self {
        Self { rename }
    }
}

#[async_trait]
impl PipeNode for JsMinifyNode {
    fn name(&self) -> String {
        "JsMinify".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec!["files".to_string(), "bundle?".to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec!["files".to_string(), "bundle?".to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> StageResult<PipeMap> {
        map_texts(&mut data, "JsMinify", |text| Ok(compact_js(text)))?;
        if let Some(ext) = &self.rename {
            apply_rename(&mut data, "JsMinify", ext)?;
        }
        debug!("Compacted script artifact");
        Ok(data)
    }
}

/// Remove `/* ... */` comments, leaving string literals alone
fn strip_block_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(quote) = in_string {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else if c == quote {
                in_string = None;
            }
            continue;
        }

        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = ' ';
            for c2 in chars.by_ref() {
                if prev == '*' && c2 == '/' {
                    break;
                }
                prev = c2;
            }
            continue;
        }

        if c == '"' || c == '\'' {
            in_string = Some(c);
        }
        out.push(c);
    }

    out
}

// Characters that swallow a preceding space
const TIGHT_BEFORE: &[char] = &['{', '}', ';', ',', '>'];
// Characters after which a space is redundant
const TIGHT_AFTER: &[char] = &['{', '}', ';', ',', '>', ':'];

fn ends_tight(out: &str) -> bool {
    out.chars().next_back().is_none_or(|c| TIGHT_AFTER.contains(&c))
}

/// Minify a stylesheet: no comments, single spaces at most, no space around
/// punctuation, no trailing semicolon before `}`. Spaces inside `calc()` and
/// descendant selectors survive.
pub fn minify_css(text: &str) -> String {
    let text = strip_block_comments(text);
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    let mut in_string: Option<char> = None;
    let mut pending_space = false;
    // Inside a declaration block a ':' separates property and value; at
    // selector level a leading space is significant (descendant + pseudo).
    let mut depth: usize = 0;

    while let Some(c) = chars.next() {
        if let Some(quote) = in_string {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else if c == quote {
                in_string = None;
            }
            continue;
        }

        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }

        if TIGHT_BEFORE.contains(&c) || (c == ':' && depth > 0) {
            pending_space = false;
            match c {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if out.ends_with(';') {
                        out.pop();
                    }
                }
                _ => {}
            }
            out.push(c);
            continue;
        }

        if pending_space && !ends_tight(&out) {
            out.push(' ');
        }
        pending_space = false;

        if c == '"' || c == '\'' {
            in_string = Some(c);
        }
        out.push(c);
    }

    out
}

/// Compact a script: drop whole-line comments, indentation and blank lines.
/// Statements keep their own lines, so nothing that depends on automatic
/// semicolon insertion changes meaning.
pub fn compact_js(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_block_comment = false;

    for raw in text.lines() {
        let mut line = raw.trim();

        if in_block_comment {
            match line.find("*/") {
                Some(pos) => {
                    line = line[pos + 2..].trim_start();
                    in_block_comment = false;
                }
                None => continue,
            }
        }

        while line.starts_with("/*") {
            match line.find("*/") {
                Some(pos) => line = line[pos + 2..].trim_start(),
                None => {
                    in_block_comment = true;
                    line = "";
                    break;
                }
            }
        }

        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        out.push_str(line);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_strips_comments_and_whitespace() {
        let input = "/* banner */\nbody {\n    color : red ;\n    margin: 0   auto;\n}\n";
        assert_eq!(minify_css(input), "body{color:red;margin:0 auto}");
    }

    #[test]
    fn css_preserves_descendant_selectors_and_strings() {
        let input = "a :hover { content: \"  /* keep */  \"; }";
        assert_eq!(minify_css(input), "a :hover{content:\"  /* keep */  \"}");
    }

    #[test]
    fn css_preserves_calc_spaces() {
        let input = "div { width: calc(100% - 2px); }";
        assert_eq!(minify_css(input), "div{width:calc(100% - 2px)}");
    }

    #[test]
    fn css_tightens_combinators_and_commas() {
        let input = "h1 , h2 > p { margin : 0 ; }";
        assert_eq!(minify_css(input), "h1,h2>p{margin:0}");
    }

    #[test]
    fn js_drops_comments_and_blank_lines() {
        let input = "// header\n\nvar a = 1;\n/* block\n   comment */\n    var b = 2; // keep this line\n";
        assert_eq!(compact_js(input), "var a = 1;\nvar b = 2; // keep this line\n");
    }

    #[test]
    fn js_keeps_string_with_comment_markers() {
        let input = "var url = \"http://example.com\";\n";
        assert_eq!(compact_js(input), "var url = \"http://example.com\";\n");
    }

    #[test]
    fn js_inline_block_comment_then_code() {
        let input = "/* a */ var x = 1;\n";
        assert_eq!(compact_js(input), "var x = 1;\n");
    }
}
