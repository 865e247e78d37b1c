use super::map_texts;
use crate::config::tokens::TokenTable;
use crate::error::{StageError, StageResult};
use crate::pipeline::{PipeMap, PipeNode};
use async_trait::async_trait;
use tracing::debug;

/// Token replace node - substitute `@_@name@_@` placeholders from the merged
/// token table. Missing tokens degrade to empty strings with a warning.
pub struct TokenReplaceNode;

#[async_trait]
impl PipeNode for TokenReplaceNode {
    fn name(&self) -> String {
        "TokenReplace".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec!["files".to_string(), "tokens".to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec!["files".to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> StageResult<PipeMap> {
        let tokens = data
            .get::<TokenTable>("tokens")
            .ok_or_else(|| StageError::missing_input(self.name(), "tokens"))?
            .clone();

        map_texts(&mut data, "TokenReplace", |text| {
            let (out, _missing) = tokens.substitute(text);
            Ok(out)
        })?;
        Ok(data)
    }
}

/// Prettify node - re-indent HTML output. Development-side formatting; the
/// manifest usually gates it on the development environment.
pub struct PrettifyNode {
    indent: usize,
}

impl PrettifyNode {
    pub fn new(indent: usize) -> Self {
        Self { indent }
    }
}

#[async_trait]
impl PipeNode for PrettifyNode {
    fn name(&self) -> String {
        "Prettify".to_string()
    }

    fn input(&self) -> Vec<String> {
        vec!["files".to_string()]
    }

    fn output(&self) -> Vec<String> {
        vec!["files".to_string()]
    }

    async fn process(&self, mut data: PipeMap) -> StageResult<PipeMap> {
        let indent = self.indent;
        map_texts(&mut data, "Prettify", |text| {
            Ok(prettify_html(text, indent))
        })?;
        debug!("Prettified artifact with indent {}", indent);
        Ok(data)
    }
}

/// Elements that never take a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "source", "track", "wbr",
];

fn is_void_element(tag: &str) -> bool {
    let name: String = tag
        .trim_start_matches('<')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
}

/// True for lines that open a block needing deeper indentation
fn opens_block(line: &str) -> bool {
    line.starts_with('<')
        && !line.starts_with("</")
        && !line.starts_with("<!")
        && !line.ends_with("/>")
        && !line.contains("</")
        && !is_void_element(line)
}

/// Re-indent HTML line by line. Blank lines are dropped; tag structure is
/// untouched.
pub fn prettify_html(text: &str, indent: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth: usize = 0;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("</") {
            depth = depth.saturating_sub(1);
        }

        for _ in 0..depth * indent {
            out.push(' ');
        }
        out.push_str(line);
        out.push('\n');

        if opens_block(line) {
            depth += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reindents_nested_tags() {
        let input = "<html>\n<body>\n<p>hi</p>\n</body>\n</html>\n";
        let expected = "<html>\n    <body>\n        <p>hi</p>\n    </body>\n</html>\n";
        assert_eq!(prettify_html(input, 4), expected);
    }

    #[test]
    fn drops_blank_lines_and_existing_indent() {
        let input = "  <div>\n\n      <span>x</span>\n  </div>";
        assert_eq!(prettify_html(input, 2), "<div>\n  <span>x</span>\n</div>\n");
    }

    #[test]
    fn void_and_selfclosing_tags_do_not_indent() {
        let input = "<head>\n<meta charset=\"utf-8\">\n<br/>\n<title>t</title>\n</head>";
        let expected =
            "<head>\n    <meta charset=\"utf-8\">\n    <br/>\n    <title>t</title>\n</head>\n";
        assert_eq!(prettify_html(input, 4), expected);
    }

    #[test]
    fn doctype_does_not_indent() {
        let input = "<!DOCTYPE html>\n<html>\n</html>";
        assert_eq!(prettify_html(input, 4), "<!DOCTYPE html>\n<html>\n</html>\n");
    }
}
