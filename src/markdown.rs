//! HTML to Markdown conversion for extracted article content.

use std::sync::LazyLock;

use htmd::element_handler::{HandlerResult, Handlers};
use htmd::options::{BulletListMarker, CodeBlockFence, CodeBlockStyle, HeadingStyle, Options};
use htmd::{Element, HtmlToMarkdown};
use regex::Regex;

use crate::{Result, SearchError};

/// Tags whose content never belongs in the Markdown output.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "head", "template", "svg"];

static TRAILING_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+$").expect("Invalid trailing space regex"));

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            code_block_style: CodeBlockStyle::Fenced,
            code_block_fence: CodeBlockFence::Backticks,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .skip_tags(SKIP_TAGS.to_vec())
        .add_handler(vec!["del", "s", "strike"], strikethrough)
        .build()
}

fn strikethrough(handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
    let content = handlers.walk_children(element.node).content;
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    Some(HandlerResult::from(format!("~~{}~~", content)))
}

/// Converts an HTML fragment to Markdown.
///
/// Headings are ATX-style, code blocks fenced with backticks, tables use
/// GFM pipe rows and strikethrough uses `~~`. Runs of blank lines outside
/// code fences are collapsed to one.
pub fn to_markdown(html: &str) -> Result<String> {
    let markdown = converter()
        .convert(html)
        .map_err(|e| SearchError::Parse(format!("markdown conversion failed: {}", e)))?;
    Ok(tidy(&markdown))
}

/// Collapses blank-line runs and trailing spaces outside fenced blocks.
fn tidy(markdown: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut blank_run = 0;

    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            blank_run = 0;
            lines.push(line.trim_end().to_string());
            continue;
        }
        if in_fence {
            lines.push(line.to_string());
            continue;
        }

        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            lines.push(String::new());
        } else {
            blank_run = 0;
            // Two trailing spaces mark a hard line break.
            if line.ends_with("  ") && !line.trim().is_empty() {
                lines.push(format!("{}  ", line.trim_end()));
            } else {
                lines.push(TRAILING_SPACES.replace(line, "").into_owned());
            }
        }
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_are_atx() {
        let md = to_markdown("<h1>Title</h1><h2>Section</h2><p>Body text.</p>").unwrap();
        assert!(md.starts_with("# Title"));
        assert!(md.contains("## Section"));
        assert!(md.contains("Body text."));
    }

    #[test]
    fn test_inline_formatting() {
        let md = to_markdown(
            r#"<p>This is <strong>important</strong> and <a href="https://example.com/">linked</a>.</p>"#,
        )
        .unwrap();
        assert!(md.contains("**important**"));
        assert!(md.contains("[linked](https://example.com/)"));
    }

    #[test]
    fn test_strikethrough() {
        let md = to_markdown("<p>Price: <del>$20</del> $10</p>").unwrap();
        assert!(md.contains("~~$20~~"));
    }

    #[test]
    fn test_tables_are_gfm_pipe_rows() {
        let md = to_markdown(
            "<table><thead><tr><th>Name</th><th>Age</th></tr></thead>\
             <tbody><tr><td>Ann</td><td>30</td></tr></tbody></table>",
        )
        .unwrap();
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines.len(), 3, "unexpected table: {md:?}");
        assert_eq!(lines[0], "| Name | Age |");
        assert!(lines[1].starts_with("| ---"));
        assert!(lines[1].chars().all(|c| matches!(c, '|' | '-' | ' ' | ':')));
        assert!(lines[2].starts_with("| Ann"));
        assert!(lines[2].contains("| 30"));
    }

    #[test]
    fn test_code_blocks_are_fenced() {
        let md = to_markdown("<pre><code>fn main() {}\n</code></pre>").unwrap();
        assert!(md.contains("```"));
        assert!(md.contains("fn main() {}"));
    }

    #[test]
    fn test_lists_use_dash() {
        let md = to_markdown("<ul><li>one</li><li>two</li></ul>").unwrap();
        let items: Vec<&str> = md.lines().filter(|l| l.starts_with('-')).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].ends_with("one"));
        assert!(items[1].ends_with("two"));
    }

    #[test]
    fn test_skips_scripts_and_styles() {
        let md =
            to_markdown("<style>p{color:red}</style><p>kept</p><script>alert(1)</script>").unwrap();
        assert_eq!(md, "kept");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(to_markdown("").unwrap(), "");
    }

    #[test]
    fn test_tidy_collapses_blank_lines_outside_fences() {
        let input = "a\n\n\n\nb \n```\nx\n\n\ny\n```\n\n\n";
        assert_eq!(tidy(input), "a\n\nb\n```\nx\n\n\ny\n```");
    }
}
