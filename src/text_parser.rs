//! Text-based block parser
//!
//! Scans raw CFML source for BDD declarations with a keyword regex and pairs
//! each one with its body by counting braces. Brace matching is naive:
//! braces inside string literals or comments within a body are
//! counted too, so such bodies can end early or late.

use crate::node::{BlockKind, TestNode};
use crate::position::{comment_ranges, is_in_comment, LineIndex};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DECLARATION: Regex = Regex::new(
        r"\b(x?it|x?describe|x?given|x?when|x?then|x?feature|x?scenario|x?story)\s*\("
    )
    .unwrap();
    static ref NAMED_TITLE: Regex =
        Regex::new(r#"title\s*[:=]\s*(?:"((?:\\.|[^"\\])*)"|'((?:\\.|[^'\\])*)')"#).unwrap();
    static ref POSITIONAL_TITLE: Regex =
        Regex::new(r#"\(\s*(?:"((?:\\.|[^"\\])*)"|'((?:\\.|[^'\\])*)')"#).unwrap();
}

/// Parse every declaration in `text`.
pub fn parse_blocks(text: &str) -> Vec<TestNode> {
    parse_blocks_in(text, 0, text.len(), false)
}

/// Parse declarations starting in `[start, stop)`, marking all of them
/// skipped when `parent_skipped` is set.
pub fn parse_blocks_in(text: &str, start: usize, stop: usize, parent_skipped: bool) -> Vec<TestNode> {
    let scanner = BlockScanner {
        text,
        comments: comment_ranges(text),
        lines: LineIndex::new(text),
    };
    scanner.scan(start, stop.min(text.len()), parent_skipped)
}

/// Extract a declaration title from a call header.
///
/// A named `title` argument wins over the first quoted positional argument.
/// Escaped quotes are kept verbatim. Returns an empty string when neither
/// form is present.
pub fn extract_title(header: &str) -> String {
    NAMED_TITLE
        .captures(header)
        .or_else(|| POSITIONAL_TITLE.captures(header))
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

struct BlockScanner<'a> {
    text: &'a str,
    comments: Vec<(usize, usize)>,
    lines: LineIndex<'a>,
}

impl<'a> BlockScanner<'a> {
    fn scan(&self, start: usize, stop: usize, parent_skipped: bool) -> Vec<TestNode> {
        let mut blocks = Vec::new();
        let mut index = start;

        while index < stop {
            let Some(caps) = DECLARATION.captures_at(self.text, index) else {
                break;
            };
            let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            if whole.start() >= stop {
                break;
            }
            if is_in_comment(whole.start(), &self.comments) {
                index = whole.end();
                continue;
            }
            let Some((kind, prefixed)) = BlockKind::from_keyword(keyword.as_str()) else {
                index = whole.end();
                continue;
            };

            let skipped = parent_skipped || prefixed;
            let start_offset = whole.start();

            let open_brace = self.text[start_offset..]
                .find('{')
                .map(|i| start_offset + i)
                .filter(|&open| open < stop);

            let (end_offset, children) = match open_brace {
                Some(open) => {
                    let end = matching_brace_end(self.text, open);
                    (end, self.scan(open + 1, end - 1, skipped))
                }
                None => (whole.end(), Vec::new()),
            };

            // titles come from the declaration's own line only
            let header_end = line_end(self.text, start_offset);
            let mut node = TestNode::new(
                kind,
                extract_title(&self.text[start_offset..header_end]),
                skipped,
                start_offset,
                self.lines.position(start_offset),
            );
            node.end_offset = Some(end_offset);
            node.end = Some(self.lines.position(end_offset));
            node.children = children;
            blocks.push(node);

            index = end_offset;
        }

        blocks
    }
}

/// Offset just past the `}` matching the `{` at `open`, or the end of the
/// text when the block never closes.
fn matching_brace_end(text: &str, open: usize) -> usize {
    let mut depth = 1usize;
    for (i, byte) in text.as_bytes().iter().enumerate().skip(open + 1) {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
    }
    text.len()
}

fn line_end(text: &str, from: usize) -> usize {
    text[from..].find('\n').map(|i| from + i).unwrap_or(text.len())
}
