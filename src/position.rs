//! Source positions and comment masking
//!
//! Offsets are byte offsets into the source text. Positions are 0-indexed
//! `{line, character}` pairs where `character` counts Unicode scalar values
//! from the start of the line.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
}

/// A 0-indexed line/character position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Position { line, character }
    }
}

/// A start/end pair of positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    /// A zero-width range at `at`
    pub fn point(at: Position) -> Self {
        Range { start: at, end: at }
    }
}

/// Byte offset -> position lookup over a fixed text.
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { text, line_starts }
    }

    pub fn position(&self, offset: usize) -> Position {
        let offset = floor_char_boundary(self.text, offset);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let character = self.text[self.line_starts[line]..offset].chars().count();
        Position { line, character }
    }
}

/// Position of `offset` within `text`.
pub fn line_column(text: &str, offset: usize) -> Position {
    let offset = floor_char_boundary(text, offset);
    let prefix = &text[..offset];
    let line = prefix.matches('\n').count();
    let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
    Position {
        line,
        character: prefix[line_start..].chars().count(),
    }
}

/// Half-open byte ranges covered by comments.
///
/// Block comments are matched non-greedily across lines. A line comment
/// runs from the first `//` on a physical line to the end of that line,
/// whether or not the `//` sits inside a string.
pub fn comment_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = BLOCK_COMMENT
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut offset = 0;
    for line in text.split('\n') {
        if let Some(idx) = line.find("//") {
            ranges.push((offset + idx, offset + line.len()));
        }
        offset += line.len() + 1;
    }

    ranges
}

pub fn is_in_comment(offset: usize, ranges: &[(usize, usize)]) -> bool {
    ranges
        .iter()
        .any(|&(start, end)| offset >= start && offset < end)
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
