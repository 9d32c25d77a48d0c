//! Test declaration nodes shared by both block parsers
//!
//! Whichever front end produced them (raw text or a token stream), parsers
//! hand back the same `TestNode` shape so the tree generator does not care
//! about provenance.

use crate::position::{Position, Range};
use crate::tokens::Token;
use serde::{Deserialize, Serialize};

/// Recognized BDD declaration keywords, skip prefix stripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Describe,
    It,
    Given,
    When,
    Then,
    Feature,
    Scenario,
    Story,
}

/// Whether a declaration groups other declarations or is a leaf test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Suite,
    Spec,
}

impl BlockKind {
    pub const ALL: [BlockKind; 8] = [
        BlockKind::Describe,
        BlockKind::It,
        BlockKind::Given,
        BlockKind::When,
        BlockKind::Then,
        BlockKind::Feature,
        BlockKind::Scenario,
        BlockKind::Story,
    ];

    /// Classify a keyword, returning the kind and whether it was `x`-prefixed.
    ///
    /// Matching is case-sensitive, like the declarations themselves.
    pub fn from_keyword(keyword: &str) -> Option<(BlockKind, bool)> {
        let (name, skipped) = match keyword.strip_prefix('x') {
            Some(rest) => (rest, true),
            None => (keyword, false),
        };
        let kind = match name {
            "describe" => BlockKind::Describe,
            "it" => BlockKind::It,
            "given" => BlockKind::Given,
            "when" => BlockKind::When,
            "then" => BlockKind::Then,
            "feature" => BlockKind::Feature,
            "scenario" => BlockKind::Scenario,
            "story" => BlockKind::Story,
            _ => return None,
        };
        Some((kind, skipped))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Describe => "describe",
            BlockKind::It => "it",
            BlockKind::Given => "given",
            BlockKind::When => "when",
            BlockKind::Then => "then",
            BlockKind::Feature => "feature",
            BlockKind::Scenario => "scenario",
            BlockKind::Story => "story",
        }
    }

    pub fn role(&self) -> Role {
        match self {
            BlockKind::It | BlockKind::Then => Role::Spec,
            BlockKind::Describe
            | BlockKind::Given
            | BlockKind::When
            | BlockKind::Feature
            | BlockKind::Scenario
            | BlockKind::Story => Role::Suite,
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered test declaration with its source span and nested children.
///
/// `end` and `end_offset` are `None` only when the token parser never saw the
/// block close before the stream ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestNode {
    pub kind: BlockKind,
    pub title: String,
    /// Set when this node or any ancestor was `x`-prefixed
    pub skipped: bool,
    pub start_offset: usize,
    pub end_offset: Option<usize>,
    pub start: Position,
    pub end: Option<Position>,
    pub children: Vec<TestNode>,
}

impl TestNode {
    pub fn new(kind: BlockKind, title: impl Into<String>, skipped: bool, start_offset: usize, start: Position) -> Self {
        TestNode {
            kind,
            title: title.into(),
            skipped,
            start_offset,
            end_offset: None,
            start,
            end: None,
            children: Vec::new(),
        }
    }

    /// The node's range; an unterminated node collapses to its start.
    pub fn range(&self) -> Range {
        Range::new(self.start, self.end.unwrap_or(self.start))
    }

    pub fn is_open(&self) -> bool {
        self.end_offset.is_none()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TestNode::count).sum::<usize>()
    }
}

/// The front-end representation a file is available in.
///
/// Both strategies produce the same node shape; callers pick whichever
/// input they have.
#[derive(Debug, Clone, Copy)]
pub enum SourceInput<'a> {
    Text(&'a str),
    Tokens(&'a [Token]),
}

impl<'a> SourceInput<'a> {
    pub fn parse(&self) -> Vec<TestNode> {
        match self {
            SourceInput::Text(text) => crate::text_parser::parse_blocks(text),
            SourceInput::Tokens(tokens) => crate::token_parser::parse_tokens(tokens),
        }
    }
}
