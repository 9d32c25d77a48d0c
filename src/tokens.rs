//! Scope-tagged token stream produced by the external tokenizer
//!
//! Each token is a `[text, [scope, ...]]` pair. Scope tags follow TextMate
//! grammar naming (`punctuation.section.block.begin.cfml`, `comment.line...`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STRING_BEGIN: &str = "punctuation.definition.string.begin.cfml";
pub const STRING_END: &str = "punctuation.definition.string.end.cfml";
pub const BLOCK_BEGIN: &str = "punctuation.section.block.begin.cfml";
pub const BLOCK_END: &str = "punctuation.section.block.end.cfml";
pub const GROUP_BEGIN: &str = "punctuation.section.group.begin.cfml";
pub const GROUP_END: &str = "punctuation.section.group.end.cfml";
pub const PARAMETERS_BEGIN: &str = "punctuation.section.parameters.begin.cfml";
pub const PARAMETERS_END: &str = "punctuation.section.parameters.end.cfml";
pub const FUNCTION_NAME: &str = "entity.name.function.cfml";

/// A token's text and its scope stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, Vec<String>)", into = "(String, Vec<String>)")]
pub struct Token {
    pub text: String,
    pub scopes: Vec<String>,
}

impl From<(String, Vec<String>)> for Token {
    fn from((text, scopes): (String, Vec<String>)) -> Self {
        Token { text, scopes }
    }
}

impl From<Token> for (String, Vec<String>) {
    fn from(token: Token) -> Self {
        (token.text, token.scopes)
    }
}

impl Token {
    pub fn new(text: impl Into<String>, scopes: &[&str]) -> Self {
        Token {
            text: text.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn is_newline(&self) -> bool {
        self.text.contains('\n')
    }

    pub fn is_comment(&self) -> bool {
        self.scopes.iter().any(|s| s.contains("comment"))
    }

    pub fn is_block_begin(&self) -> bool {
        self.has_scope(BLOCK_BEGIN)
    }

    pub fn is_block_end(&self) -> bool {
        self.has_scope(BLOCK_END)
    }

    pub fn is_string_begin(&self) -> bool {
        self.has_scope(STRING_BEGIN)
    }

    pub fn is_string_end(&self) -> bool {
        self.has_scope(STRING_END)
    }

    /// Part of a string literal (delimiters included).
    pub fn is_string(&self) -> bool {
        self.scopes
            .iter()
            .any(|s| s.starts_with("string.") || s.starts_with("meta.string."))
    }

    pub fn is_function_name(&self) -> bool {
        self.scopes.iter().any(|s| s.contains(FUNCTION_NAME))
    }
}

/// Parse the tokenizer's JSON output.
pub fn from_json(json: &str) -> serde_json::Result<Vec<Token>> {
    serde_json::from_str(json)
}

/// Where a token occurrence sits in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenLocation {
    pub text: String,
    pub line: usize,
    /// Column just past the token
    pub column: usize,
    /// Cumulative offset just past the token
    pub position: usize,
    pub scopes: Vec<String>,
}

/// Token occurrences grouped by scope tag.
///
/// While a string, block, group or parameter span is open, tokens also carry
/// a synthetic span tag (`punctuation.section.block.cfml` and friends) so the
/// report can show everything a span contains.
#[derive(Debug, Default, Serialize)]
pub struct ScopeReport {
    pub tokens_by_scope: BTreeMap<String, Vec<TokenLocation>>,
}

const SPANS: [(&str, &str, &str); 4] = [
    (STRING_BEGIN, STRING_END, "punctuation.definition.string.cfml"),
    (BLOCK_BEGIN, BLOCK_END, "punctuation.section.block.cfml"),
    (GROUP_BEGIN, GROUP_END, "punctuation.section.group.cfml"),
    (PARAMETERS_BEGIN, PARAMETERS_END, "punctuation.section.parameters.cfml"),
];

impl ScopeReport {
    pub fn build(tokens: &[Token]) -> Self {
        let mut report = ScopeReport::default();
        let mut open = [false; SPANS.len()];
        let mut line = 0;
        let mut column = 0;
        let mut position = 0;

        for token in tokens {
            if token.is_newline() {
                line += token.text.matches('\n').count();
                column = 0;
                position += token.text.len();
                continue;
            }
            position += token.text.len();
            column += token.text.chars().count();

            for (i, (begin, _, _)) in SPANS.iter().enumerate() {
                if token.has_scope(begin) {
                    open[i] = true;
                }
            }

            let mut scopes = token.scopes.clone();
            for (i, (_, _, tag)) in SPANS.iter().enumerate() {
                if open[i] {
                    scopes.push(tag.to_string());
                }
            }

            for scope in &scopes {
                report
                    .tokens_by_scope
                    .entry(scope.clone())
                    .or_default()
                    .push(TokenLocation {
                        text: token.text.clone(),
                        line,
                        column,
                        position,
                        scopes: scopes.clone(),
                    });
            }

            for (i, (_, end, _)) in SPANS.iter().enumerate() {
                if token.has_scope(end) {
                    open[i] = false;
                }
            }
        }

        report
    }

    pub fn count(&self, scope: &str) -> usize {
        self.tokens_by_scope.get(scope).map(Vec::len).unwrap_or(0)
    }
}
