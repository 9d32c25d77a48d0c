//! Token-stream block parser
//!
//! Walks a scope-tagged token stream once, tracking line, column, offset and
//! block depth. Every recognized keyword is assumed to open exactly one
//! block; open declarations live on a stack of `(node index, depth)` records
//! and close when a block-end token drops the depth below the depth they
//! were opened at. Several declarations can close on the same token.
//!
//! Nodes are kept in an arena while scanning and only assembled into the
//! nested `TestNode` tree at the end, so the stack holds plain indices.

use crate::node::{BlockKind, TestNode};
use crate::position::Position;
use crate::tokens::Token;
use tracing::debug;

/// How many tokens past a keyword to search for its title
pub const TITLE_LOOKAHEAD: usize = 100;

/// Parse a token stream into declaration trees.
///
/// Declarations whose block never closes keep `end_offset == None`.
pub fn parse_tokens(tokens: &[Token]) -> Vec<TestNode> {
    let mut builder = TreeBuilder::default();
    let mut line = 0;
    let mut column = 0;
    let mut offset = 0;
    let mut block_depth: isize = 0;

    for (i, token) in tokens.iter().enumerate() {
        let token_start = Position::new(line, column);
        let token_offset = offset;

        if token.is_newline() {
            line += token.text.matches('\n').count();
            column = token
                .text
                .rsplit('\n')
                .next()
                .map(|tail| tail.chars().count())
                .unwrap_or(0);
            offset += token.text.len();
            continue;
        }

        offset += token.text.len();
        column += token.text.chars().count();

        if token.is_comment() {
            continue;
        }

        if token.is_block_begin() {
            block_depth += 1;
            continue;
        }

        if token.is_block_end() {
            block_depth -= 1;
            builder.close_deeper_than(block_depth, token_offset, token_start);
            continue;
        }

        if !token.is_string() {
            if let Some((kind, prefixed)) = BlockKind::from_keyword(&token.text) {
                let title = look_ahead_for_title(tokens, i, TITLE_LOOKAHEAD);
                let skipped = prefixed || builder.parent_skipped();
                let node = TestNode::new(kind, title.trim(), skipped, token_offset, token_start);
                builder.open(node, block_depth + 1);
            }
        }

        if token.is_function_name() && token.text.to_lowercase().starts_with("test") {
            let node = TestNode::new(BlockKind::It, token.text.clone(), false, token_offset, token_start);
            builder.push_root(node);
        }
    }

    let roots = builder.finish();
    debug!(tokens = tokens.len(), roots = roots.len(), "parsed token stream");
    roots
}

/// Find a declaration's title in the tokens following `start`.
///
/// Returns the text of the first token strictly inside a string literal
/// (between its begin and end delimiters) within `max_search` tokens of
/// `start`. Only that single token is returned, so titles split across
/// several tokens (interpolation, escapes) are cut short. Empty when no
/// string is found in the window.
pub fn look_ahead_for_title(tokens: &[Token], start: usize, max_search: usize) -> String {
    let stop = tokens.len().min(start.saturating_add(max_search));
    let mut in_string = false;

    for token in tokens.iter().take(stop).skip(start) {
        let begin = token.is_string_begin();
        let end = token.is_string_end();
        if begin {
            in_string = true;
        }
        if end {
            in_string = false;
        }
        if in_string && !begin && !end {
            return token.text.clone();
        }
    }

    String::new()
}

struct OpenScope {
    node: usize,
    depth: isize,
}

#[derive(Default)]
struct TreeBuilder {
    arena: Vec<TestNode>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    stack: Vec<OpenScope>,
}

impl TreeBuilder {
    fn alloc(&mut self, node: TestNode) -> usize {
        self.arena.push(node);
        self.children.push(Vec::new());
        self.arena.len() - 1
    }

    fn parent_skipped(&self) -> bool {
        self.stack
            .last()
            .map(|scope| self.arena[scope.node].skipped)
            .unwrap_or(false)
    }

    fn open(&mut self, node: TestNode, depth: isize) {
        let index = self.alloc(node);
        match self.stack.last() {
            Some(parent) => self.children[parent.node].push(index),
            None => self.roots.push(index),
        }
        self.stack.push(OpenScope { node: index, depth });
    }

    fn push_root(&mut self, node: TestNode) {
        let index = self.alloc(node);
        self.roots.push(index);
    }

    fn close_deeper_than(&mut self, depth: isize, offset: usize, at: Position) {
        while let Some(top) = self.stack.last() {
            if top.depth <= depth {
                break;
            }
            let node = &mut self.arena[top.node];
            node.end_offset = Some(offset);
            node.end = Some(at);
            self.stack.pop();
        }
    }

    fn finish(self) -> Vec<TestNode> {
        let TreeBuilder {
            arena,
            children,
            roots,
            ..
        } = self;
        let mut slots: Vec<Option<TestNode>> = arena.into_iter().map(Some).collect();
        roots
            .iter()
            .filter_map(|&root| assemble(root, &mut slots, &children))
            .collect()
    }
}

fn assemble(index: usize, slots: &mut [Option<TestNode>], children: &[Vec<usize>]) -> Option<TestNode> {
    let mut node = slots[index].take()?;
    node.children = children[index]
        .iter()
        .filter_map(|&child| assemble(child, slots, children))
        .collect();
    Some(node)
}
