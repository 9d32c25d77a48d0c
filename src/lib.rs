//! TestBox test discovery
//!
//! Finds BDD test declarations (`describe`, `it`, `given`, `when`, `then`,
//! `feature`, `scenario`, `story` and their `x`-prefixed skipped forms) in
//! CFML sources, builds bundle/suite/spec trees with source ranges and
//! runner URLs, and correlates TestBox JSON run results back onto them.
//! Lucee execution logs can be read for per-file timing.

pub mod catalog;
pub mod config;
pub mod correlate;
pub mod error;
pub mod exec_log;
pub mod node;
pub mod position;
pub mod report;
pub mod results;
pub mod text_parser;
pub mod token_parser;
pub mod tokenizer;
pub mod tokens;
pub mod tree;

pub use error::{Result, TestboxError};
pub use node::{BlockKind, SourceInput, TestNode};
pub use tree::{NodeId, TestTree};
