//! Error types for test discovery and result correlation
//!
//! Parsing and correlation never fail; only the collaborator boundaries
//! (tokenizer process, result payloads, configuration and execution log
//! files) produce errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for TestBox tree operations
pub type Result<T> = std::result::Result<T, TestboxError>;

/// Main error type for TestBox tree operations
#[derive(Error, Debug)]
pub enum TestboxError {
    #[error("cftokens exited with code {code}: {stderr}")]
    TokenizerFailed { code: i32, stderr: String },

    #[error("Failed to execute cftokens: {0}")]
    TokenizerSpawn(#[source] std::io::Error),

    #[error("Failed to parse output as JSON: {0}")]
    TokenizerOutput(#[source] serde_json::Error),

    #[error("Tokenizer binary not found: {}", .0.display())]
    TokenizerNotFound(PathBuf),

    #[error("Unsupported platform: {platform} arch: {arch}")]
    UnsupportedPlatform { platform: String, arch: String },

    #[error("Invalid result payload: {0}")]
    ResultPayload(#[source] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read execution log {}: {source}", .path.display())]
    ExecutionLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
