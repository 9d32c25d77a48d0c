//! External tokenizer process
//!
//! The token-stream parser needs a scope-tagged token stream, which comes
//! from the platform-specific `cftokens` binary. It is run as a black box:
//! `cftokens tokenize <path>` or `cftokens tokenize -` with the source on
//! stdin, answering with a JSON array of `[text, [scopes]]` pairs.

use crate::error::{Result, TestboxError};
use crate::node::TestNode;
use crate::token_parser::parse_tokens;
use crate::tokens::{self, Token};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, trace};

/// Name of the bundled tokenizer binary for a platform/arch pair.
///
/// On Linux the statically linked musl build is preferred when it is
/// present in `resources_dir`.
pub fn binary_name(platform: &str, arch: &str, resources_dir: &Path) -> Result<String> {
    let name = match (platform, arch) {
        ("windows", _) => "cftokens.exe",
        ("macos", "aarch64") => "cftokens_osx_arm",
        ("macos", "x86_64") => "cftokens_osx_x86_64",
        ("macos", _) => "cftokens_osx",
        ("linux", _) => {
            if resources_dir.join("cftokens_linux_musl").exists() {
                "cftokens_linux_musl"
            } else {
                "cftokens_linux"
            }
        }
        _ => {
            return Err(TestboxError::UnsupportedPlatform {
                platform: platform.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    Ok(name.to_string())
}

/// Path of the tokenizer binary for the running platform.
pub fn locate(resources_dir: &Path) -> Result<PathBuf> {
    let name = binary_name(std::env::consts::OS, std::env::consts::ARCH, resources_dir)?;
    let path = resources_dir.join(name);
    if !path.exists() {
        return Err(TestboxError::TokenizerNotFound(path));
    }
    Ok(path)
}

/// Handle on a tokenizer binary
#[derive(Debug, Clone)]
pub struct Tokenizer {
    binary: PathBuf,
}

impl Tokenizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Tokenizer { binary: binary.into() }
    }

    /// Use an explicit binary when given, otherwise the bundled one.
    pub fn resolve(explicit: Option<&Path>, resources_dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Ok(Tokenizer::new(path)),
            None => Ok(Tokenizer::new(locate(resources_dir)?)),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn tokenize_file(&self, path: &Path) -> Result<Vec<Token>> {
        debug!(binary = %self.binary.display(), file = %path.display(), "running tokenizer");
        let output = Command::new(&self.binary)
            .arg("tokenize")
            .arg(path)
            .output()
            .map_err(TestboxError::TokenizerSpawn)?;
        decode(output)
    }

    pub fn tokenize_text(&self, text: &str) -> Result<Vec<Token>> {
        debug!(binary = %self.binary.display(), bytes = text.len(), "running tokenizer on stdin");
        let mut child = Command::new(&self.binary)
            .args(["tokenize", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(TestboxError::TokenizerSpawn)?;

        // stdin is written from its own thread while stdout drains
        let writer = child.stdin.take().map(|mut stdin| {
            let text = text.to_string();
            std::thread::spawn(move || stdin.write_all(text.as_bytes()))
        });

        let output = child.wait_with_output().map_err(TestboxError::TokenizerSpawn)?;
        if let Some(handle) = writer {
            if let Ok(Err(e)) = handle.join() {
                trace!(error = %e, "tokenizer closed stdin early");
            }
        }
        decode(output)
    }

    /// Tokenize a file and parse its declarations.
    pub fn discover_file(&self, path: &Path) -> Result<Vec<TestNode>> {
        Ok(parse_tokens(&self.tokenize_file(path)?))
    }

    pub fn discover_text(&self, text: &str) -> Result<Vec<TestNode>> {
        Ok(parse_tokens(&self.tokenize_text(text)?))
    }
}

fn decode(output: Output) -> Result<Vec<Token>> {
    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        debug!(code, "tokenizer failed");
        return Err(TestboxError::TokenizerFailed {
            code,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let tokens = tokens::from_json(&stdout).map_err(TestboxError::TokenizerOutput)?;
    debug!(tokens = tokens.len(), "tokenizer finished");
    Ok(tokens)
}
