//! Configuration
//!
//! Settings come from an optional `testbox.toml`; command-line flags and
//! `TESTBOX_*` environment variables override them in the CLI. A project's
//! `box.json` may name the runner under `testbox.runner`.

use crate::error::{Result, TestboxError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "testbox.toml";
pub const DEFAULT_RUNNER_URL: &str = "http://localhost:8080/tests/runner.cfm";

/// Which block parser discovers tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    #[default]
    Text,
    Tokens,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runner_url: String,
    /// Explicit tokenizer binary; the bundled one is used when unset
    pub tokenizer_path: Option<PathBuf>,
    pub resources_dir: PathBuf,
    pub parser: ParserKind,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runner_url: DEFAULT_RUNNER_URL.to_string(),
            tokenizer_path: None,
            resources_dir: PathBuf::from("resources/cftokens"),
            parser: ParserKind::Text,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TestboxError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| TestboxError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config");
        Config::from_toml(&text)
    }

    /// Load `explicit` when given, otherwise `testbox.toml` in `dir` if it
    /// exists, otherwise defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Config::load(path);
        }
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Config::load(&candidate)
        } else {
            Ok(Config::default())
        }
    }

    /// `testbox.runner` from `dir/box.json`, if the manifest names one.
    ///
    /// An unreadable or malformed manifest is treated as absent.
    pub fn runner_from_box_json(dir: &Path) -> Option<String> {
        let text = fs::read_to_string(dir.join("box.json")).ok()?;
        let manifest: serde_json::Value = serde_json::from_str(&text).ok()?;
        match manifest.get("testbox")?.get("runner")? {
            serde_json::Value::String(url) if !url.is_empty() => Some(url.clone()),
            _ => None,
        }
    }

    /// Prefer the project's `box.json` runner over the configured default.
    pub fn with_box_json(mut self, dir: &Path) -> Self {
        if let Some(url) = Config::runner_from_box_json(dir) {
            debug!(runner = %url, "runner url from box.json");
            self.runner_url = url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.runner_url, DEFAULT_RUNNER_URL);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml("parser = \"tokens\"\nresources_dir = \"/opt/cftokens\"\n").unwrap();
        assert_eq!(config.parser, ParserKind::Tokens);
        assert_eq!(config.resources_dir, PathBuf::from("/opt/cftokens"));
        assert_eq!(config.runner_url, DEFAULT_RUNNER_URL);
    }

    #[test]
    fn test_invalid_file() {
        let err = Config::from_toml("parser = \"regex\"").unwrap_err();
        assert!(matches!(err, TestboxError::Config(_)));
    }

    #[test]
    fn test_discover() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::discover(None, dir.path()).unwrap(), Config::default());

        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "runner_url = \"http://ci/runner.cfm\"").unwrap();
        assert_eq!(Config::discover(None, dir.path()).unwrap().runner_url, "http://ci/runner.cfm");

        let missing = dir.path().join("nope.toml");
        assert!(Config::discover(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn test_box_json_runner() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::runner_from_box_json(dir.path()), None);

        fs::write(dir.path().join("box.json"), r#"{"name": "app", "testbox": {"runner": "http://localhost:9090/tests/runner.cfm"}}"#).unwrap();
        let config = Config::default().with_box_json(dir.path());
        assert_eq!(config.runner_url, "http://localhost:9090/tests/runner.cfm");
    }

    #[test]
    fn test_box_json_without_runner() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("box.json"), r#"{"testbox": {"runner": []}}"#).unwrap();
        assert_eq!(Config::runner_from_box_json(dir.path()), None);
        fs::write(dir.path().join("box.json"), "not json").unwrap();
        assert_eq!(Config::runner_from_box_json(dir.path()), None);
    }
}
