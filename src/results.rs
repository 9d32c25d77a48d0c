//! TestBox run result payload
//!
//! The runner's JSON reporter answers with run totals and a
//! `bundleStats -> suiteStats -> specStats` hierarchy (suites nest). Every
//! field is optional on the wire: missing or `null` counters read as 0,
//! missing arrays as empty. Totals are the runner's own rollups and are
//! never recomputed here.

use crate::error::{Result, TestboxError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Outcome of a spec or suite as reported by the runner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SpecStatus {
    Passed,
    Failed,
    Errored,
    Skipped,
    /// Missing or unrecognized status
    #[default]
    Unknown,
}

impl From<&str> for SpecStatus {
    fn from(status: &str) -> Self {
        match status {
            "Passed" => SpecStatus::Passed,
            "Failed" => SpecStatus::Failed,
            "Errored" | "Error" => SpecStatus::Errored,
            "Skipped" => SpecStatus::Skipped,
            _ => SpecStatus::Unknown,
        }
    }
}

/// One frame of a failure's origin stack. `line` and `column` are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StackFrame {
    #[serde(deserialize_with = "null_as_default")]
    pub template: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub line: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub column: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecResult {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "status_value")]
    pub status: SpecStatus,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_duration: i64,
    /// `-1` marks a failure without structured error details
    #[serde(deserialize_with = "lenient_i64")]
    pub total_error: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub start_time: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub end_time: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub fail_message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fail_detail: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fail_extended_info: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fail_stacktrace: String,
    #[serde(deserialize_with = "frames")]
    pub fail_origin: Vec<StackFrame>,
    #[serde(rename = "suiteID", deserialize_with = "null_as_default")]
    pub suite_id: String,
    /// Name of the suite that owns this spec, filled in after decoding
    #[serde(skip)]
    pub suite_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuiteResult {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "status_value")]
    pub status: SpecStatus,
    #[serde(rename = "bundleID", deserialize_with = "null_as_default")]
    pub bundle_id: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_pass: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_fail: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_error: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_skipped: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_specs: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_duration: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub start_time: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub end_time: i64,
    #[serde(rename = "specStats", deserialize_with = "null_as_default")]
    pub specs: Vec<SpecResult>,
    #[serde(rename = "suiteStats", deserialize_with = "null_as_default")]
    pub suites: Vec<SuiteResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundleResult {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_pass: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_fail: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_error: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_skipped: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_suites: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_specs: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_duration: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub start_time: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub end_time: i64,
    #[serde(rename = "suiteStats", deserialize_with = "null_as_default")]
    pub suites: Vec<SuiteResult>,
}

/// Run-level result of one runner invocation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestResult {
    #[serde(rename = "resultID", deserialize_with = "null_as_default")]
    pub result_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(rename = "CFMLEngine", deserialize_with = "null_as_default")]
    pub cfml_engine: String,
    #[serde(rename = "CFMLEngineVersion", deserialize_with = "null_as_default")]
    pub cfml_engine_version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_pass: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_fail: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_error: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_skipped: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_bundles: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_suites: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_specs: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub total_duration: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub start_time: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub end_time: i64,
    #[serde(rename = "bundleStats", deserialize_with = "null_as_default")]
    pub bundles: Vec<BundleResult>,
}

/// Decode a runner payload.
pub fn parse_results(payload: &str) -> Result<TestResult> {
    let mut result: TestResult = serde_json::from_str(payload).map_err(TestboxError::ResultPayload)?;
    for bundle in &mut result.bundles {
        for suite in &mut bundle.suites {
            record_suite_names(suite);
        }
    }
    Ok(result)
}

fn record_suite_names(suite: &mut SuiteResult) {
    for spec in &mut suite.specs {
        spec.suite_name = suite.name.clone();
    }
    for child in &mut suite.suites {
        record_suite_names(child);
    }
}

impl TestResult {
    /// Every spec of the run, depth first.
    pub fn specs(&self) -> Vec<&SpecResult> {
        self.bundles.iter().flat_map(BundleResult::specs).collect()
    }

    /// First suite named `name`, searching nested suites depth first.
    pub fn find_suite(&self, name: &str) -> Option<&SuiteResult> {
        self.bundles.iter().find_map(|b| find_suite_in(&b.suites, name))
    }

    /// Bundles that actually ran at least one suite.
    pub fn bundles_with_suites(&self) -> impl Iterator<Item = &BundleResult> {
        self.bundles.iter().filter(|b| b.total_suites > 0)
    }

    /// Every spec was skipped, which the runner reports on the run itself.
    pub fn is_wholly_skipped(&self) -> bool {
        self.total_skipped == self.total_specs
    }
}

impl BundleResult {
    pub fn specs(&self) -> Vec<&SpecResult> {
        self.suites.iter().flat_map(SuiteResult::specs).collect()
    }
}

impl SuiteResult {
    /// Own specs first, then those of nested suites.
    pub fn specs(&self) -> Vec<&SpecResult> {
        let mut specs: Vec<&SpecResult> = self.specs.iter().collect();
        for suite in &self.suites {
            specs.extend(suite.specs());
        }
        specs
    }
}

fn find_suite_in<'a>(suites: &'a [SuiteResult], name: &str) -> Option<&'a SuiteResult> {
    for suite in suites {
        if suite.name == name {
            return Some(suite);
        }
        if let Some(found) = find_suite_in(&suite.suites, name) {
            return Some(found);
        }
    }
    None
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Numbers may arrive as integers, floats, numeric strings or `null`.
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    })
}

fn status_value<'de, D>(deserializer: D) -> std::result::Result<SpecStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => SpecStatus::from(s.as_str()),
        _ => SpecStatus::Unknown,
    })
}

/// `failOrigin` is an array of frames, or an empty object when there is none.
fn frames<'de, D>(deserializer: D) -> std::result::Result<Vec<StackFrame>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
