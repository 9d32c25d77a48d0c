//! Lucee execution logs
//!
//! Lucee's execution log writes one `.exl` file per request. A file has
//! three sections separated by blank lines: `key:value` header lines, an
//! index of `n:path` source files, and tab-separated metrics of
//! `file-index start end time` where `start`/`end` are character offsets
//! into the indexed file and `time` is in the header's `unit`.
//!
//! Parsing never fails. Unknown header lines are kept, lines without a
//! colon are dropped, and malformed metric lines are skipped.

use crate::error::{Result, TestboxError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Header keys every log carries, empty until the log sets them.
pub const KNOWN_KEYS: [&str; 12] = [
    "contextPath",
    "remoteUser",
    "remoteAddr",
    "remoteHost",
    "scriptName",
    "serverName",
    "protocol",
    "serverPort",
    "pathInfo",
    "unit",
    "minTimeNano",
    "executionTime",
];

/// Parsed header block with camelCased keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionLogHeader {
    pub keys: BTreeMap<String, String>,
    /// `query-string` split into its parameters
    pub query_string: BTreeMap<String, String>,
}

impl Default for ExecutionLogHeader {
    fn default() -> Self {
        ExecutionLogHeader {
            keys: KNOWN_KEYS
                .iter()
                .map(|key| (key.to_string(), String::new()))
                .collect(),
            query_string: BTreeMap::new(),
        }
    }
}

impl ExecutionLogHeader {
    pub fn parse(header: &str) -> Self {
        let mut parsed = ExecutionLogHeader::default();
        for line in header.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if key == "query-string" {
                parsed.query_string = parse_query_string(value);
            } else {
                parsed.keys.insert(camel_case(key), value.to_string());
            }
        }
        parsed
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    pub fn has_key(&self, key: &str) -> bool {
        key == "queryString" || self.keys.contains_key(key)
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query_string.get(name).map(String::as_str)
    }

    pub fn script_name(&self) -> &str {
        self.get("scriptName").unwrap_or_default()
    }

    pub fn unit(&self) -> &str {
        self.get("unit").unwrap_or_default()
    }

    pub fn execution_time(&self) -> Option<u64> {
        self.get("executionTime").and_then(|v| v.parse().ok())
    }
}

fn parse_query_string(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|param| !param.is_empty())
        .map(|param| match param.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (param.to_string(), String::new()),
        })
        .collect()
}

/// `min-time-nano` -> `minTimeNano`; underscores are dropped.
fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' => match chars.peek() {
                Some(next) if next.is_ascii_lowercase() => {
                    out.push(next.to_ascii_uppercase());
                    chars.next();
                }
                _ => out.push('-'),
            },
            '_' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Time spent in one span of a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionMetric {
    pub file: String,
    pub start_position: usize,
    pub end_position: usize,
    pub execution_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionLog {
    pub log_file_path: Option<PathBuf>,
    pub header: ExecutionLogHeader,
    /// Source files by their index in the log
    pub files: Vec<String>,
    pub metrics: Vec<ExecutionMetric>,
}

impl ExecutionLog {
    pub fn parse(content: &str) -> Self {
        let sections = sections(content);
        let header = sections
            .first()
            .map(|lines| ExecutionLogHeader::parse(&lines.join("\n")))
            .unwrap_or_default();

        let mut files: Vec<String> = Vec::new();
        for line in sections.get(1).into_iter().flatten() {
            let Some((index, path)) = line.split_once(':') else {
                continue;
            };
            let Ok(index) = index.trim().parse::<usize>() else {
                continue;
            };
            if files.len() <= index {
                files.resize(index + 1, String::new());
            }
            files[index] = path.trim().to_string();
        }

        let metrics = sections
            .get(2)
            .into_iter()
            .flatten()
            .filter_map(|line| {
                let metric = parse_metric(line, &files);
                if metric.is_none() {
                    trace!(line = %line, "skipping malformed metric line");
                }
                metric
            })
            .collect();

        ExecutionLog {
            log_file_path: None,
            header,
            files,
            metrics,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| TestboxError::ExecutionLog {
            path: path.to_path_buf(),
            source,
        })?;
        let mut log = ExecutionLog::parse(&content);
        log.log_file_path = Some(path.to_path_buf());
        Ok(log)
    }

    /// Total time per file, slowest first.
    pub fn time_by_file(&self) -> Vec<(String, u64)> {
        let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
        for metric in &self.metrics {
            *totals.entry(metric.file.as_str()).or_default() += metric.execution_time;
        }
        let mut totals: Vec<(String, u64)> = totals
            .into_iter()
            .map(|(file, time)| (file.to_string(), time))
            .collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        totals
    }
}

/// Non-blank lines grouped by blank-line separators, each line trimmed
fn sections(content: &str) -> Vec<Vec<&str>> {
    let mut sections = Vec::new();
    let mut current = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

fn parse_metric(line: &str, files: &[String]) -> Option<ExecutionMetric> {
    let mut fields = line.split('\t').map(str::trim);
    let index: usize = fields.next()?.parse().ok()?;
    let start_position = fields.next()?.parse().ok()?;
    let end_position = fields.next()?.parse().ok()?;
    let execution_time = fields.next()?.parse().ok()?;
    let file = files.get(index).filter(|f| !f.is_empty())?;
    Some(ExecutionMetric {
        file: file.clone(),
        start_position,
        end_position,
        execution_time,
    })
}

/// Every log file in one directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub logs: Vec<ExecutionLog>,
}

impl ExecutionReport {
    /// Read every regular file in `dir`, in path order. Subdirectories are
    /// not entered.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read_err = |source| TestboxError::ExecutionLog {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let logs = paths
            .iter()
            .map(|path| ExecutionLog::from_file(path))
            .collect::<Result<Vec<_>>>()?;
        debug!(dir = %dir.display(), logs = logs.len(), "read execution logs");
        Ok(ExecutionReport { logs })
    }

    pub fn add_log(&mut self, log: ExecutionLog) {
        self.logs.push(log);
    }

    pub fn logs(&self) -> &[ExecutionLog] {
        &self.logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const LOG: &str = "context-path:
remote-user:
remote-addr:127.0.0.1
remote-host:127.0.0.1
script-name:/tests/runner.cfm
server-name:127.0.0.1
protocol:HTTP/1.1
server-port:49616
path-info:
query-string:runid=xyz23334
unit:μs
min-time-nano:500
execution-time:38849

0:/TestBox/tests/Application.cfc
1:/TestBox/tests/runner.cfm
2:/TestBox/system/runners/HTMLRunner.cfm
3:/TestBox/system/TestBox.cfc

0\t1089\t1126\t145
0\t1129\t1184\t85
0\t1194\t1243\t1331
0\t1259\t1268\t15
0\t1012\t1018\t1
1\t0\t10\t8
1\t35\t36\t2
1\t120\t128\t10
1\t170\t178\t1
1\t226\t234\t12
";

    #[test]
    fn test_header_key_value() {
        let header = ExecutionLogHeader::parse("someheader:header\nkey2: value2\nkey3: value3");
        assert_eq!(header.get("someheader"), Some("header"));
        assert!(header.has_key("key3"));
    }

    #[test]
    fn test_header_trims_keys_and_values() {
        let header = ExecutionLogHeader::parse(" key1 : value1 \nkey2:    value2\n key3: value3 ");
        assert_eq!(header.get("key1"), Some("value1"));
        assert_eq!(header.get("key2"), Some("value2"));
    }

    #[test]
    fn test_header_ignores_lines_without_colon() {
        let header = ExecutionLogHeader::parse("key1: value1\ninvalidline\nkey2: value2");
        assert!(!header.has_key("invalidline"));
        assert!(header.has_key("key2"));

        let header = ExecutionLogHeader::parse("invalidline1\ninvalidline2");
        assert!(!header.has_key("invalidline1"));
        assert!(!header.has_key("invalidline2"));
    }

    #[test]
    fn test_empty_header_has_known_keys() {
        let header = ExecutionLogHeader::parse("");
        for key in KNOWN_KEYS {
            assert_eq!(header.get(key), Some(""), "missing {}", key);
        }
        assert!(header.has_key("queryString"));
        assert!(header.query_string.is_empty());
    }

    #[test]
    fn test_header_keys_are_camel_cased() {
        let header = ExecutionLogHeader::parse("min-time-nano:500\nserver_port:8080\nodd-Key:x");
        assert_eq!(header.get("minTimeNano"), Some("500"));
        assert_eq!(header.get("serverport"), Some("8080"));
        assert_eq!(header.get("odd-Key"), Some("x"));
    }

    #[test]
    fn test_query_string_is_split() {
        let header = ExecutionLogHeader::parse("query-string:runid=xyz23334&directory=luceeCoverage&flag");
        assert_eq!(header.query_value("runid"), Some("xyz23334"));
        assert_eq!(header.query_value("directory"), Some("luceeCoverage"));
        assert_eq!(header.query_value("flag"), Some(""));
        assert_eq!(header.query_value("missing"), None);
        assert!(!header.keys.contains_key("queryString"));
    }

    #[test]
    fn test_parse_log() {
        let log = ExecutionLog::parse(LOG);
        assert_eq!(log.header.query_value("runid"), Some("xyz23334"));
        assert_eq!(log.header.script_name(), "/tests/runner.cfm");
        assert_eq!(log.header.unit(), "μs");
        assert_eq!(log.header.execution_time(), Some(38849));
        assert_eq!(log.header.get("contextPath"), Some(""));
        assert_eq!(log.files.len(), 4);
        assert_eq!(log.files[3], "/TestBox/system/TestBox.cfc");
        assert_eq!(log.metrics.len(), 10);
        assert_eq!(
            log.metrics[0],
            ExecutionMetric {
                file: "/TestBox/tests/Application.cfc".to_string(),
                start_position: 1089,
                end_position: 1126,
                execution_time: 145,
            }
        );
        assert_eq!(log.metrics[9].file, "/TestBox/tests/runner.cfm");
    }

    #[test]
    fn test_indented_log_parses_the_same() {
        let indented: String = LOG.lines().map(|l| format!("    {}\n", l)).collect();
        assert_eq!(ExecutionLog::parse(&indented), ExecutionLog::parse(LOG));
    }

    #[test]
    fn test_malformed_metric_lines_are_skipped() {
        let content = "unit:ms\n\n0:/a.cfc\n\n0\t1\t2\t3\n0\t1\t2\nx\t1\t2\t3\n0\t1\tfoo\t3\n7\t1\t2\t3\n0\t4\t5\t6\n";
        let log = ExecutionLog::parse(content);
        let times: Vec<u64> = log.metrics.iter().map(|m| m.execution_time).collect();
        assert_eq!(times, vec![3, 6]);
    }

    #[test]
    fn test_empty_log() {
        let log = ExecutionLog::parse("");
        assert!(log.files.is_empty());
        assert!(log.metrics.is_empty());
        assert_eq!(log.header, ExecutionLogHeader::default());
    }

    #[test]
    fn test_time_by_file() {
        let log = ExecutionLog::parse(LOG);
        assert_eq!(
            log.time_by_file(),
            vec![
                ("/TestBox/tests/Application.cfc".to_string(), 1577),
                ("/TestBox/tests/runner.cfm".to_string(), 33),
            ]
        );
    }

    #[test]
    fn test_report_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.exl"), LOG).unwrap();
        fs::write(dir.path().join("a.exl"), "unit:ms\n").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let report = ExecutionReport::from_dir(dir.path()).unwrap();
        assert_eq!(report.logs().len(), 2);
        assert_eq!(report.logs()[0].log_file_path, Some(dir.path().join("a.exl")));
        assert_eq!(report.logs()[1].metrics.len(), 10);
    }

    #[test]
    fn test_report_from_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = ExecutionReport::from_dir(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, TestboxError::ExecutionLog { .. }));
    }

    #[test]
    fn test_add_log() {
        let mut report = ExecutionReport::default();
        report.add_log(ExecutionLog::parse(LOG));
        assert_eq!(report.logs().len(), 1);
    }
}
