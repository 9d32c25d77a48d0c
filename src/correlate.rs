//! Result correlation
//!
//! Matches runtime spec results to discovered tree nodes by name and reports
//! one terminal outcome per matched spec to an `OutcomeSink`. Matching uses
//! the composite key `"{spec}___{suite}"`; same-titled specs under
//! same-titled suites cannot be told apart and the last result wins.

use crate::position::Position;
use crate::results::{SpecResult, SpecStatus, TestResult};
use crate::tree::{NodeId, TestTree};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Receiver of test outcomes, e.g. an editor's test run
pub trait OutcomeSink {
    fn started(&mut self, node: NodeId);
    fn passed(&mut self, node: NodeId, duration: i64);
    fn failed(&mut self, node: NodeId, message: &str, duration: i64);
    fn errored(&mut self, node: NodeId, message: &str, duration: i64);
    fn skipped(&mut self, node: NodeId, duration: i64);
    fn append_output(&mut self, text: &str, at: Position, node: NodeId);
}

/// A recorded sink call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Started { node: NodeId },
    Passed { node: NodeId, duration: i64 },
    Failed { node: NodeId, message: String, duration: i64 },
    Errored { node: NodeId, message: String, duration: i64 },
    Skipped { node: NodeId, duration: i64 },
    Output { node: NodeId, text: String, at: Position },
}

impl Outcome {
    pub fn node(&self) -> NodeId {
        match self {
            Outcome::Started { node }
            | Outcome::Passed { node, .. }
            | Outcome::Failed { node, .. }
            | Outcome::Errored { node, .. }
            | Outcome::Skipped { node, .. }
            | Outcome::Output { node, .. } => *node,
        }
    }

    /// Passed, failed, errored or skipped
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Started { .. } | Outcome::Output { .. })
    }
}

/// Sink that keeps every call in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<Outcome>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminal outcomes recorded for `node`
    pub fn outcomes_for(&self, node: NodeId) -> Vec<&Outcome> {
        self.events
            .iter()
            .filter(|e| e.node() == node && e.is_terminal())
            .collect()
    }
}

impl OutcomeSink for RecordingSink {
    fn started(&mut self, node: NodeId) {
        self.events.push(Outcome::Started { node });
    }

    fn passed(&mut self, node: NodeId, duration: i64) {
        self.events.push(Outcome::Passed { node, duration });
    }

    fn failed(&mut self, node: NodeId, message: &str, duration: i64) {
        self.events.push(Outcome::Failed {
            node,
            message: message.to_string(),
            duration,
        });
    }

    fn errored(&mut self, node: NodeId, message: &str, duration: i64) {
        self.events.push(Outcome::Errored {
            node,
            message: message.to_string(),
            duration,
        });
    }

    fn skipped(&mut self, node: NodeId, duration: i64) {
        self.events.push(Outcome::Skipped { node, duration });
    }

    fn append_output(&mut self, text: &str, at: Position, node: NodeId) {
        self.events.push(Outcome::Output {
            node,
            text: text.to_string(),
            at,
        });
    }
}

/// Counts from one `correlate_run` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelationSummary {
    /// Tree specs that received an outcome
    pub matched: usize,
    /// Tree specs with no result of the same name
    pub unmatched: usize,
    pub wholly_skipped: bool,
}

/// Report one spec result on `node`.
///
/// A `totalError` of `-1` is always a failure. Otherwise the status picks
/// the outcome, and a missing or unknown status counts as errored. Failures
/// and errors also echo their message at the best known source position.
pub fn update_node_with_result(tree: &TestTree, node: NodeId, result: &SpecResult, sink: &mut impl OutcomeSink) {
    let duration = result.total_duration;

    if result.total_error == -1 {
        sink.failed(node, "Test Failed", duration);
        return;
    }

    match result.status {
        SpecStatus::Passed => sink.passed(node, duration),
        SpecStatus::Skipped => sink.skipped(node, duration),
        SpecStatus::Failed => {
            let at = failure_position(tree, node, result);
            sink.append_output(&format!("{}\r\n", result.fail_message), at, node);
            sink.failed(node, &result.fail_message, duration);
        }
        SpecStatus::Errored => {
            let at = failure_position(tree, node, result);
            sink.append_output(&format!("{}\r\n", result.fail_message), at, node);
            sink.errored(node, &result.fail_message, duration);
        }
        SpecStatus::Unknown => sink.errored(node, "Test Errored", duration),
    }
}

/// Position of the first stack frame inside the tree's own file, or the
/// node's declared start.
fn failure_position(tree: &TestTree, node: NodeId, result: &SpecResult) -> Position {
    let path = tree.path.to_string_lossy();
    result
        .fail_origin
        .iter()
        .find(|frame| frame.template == path)
        .map(|frame| Position::new(one_based(frame.line), one_based(frame.column)))
        .or_else(|| tree.node(node).map(|n| n.range.start))
        .unwrap_or_default()
}

fn one_based(value: i64) -> usize {
    usize::try_from(value.saturating_sub(1)).unwrap_or(0)
}

/// Apply a run's results to the subtree that was executed.
///
/// `run_node` is the node the run was started for. It receives `started`,
/// and when every spec of the run was skipped it receives a single
/// `skipped` and nothing else. Each spec under it (itself included) whose
/// `"{title}___{parent title}"` matches a result is then updated.
pub fn correlate_run(tree: &TestTree, run_node: NodeId, result: &TestResult, sink: &mut impl OutcomeSink) -> CorrelationSummary {
    sink.started(run_node);

    let mut lookup: HashMap<String, &SpecResult> = HashMap::new();
    for spec in result.specs() {
        lookup.insert(composite_key(&spec.name, &spec.suite_name), spec);
    }

    let mut summary = CorrelationSummary {
        wholly_skipped: result.is_wholly_skipped(),
        ..Default::default()
    };
    if summary.wholly_skipped {
        sink.skipped(run_node, result.total_duration);
    }

    for spec in tree.specs_under(run_node) {
        if summary.wholly_skipped && spec == run_node {
            continue;
        }
        let Some(node) = tree.node(spec) else {
            continue;
        };
        let parent = tree.parent(spec).map(|p| p.title.as_str()).unwrap_or_default();
        match lookup.get(&composite_key(&node.title, parent)) {
            Some(spec_result) => {
                update_node_with_result(tree, spec, spec_result, sink);
                summary.matched += 1;
            }
            None => {
                trace!(id = %node.id, "no result for spec");
                summary.unmatched += 1;
            }
        }
    }

    debug!(
        matched = summary.matched,
        unmatched = summary.unmatched,
        results = lookup.len(),
        "correlated run"
    );
    summary
}

fn composite_key(name: &str, parent: &str) -> String {
    format!("{}___{}", name, parent)
}
