//! Terminal rendering of run results
//!
//! Produces the summary table, the per-bundle result tree and the compact
//! icon line. Output uses `\r\n` line breaks, which editor output channels
//! and terminals both accept.

use crate::results::{BundleResult, SpecResult, SpecStatus, SuiteResult, TestResult};
use chrono::DateTime;
use colored::*;

const NL: &str = "\r\n";
const CELL_WIDTH: usize = 10;
const ICON_LIMIT: i64 = 30;

/// Column headers of the summary table
pub const SUMMARY_HEADER: [&str; 7] = ["Passed", "Failed", "Errored", "Skipped", "Bundles", "Suites", "Specs"];

/// Draw a one-row table with double-line borders.
///
/// Cells are a leading space plus the value, padded to 10 characters.
/// Longer values widen their cell and break the border alignment.
pub fn draw_table<T: ToString>(header: &[&str], data: &[T]) -> String {
    let bar = "═".repeat(CELL_WIDTH);
    let bars = vec![bar; header.len()];
    let row = |cells: Vec<String>| {
        let cells: Vec<String> = cells
            .into_iter()
            .map(|cell| format!("{:<width$}", format!(" {}", cell), width = CELL_WIDTH))
            .collect();
        format!("║{}║", cells.join("║"))
    };

    [
        format!("╔{}╗", bars.join("╦")),
        row(header.iter().map(|h| h.to_string()).collect()),
        format!("╠{}╣", bars.join("╬")),
        row(data.iter().map(ToString::to_string).collect()),
        format!("╚{}╝", bars.join("╩")),
    ]
    .join(NL)
}

/// One glyph per passed/failed/errored/skipped spec, or glyph plus count
/// past 30. A negative error total still shows a single error glyph.
pub fn icon_summary(result: &TestResult) -> String {
    let mut out = String::new();
    let mut group = |icon: &str, count: i64| {
        if count > ICON_LIMIT {
            out.push_str(&format!("{}({}) ", icon, count));
        } else if count > 0 {
            out.push_str(&icon.repeat(count as usize));
            out.push(' ');
        }
    };

    group("✅", result.total_pass.max(0));
    group("❌", result.total_fail.max(0));
    if result.total_error < 0 {
        group("⚠️", 1);
    } else {
        group("⚠️", result.total_error);
    }
    group("-", result.total_skipped.max(0));

    out.trim().to_string()
}

fn prefix(status: SpecStatus) -> ColoredString {
    match status {
        SpecStatus::Failed => "X ".red(),
        SpecStatus::Errored => "!! ".red(),
        SpecStatus::Skipped => "- ".blue(),
        SpecStatus::Passed | SpecStatus::Unknown => "√ ".green(),
    }
}

/// Render a whole run: summary table, bundles, footer and legend.
pub fn render_result(result: &TestResult) -> String {
    let mut out = String::from(NL);

    let table = draw_table(
        &SUMMARY_HEADER,
        &[
            result.total_pass,
            result.total_fail,
            result.total_error,
            result.total_skipped,
            result.total_bundles,
            result.total_suites,
            result.total_specs,
        ],
    );
    let table = if result.total_fail != 0 || result.total_error != 0 {
        table.red()
    } else if result.total_skipped != 0 && result.total_pass == 0 {
        table.blue()
    } else {
        table.green()
    };
    out.push_str(&format!("{}{}", table.bold(), NL));

    for bundle in &result.bundles {
        render_bundle(&mut out, bundle);
    }

    let labels = if result.labels.is_empty() {
        "---".to_string()
    } else {
        result.labels.join(", ")
    };
    out.push_str(&format!("{}\t\t{}{}", "TestBox".bold(), result.version, NL));
    out.push_str(&format!(
        "{}\t{} v{}{}",
        "CFML Engine".bold(),
        result.cfml_engine,
        result.cfml_engine_version,
        NL
    ));
    out.push_str(&format!("{}\t{}ms{}", "Duration".bold(), result.total_duration, NL));
    if let Some(started) = DateTime::from_timestamp_millis(result.start_time).filter(|_| result.start_time > 0) {
        out.push_str(&format!("{}\t\t{}{}", "Started".bold(), started.format("%Y-%m-%d %H:%M:%S UTC"), NL));
    }
    out.push_str(&format!("{}\t\t{}{}", "Labels".bold(), labels, NL));
    out.push_str(NL);
    out.push_str(&format!(
        "{}Passed  {}Skipped  {}Exception/Error  {}Failure{}",
        prefix(SpecStatus::Passed),
        prefix(SpecStatus::Skipped),
        prefix(SpecStatus::Errored),
        prefix(SpecStatus::Failed),
        NL
    ));
    out
}

fn render_bundle(out: &mut String, bundle: &BundleResult) {
    // Nothing ran in this bundle
    if bundle.total_suites == 0 && bundle.total_specs == 0 {
        return;
    }

    let status = if bundle.total_fail > 0 || bundle.total_error > 0 {
        SpecStatus::Failed
    } else {
        SpecStatus::Passed
    };
    let title = format!("{}{} ({} ms)", prefix(status), bundle.name, bundle.total_duration);
    out.push_str(&format!("{}{}", title.bold(), NL));
    out.push_str(&format!(
        "[Passed: {}] [Failed: {}] [Errors: {}] [Skipped: {}] [Suites/Specs: {}/{}]{}{}",
        bundle.total_pass,
        bundle.total_fail,
        bundle.total_error,
        bundle.total_skipped,
        bundle.total_suites,
        bundle.total_specs,
        NL,
        NL
    ));

    for suite in &bundle.suites {
        render_suite(out, suite, 1);
        out.push_str(NL);
        out.push_str(NL);
    }
}

fn render_suite(out: &mut String, suite: &SuiteResult, depth: usize) {
    let indent = " ".repeat(depth);
    out.push_str(&format!(
        "{}{}{} ( {} ms){}",
        indent,
        prefix(suite.status),
        suite.name,
        suite.total_duration,
        NL
    ));
    for child in &suite.suites {
        render_suite(out, child, depth + 1);
    }
    for spec in &suite.specs {
        render_spec(out, spec, depth + 1);
    }
}

fn render_spec(out: &mut String, spec: &SpecResult, depth: usize) {
    let indent = " ".repeat(depth);
    out.push_str(&format!(
        "{}{}{} ( {} ms){}",
        indent,
        prefix(spec.status),
        spec.name,
        spec.total_duration,
        NL
    ));
    if spec.status == SpecStatus::Failed {
        let failure = format!("-> Failure: {}", spec.fail_message);
        out.push_str(&format!("{} {}{}", indent, failure.red(), NL));
    }
}
