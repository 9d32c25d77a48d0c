//! Integration tests for testbox-tree CLI commands
//!
//! Tests the CLI commands: parse, tree, results, tokenize, exec-log

use std::process::Command;

/// Helper to run testbox-tree and capture output
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_testbox-tree"))
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("TESTBOX_RUNNER_URL")
        .env_remove("TESTBOX_TOKENIZER")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute testbox-tree");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

// ============================================================================
// testbox-tree parse
// ============================================================================

#[test]
fn test_parse_text_outline() {
    let (stdout, stderr, code) = run_cli(&["parse", "tests/fixtures/CalculatorTest.cfc"]);
    assert_eq!(code, 0, "parse failed: {}", stderr);
    assert!(stdout.contains("describe \"Calculator\""));
    assert!(stdout.contains("  it \"divides by zero\""));
    assert!(stdout.contains("(skipped)"));
    assert!(stdout.contains("10 declarations"));
    assert!(!stdout.contains("Disabled"));
}

#[test]
fn test_parse_json() {
    let (stdout, _, code) = run_cli(&["parse", "tests/fixtures/CalculatorTest.cfc", "--json"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("parse --json should output valid JSON");
    let roots = json.as_array().unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0]["kind"], "describe");
    assert_eq!(roots[1]["kind"], "feature");
    assert_eq!(roots[0]["start"]["line"], 3);
}

#[test]
fn test_parse_token_stream() {
    let (stdout, stderr, code) = run_cli(&[
        "parse",
        "tests/fixtures/SmallTest.cfc",
        "--tokens",
        "tests/fixtures/SmallTest.tokens.json",
        "--json",
    ]);
    assert_eq!(code, 0, "parse --tokens failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let children = json[0]["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[1]["title"], "divides by zero");
    assert_eq!(children[1]["skipped"], true);
}

#[test]
fn test_parse_nonexistent_file() {
    let (_, stderr, code) = run_cli(&["parse", "tests/fixtures/Missing.cfc"]);
    assert_ne!(code, 0, "parse should fail for nonexistent file");
    assert!(stderr.contains("Error"));
}

#[test]
fn test_parse_bad_token_stream() {
    let (_, stderr, code) = run_cli(&[
        "parse",
        "tests/fixtures/SmallTest.cfc",
        "--tokens",
        "tests/fixtures/run_results.json",
    ]);
    assert_ne!(code, 0);
    assert!(stderr.contains("is not a token stream"));
}

// ============================================================================
// testbox-tree tree
// ============================================================================

#[test]
fn test_tree_ids_and_urls() {
    let (stdout, stderr, code) = run_cli(&[
        "tree",
        "tests/fixtures/CalculatorTest.cfc",
        "--package",
        "tests.specs.CalculatorTest",
        "--runner-url",
        "http://127.0.0.1:8500/tests/runner.cfm",
    ]);
    assert_eq!(code, 0, "tree failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["package_name"], "tests.specs.CalculatorTest");
    assert_eq!(json["directory"], "tests.specs");

    let nodes = json["nodes"].as_array().unwrap();
    assert_eq!(nodes[0]["id"], "bundle_tests.specs.CalculatorTest");
    assert_eq!(nodes[1]["id"], "bundle_tests.specs.CalculatorTest_suite_Calculator");
    assert!(nodes[1]["url"]
        .as_str()
        .unwrap()
        .starts_with("http://127.0.0.1:8500/tests/runner.cfm?method=runRemote"));
}

#[test]
fn test_tree_default_package_is_file_stem() {
    let (stdout, _, code) = run_cli(&["tree", "tests/fixtures/SmallTest.cfc"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["nodes"][0]["id"], "bundle_SmallTest");
    assert!(json["runner_url"].as_str().unwrap().ends_with("/tests/runner.cfm"));
}

// ============================================================================
// testbox-tree results
// ============================================================================

#[test]
fn test_results_render() {
    let (stdout, stderr, code) = run_cli(&["results", "tests/fixtures/run_results.json"]);
    assert_eq!(code, 0, "results failed: {}", stderr);
    assert!(stdout.contains("║ Passed   ║ Failed   ║"));
    assert!(stdout.contains("tests.specs.CalculatorTest (41 ms)"));
    assert!(stdout.contains("-> Failure: Expected [3] but received [2]"));
    assert!(stdout.contains("✅✅ ❌ -"));
}

#[test]
fn test_results_icons_only() {
    let (stdout, _, code) = run_cli(&["results", "tests/fixtures/run_results.json", "--icons"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "✅✅ ❌ -");
}

#[test]
fn test_results_correlated_with_source() {
    let (stdout, stderr, code) = run_cli(&[
        "results",
        "tests/fixtures/run_results.json",
        "--spec-tree",
        "tests/fixtures/CalculatorTest.cfc",
        "--package",
        "tests.specs.CalculatorTest",
    ]);
    assert_eq!(code, 0, "results --spec-tree failed: {}", stderr);
    assert!(stdout.contains("✓ bundle_tests.specs.CalculatorTest_suite_Calculator_spec_adds two numbers (4 ms)"));
    assert!(stdout.contains("✗ bundle_tests.specs.CalculatorTest_suite_Calculator_suite_Rounding_spec_rounds half up (9 ms)"));
    assert!(stdout.contains("at tests/fixtures/CalculatorTest.cfc:15:6"));
    assert!(stdout.contains("4 matched, 0 without results"));
}

#[test]
fn test_results_rejects_bad_payload() {
    let (_, stderr, code) = run_cli(&["results", "tests/fixtures/SmallTest.cfc"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid result payload"));
}

// ============================================================================
// testbox-tree tokenize
// ============================================================================

#[test]
fn test_tokenize_without_tokenizer_fails_cleanly() {
    let (_, stderr, code) = run_cli(&[
        "tokenize",
        "tests/fixtures/SmallTest.cfc",
        "--tokenizer",
        "tests/fixtures/no-such-cftokens",
    ]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Failed to execute cftokens"));
}

// ============================================================================
// testbox-tree exec-log
// ============================================================================

#[test]
fn test_exec_log_directory() {
    let (stdout, stderr, code) = run_cli(&["exec-log", "tests/fixtures/exec_logs"]);
    assert_eq!(code, 0, "exec-log failed: {}", stderr);
    assert!(stdout.contains("run_a.exl /tests/runner.cfm (38849 μs)"));
    assert!(stdout.contains("      1577 μs  /TestBox/tests/Application.cfc"));
    assert!(stdout.contains("10 metrics across 4 files"));
    assert!(stdout.contains("       335 μs  /app/models/Calculator.cfc"));
    assert!(stdout.contains("3 metrics across 2 files"));
}

#[test]
fn test_exec_log_single_file_json() {
    let (stdout, _, code) = run_cli(&["exec-log", "tests/fixtures/exec_logs/run_b.exl", "--json"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let logs = json["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["header"]["query_string"]["reporter"], "JSON");
    assert_eq!(logs[0]["metrics"][0]["file"], "/app/tests/specs/CalculatorTest.cfc");
}

#[test]
fn test_exec_log_missing_path() {
    let (_, stderr, code) = run_cli(&["exec-log", "tests/fixtures/no-such.exl"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Failed to read execution log"));
}
