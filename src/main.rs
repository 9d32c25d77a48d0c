//! TestBox tree CLI
//!
//! Command-line front end for discovering TestBox specs in CFML sources and
//! rendering or correlating run results.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use testbox_tree::{
    config::{Config, ParserKind},
    correlate::{correlate_run, Outcome, RecordingSink},
    exec_log::{ExecutionLog, ExecutionReport},
    node::TestNode,
    report::{icon_summary, render_result},
    results::parse_results,
    text_parser::parse_blocks,
    token_parser::parse_tokens,
    tokenizer::Tokenizer,
    tokens::{self, ScopeReport},
    tree::{TestTree, BUNDLE},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "testbox-tree")]
#[command(version)]
#[command(about = "Discover TestBox BDD specs in CFML sources and correlate run results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./testbox.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover test declarations in a source file
    ///
    /// Uses the text parser unless a token stream is given or the
    /// configuration selects the tokenizer:
    ///   testbox-tree parse tests/specs/CalculatorTest.cfc
    ///   testbox-tree parse CalculatorTest.cfc --tokens CalculatorTest.tokens.json
    Parse {
        /// The source file to scan
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Pre-tokenized stream (JSON array of [text, scopes] pairs)
        #[arg(long, value_name = "JSON")]
        tokens: Option<PathBuf>,

        /// Parser to use when no token stream is given
        #[arg(long, value_enum)]
        parser: Option<ParserKind>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the external tokenizer on a source file
    Tokenize {
        /// The source file to tokenize
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Group tokens by scope instead of listing them
        #[arg(long)]
        report: bool,

        /// Tokenizer binary to run instead of the bundled one
        #[arg(long, env = "TESTBOX_TOKENIZER", value_name = "PATH")]
        tokenizer: Option<PathBuf>,
    },
    /// Build the bundle/suite/spec tree with ids and runner URLs (JSON)
    Tree {
        /// The source file to scan
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Dotted component name (defaults to the file stem)
        #[arg(long, value_name = "NAME")]
        package: Option<String>,

        /// TestBox runner URL
        #[arg(long, env = "TESTBOX_RUNNER_URL", value_name = "URL")]
        runner_url: Option<String>,

        /// Pre-tokenized stream (JSON array of [text, scopes] pairs)
        #[arg(long, value_name = "JSON")]
        tokens: Option<PathBuf>,
    },
    /// Render a TestBox JSON result payload
    ///
    /// With --spec-tree, the results are also matched against the tests
    /// discovered in that source file:
    ///   testbox-tree results run.json --spec-tree CalculatorTest.cfc --package tests.CalculatorTest
    Results {
        /// The JSON payload returned by the runner
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        /// Source file whose tests the payload belongs to
        #[arg(long, value_name = "FILE")]
        spec_tree: Option<PathBuf>,

        /// Dotted component name of --spec-tree (defaults to the file stem)
        #[arg(long, value_name = "NAME", requires = "spec_tree")]
        package: Option<String>,

        /// Only print the icon summary line
        #[arg(long)]
        icons: bool,
    },
    /// Summarize Lucee execution logs
    ///
    /// Takes one .exl file or a directory of them and prints the time spent
    /// per source file:
    ///   testbox-tree exec-log /opt/lucee/execution-logs
    ExecLog {
        /// An execution log file or a directory of log files
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Parse {
            file,
            tokens,
            parser,
            json,
        } => parse_file(&file, tokens.as_deref(), parser.unwrap_or(config.parser), json, &config),
        Commands::Tokenize {
            file,
            report,
            tokenizer,
        } => tokenize_file(&file, report, tokenizer.as_deref(), &config),
        Commands::Tree {
            file,
            package,
            runner_url,
            tokens,
        } => print_tree(&file, package, runner_url, tokens.as_deref(), &config),
        Commands::Results {
            payload,
            spec_tree,
            package,
            icons,
        } => show_results(&payload, spec_tree.as_deref(), package, icons, &config),
        Commands::ExecLog { path, json } => show_exec_log(&path, json),
    });

    if let Err(e) = result {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let cwd = std::env::current_dir()?;
    Ok(Config::discover(explicit, &cwd)?.with_box_json(&cwd))
}

fn discover(file: &Path, tokens_json: Option<&Path>, parser: ParserKind, config: &Config) -> anyhow::Result<Vec<TestNode>> {
    if let Some(tokens_path) = tokens_json {
        let json = fs::read_to_string(tokens_path)
            .with_context(|| format!("reading {}", tokens_path.display()))?;
        let tokens = tokens::from_json(&json)
            .with_context(|| format!("{} is not a token stream", tokens_path.display()))?;
        return Ok(parse_tokens(&tokens));
    }

    match parser {
        ParserKind::Text => {
            let source = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
            Ok(parse_blocks(&source))
        }
        ParserKind::Tokens => {
            let tokenizer = Tokenizer::resolve(config.tokenizer_path.as_deref(), &config.resources_dir)?;
            Ok(tokenizer.discover_file(file)?)
        }
    }
}

fn parse_file(file: &Path, tokens_json: Option<&Path>, parser: ParserKind, json: bool, config: &Config) -> anyhow::Result<()> {
    let nodes = discover(file, tokens_json, parser, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    for node in &nodes {
        print_node(node, 0);
    }
    let total: usize = nodes.iter().map(TestNode::count).sum();
    println!("{} {} declarations in {}", "✓".green(), total, file.display());
    Ok(())
}

fn print_node(node: &TestNode, depth: usize) {
    let range = node.range();
    let span = format!(
        "[{}:{}-{}:{}]",
        range.start.line + 1,
        range.start.character,
        range.end.line + 1,
        range.end.character
    );
    let mut line = format!("{}{} \"{}\" {}", "  ".repeat(depth), node.kind.as_str().cyan(), node.title, span.dimmed());
    if node.skipped {
        line.push_str(&format!(" {}", "(skipped)".yellow()));
    }
    if node.is_open() {
        line.push_str(&format!(" {}", "(unterminated)".red()));
    }
    println!("{}", line);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn tokenize_file(file: &Path, report: bool, tokenizer: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let explicit = tokenizer.or(config.tokenizer_path.as_deref());
    let tokenizer = Tokenizer::resolve(explicit, &config.resources_dir)?;
    let tokens = tokenizer.tokenize_file(file)?;

    if report {
        println!("{}", serde_json::to_string_pretty(&ScopeReport::build(&tokens))?);
    } else {
        for token in &tokens {
            println!("{:?} {}", token.text, token.scopes.join(" ").dimmed());
        }
    }
    Ok(())
}

fn package_name(file: &Path, explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

fn print_tree(
    file: &Path,
    package: Option<String>,
    runner_url: Option<String>,
    tokens_json: Option<&Path>,
    config: &Config,
) -> anyhow::Result<()> {
    let nodes = discover(file, tokens_json, config.parser, config)?;
    let runner_url = runner_url.unwrap_or_else(|| config.runner_url.clone());
    let tree = TestTree::build(file, &package_name(file, package), &runner_url, &nodes);
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn show_results(
    payload: &Path,
    spec_tree: Option<&Path>,
    package: Option<String>,
    icons: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let json = fs::read_to_string(payload).with_context(|| format!("reading {}", payload.display()))?;
    let result = parse_results(&json)?;

    if icons {
        println!("{}", icon_summary(&result));
        return Ok(());
    }

    print!("{}", render_result(&result));
    println!("{}", icon_summary(&result));

    let Some(file) = spec_tree else {
        return Ok(());
    };

    let nodes = discover(file, None, config.parser, config)?;
    let tree = TestTree::build(file, &package_name(file, package), &config.runner_url, &nodes);
    let mut sink = RecordingSink::new();
    let summary = correlate_run(&tree, BUNDLE, &result, &mut sink);

    println!();
    for event in &sink.events {
        let Some(node) = tree.node(event.node()) else {
            continue;
        };
        match event {
            Outcome::Started { .. } => println!("{} {}", "▶".blue(), node.id),
            Outcome::Passed { duration, .. } => println!("{} {} ({} ms)", "✓".green(), node.id, duration),
            Outcome::Failed { message, duration, .. } => {
                println!("{} {} ({} ms): {}", "✗".red(), node.id, duration, message)
            }
            Outcome::Errored { message, duration, .. } => {
                println!("{} {} ({} ms): {}", "!!".red(), node.id, duration, message)
            }
            Outcome::Skipped { .. } => println!("{} {}", "-".blue(), node.id),
            Outcome::Output { at, .. } => {
                println!("    at {}:{}:{}", tree.path.display(), at.line + 1, at.character + 1)
            }
        }
    }
    println!(
        "{} matched, {} without results",
        summary.matched.to_string().green(),
        summary.unmatched.to_string().yellow()
    );
    Ok(())
}

fn show_exec_log(path: &Path, json: bool) -> anyhow::Result<()> {
    let report = if path.is_dir() {
        ExecutionReport::from_dir(path)?
    } else {
        let mut report = ExecutionReport::default();
        report.add_log(ExecutionLog::from_file(path)?);
        report
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for log in report.logs() {
        let name = log
            .log_file_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let unit = log.header.unit();
        println!(
            "{} {} ({} {})",
            name.bold(),
            log.header.script_name(),
            log.header.execution_time().unwrap_or(0),
            unit
        );
        for (file, time) in log.time_by_file() {
            println!("  {:>10} {}  {}", time, unit, file);
        }
        println!(
            "  {} metrics across {} files",
            log.metrics.len().to_string().green(),
            log.files.len()
        );
    }
    Ok(())
}
