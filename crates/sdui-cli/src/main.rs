//! `sdui` - validate and render page definitions locally
//!
//! ```text
//! sdui validate page.json
//! sdui render page.json --fixtures fixtures.json --json
//! ```
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).

mod fixtures;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fixtures::{default_fallback, Fixtures};
use sdui_core::{EngineConfig, PageError, RenderEngine, RenderOptions, RenderResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    let page = Arg::new("page")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Page definition (JSON)");
    let config = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Engine configuration (.toml, .json, .yaml)");
    let json = Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON");

    Command::new("sdui")
        .version(sdui_core::VERSION)
        .about("Server-driven UI page tooling")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a page definition and list every structural error")
                .arg(page.clone())
                .arg(config.clone())
                .arg(json.clone()),
        )
        .subcommand(
            Command::new("render")
                .about("Render a page against offline fixtures")
                .arg(page)
                .arg(
                    Arg::new("fixtures")
                        .long("fixtures")
                        .value_parser(value_parser!(PathBuf))
                        .help("Endpoints, components and fallbacks to render with"),
                )
                .arg(config)
                .arg(json)
                .arg(
                    Arg::new("timeout-ms")
                        .long("timeout-ms")
                        .value_parser(value_parser!(u64))
                        .help("Hydration timeout for this pass"),
                )
                .arg(
                    Arg::new("retries")
                        .long("retries")
                        .value_parser(value_parser!(u32))
                        .help("Retry count for this pass"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Exit with status 2 if any node fell back"),
                ),
        )
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(args: &ArgMatches) -> Result<EngineConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_page(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading page {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing page {}", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn validate(args: &ArgMatches) -> Result<ExitCode> {
    let config = load_config(args)?;
    let path = args.get_one::<PathBuf>("page").context("missing page argument")?;
    let raw = load_page(path)?;
    let as_json = args.get_flag("json");

    match config.validator().validate(&raw) {
        Ok(page) => {
            let directives = page.directives().len();
            if as_json {
                print_json(&json!({
                    "valid": true,
                    "nodes": page.node_count(),
                    "directives": directives,
                }))?;
            } else {
                println!(
                    "{}: valid ({} nodes, {} directives)",
                    path.display(),
                    page.node_count(),
                    directives
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(errors) => {
            if as_json {
                print_json(&json!({ "valid": false, "errors": errors }))?;
            } else {
                println!("{}: {} error(s)", path.display(), errors.len());
                for error in errors.iter() {
                    println!("  {error}");
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn render(args: &ArgMatches) -> Result<ExitCode> {
    let config = load_config(args)?;
    let path = args.get_one::<PathBuf>("page").context("missing page argument")?;
    let raw = load_page(path)?;
    let fixtures = match args.get_one::<PathBuf>("fixtures") {
        Some(path) => Fixtures::load(path)?,
        None => Fixtures::default(),
    };

    let engine = RenderEngine::from_config(
        Arc::new(fixtures.registry()),
        Arc::new(fixtures.transport()),
        &config,
    );
    let mut options = RenderOptions::new(default_fallback());
    if let Some(ms) = args.get_one::<u64>("timeout-ms") {
        options = options.with_hydration_timeout(Duration::from_millis(*ms));
    }
    if let Some(retries) = args.get_one::<u32>("retries") {
        options = options.with_retry_count(*retries);
    }

    let result = match engine.render_page(&raw, &options).await {
        Ok(result) => result,
        Err(PageError::Validation(errors)) => {
            eprintln!("{}: page rejected", path.display());
            for error in errors.iter() {
                eprintln!("  {error}");
            }
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(pass_id = %result.metadata.pass_id, "rendered {}", path.display());

    if args.get_flag("json") {
        print_json(&json!({
            "outputs": result.outputs,
            "metadata": result.metadata,
        }))?;
    } else {
        print_summary(&result)?;
    }

    if args.get_flag("strict") && !result.metadata.is_clean() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(result: &RenderResult<Value>) -> Result<()> {
    let metadata = &result.metadata;
    for output in &result.outputs {
        print_json(output)?;
    }
    println!();
    println!("Render Summary:");
    println!("  Pass: {}", metadata.pass_id);
    println!("  Nodes: {}", metadata.nodes.len());
    println!("  Rendered: {}", metadata.rendered_count());
    println!("  Fallbacks: {}", metadata.fallback_count());
    println!(
        "  Cache: {} hit(s), {} miss(es), {} coalesced",
        metadata.cache_hits(),
        metadata.cache_misses(),
        metadata.hydration.coalesced
    );
    println!("  Hydration: {}ms", metadata.hydration_elapsed.as_millis());
    println!("  Total: {}ms", metadata.duration.as_millis());
    if !metadata.errors.is_empty() {
        println!("  Errors:");
        for error in &metadata.errors {
            println!("    {error}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("validate", args)) => validate(args),
        Some(("render", args)) => render(args).await,
        _ => Ok(ExitCode::FAILURE),
    }
}
