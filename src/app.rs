//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and `.env`/environment settings
//! - builds the record source and settings store
//! - runs the report pipeline
//! - prints tables or JSON and writes optional exports

use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalArgs, ProductCommand, RangeArgs, ReportArgs, TargetCommand, TrendArgs};
use crate::data::{SourceConfig, build_source, default_range};
use crate::domain::{AggregationMode, RunConfig};
use crate::error::AppError;
use crate::io::export::{export_trend_csv, statistics_json, to_json};
use crate::report::{format_fail_ratios, format_products, format_statistics, format_trend};
use crate::settings::{
    JsonFileStore, SettingsStore, list_products, month_of, parse_month, resolve_target, set_year_targets,
};

pub mod pipeline;

/// Entry point for the `yt` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let env = SourceConfig::from_env()?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Stats(args) => handle_stats(&cli.global, &env, &args, today),
        Command::Trend(args) => handle_trend(&cli.global, &env, &args, today),
        Command::Fails(args) => handle_fails(&cli.global, &env, &args, today),
        Command::Overview(range) => handle_overview(&cli.global, &env, &range, today),
        Command::Target { action } => handle_target(&cli.global, &env, action, today),
        Command::Product { action } => handle_product(&cli.global, &env, action),
    }
}

/// Warn-level logging to stderr; `--verbose` raises it to debug and
/// `RUST_LOG` overrides both.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Merge CLI flags over environment settings into a run configuration.
pub fn run_config(
    global: &GlobalArgs,
    env: &SourceConfig,
    product_id: &str,
    range: &RangeArgs,
    aggregation: AggregationMode,
    today: NaiveDate,
) -> RunConfig {
    let (start, end) = default_range(range.start, range.end, today);
    RunConfig {
        product_id: product_id.to_string(),
        start,
        end,
        aggregation,
        source: global.source.unwrap_or(env.source),
        data_file: global.data_file.clone().or_else(|| env.data_file.clone()),
        data_url: global.data_url.clone().or_else(|| env.data_url.clone()),
        settings_path: global.settings.clone().unwrap_or_else(|| env.settings_path.clone()),
        seed: global.seed,
        export_trend: None,
        json: range.json,
    }
}

fn run_pipeline(config: &RunConfig) -> Result<pipeline::RunOutput, AppError> {
    let source = build_source(config)?;
    let store = JsonFileStore::open(&config.settings_path);
    pipeline::run_report(config, &*source, &store)
}

fn handle_stats(global: &GlobalArgs, env: &SourceConfig, args: &ReportArgs, today: NaiveDate) -> Result<(), AppError> {
    let config = run_config(global, env, &args.product, &args.range, AggregationMode::Daily, today);
    let run = run_pipeline(&config)?;

    if config.json {
        println!("{}", statistics_json(run.stats.as_ref())?);
        return Ok(());
    }

    let stats = run.stats.as_ref().ok_or_else(|| no_data(&config))?;
    println!("{}", format_statistics(&config.product_id, stats));
    println!("{}", format_trend(&run.buckets, AggregationMode::Daily, Some(stats.target)));
    Ok(())
}

fn handle_trend(global: &GlobalArgs, env: &SourceConfig, args: &TrendArgs, today: NaiveDate) -> Result<(), AppError> {
    let mut config = run_config(
        global,
        env,
        &args.report.product,
        &args.report.range,
        args.aggregation,
        today,
    );
    config.export_trend = args.export.clone();
    let run = run_pipeline(&config)?;

    if let Some(path) = &config.export_trend {
        export_trend_csv(path, &run.buckets)?;
    }

    if config.json {
        println!("{}", to_json(&run.buckets)?);
        return Ok(());
    }

    let stats = run.stats.as_ref().ok_or_else(|| no_data(&config))?;
    println!("{}", format_trend(&run.buckets, config.aggregation, Some(stats.target)));
    if !run.fail_bins.is_empty() {
        println!("Fail bins: {}", run.fail_bins.join(", "));
    }
    Ok(())
}

fn handle_fails(global: &GlobalArgs, env: &SourceConfig, args: &ReportArgs, today: NaiveDate) -> Result<(), AppError> {
    let config = run_config(global, env, &args.product, &args.range, AggregationMode::Daily, today);
    let run = run_pipeline(&config)?;

    if config.json {
        println!("{}", to_json(&run.fail_ratios)?);
    } else {
        print!("{}", format_fail_ratios(&run.fail_ratios));
    }
    Ok(())
}

fn handle_overview(global: &GlobalArgs, env: &SourceConfig, range: &RangeArgs, today: NaiveDate) -> Result<(), AppError> {
    let config = run_config(global, env, "", range, AggregationMode::Daily, today);
    let source = build_source(&config)?;
    let store = JsonFileStore::open(&config.settings_path);
    let runs = pipeline::run_overview(&config, &*source, &store)?;

    if config.json {
        let entries: Vec<serde_json::Value> = runs
            .iter()
            .map(|run| serde_json::json!({ "product_id": run.product_id, "stats": run.stats }))
            .collect();
        println!("{}", to_json(&entries)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No active products.");
    }
    for run in &runs {
        match &run.stats {
            Some(stats) => println!("{}", format_statistics(&run.product_id, stats)),
            None => println!("=== yt - Yield Overview ({}) ===\nNo data.\n", run.product_id),
        }
    }
    Ok(())
}

fn handle_target(
    global: &GlobalArgs,
    env: &SourceConfig,
    action: TargetCommand,
    today: NaiveDate,
) -> Result<(), AppError> {
    let mut store = JsonFileStore::open(settings_path(global, env));
    match action {
        TargetCommand::Get { product, month } => {
            let month = match month {
                Some(m) => parse_month(&m)?,
                None => month_of(today),
            };
            let target = resolve_target(&store, &product, &month);
            println!("{product} {month}: {target:.2}%");
        }
        TargetCommand::Set { product, month, target } => {
            let month = parse_month(&month)?;
            store.set_target(&product, &month, target)?;
            println!("{product} {month}: {target:.2}% (saved to {})", store.path().display());
        }
        TargetCommand::SetYear { product, year, months } => {
            let saved = set_year_targets(&mut store, &product, year, &months)?;
            for (month, target) in &saved {
                println!("{product} {month}: {target:.2}%");
            }
            println!("Saved {} target(s) to {}", saved.len(), store.path().display());
        }
    }
    Ok(())
}

fn handle_product(global: &GlobalArgs, env: &SourceConfig, action: ProductCommand) -> Result<(), AppError> {
    let mut store = JsonFileStore::open(settings_path(global, env));
    match action {
        ProductCommand::List => print!("{}", format_products(&list_products(&store))),
        ProductCommand::Toggle { product } => {
            if !list_products(&store).iter().any(|p| p.id == product) {
                return Err(AppError::usage(format!("Unknown product '{product}'.")));
            }
            let active = !store.get_product_active(&product);
            store.set_product_active(&product, active)?;
            println!("{product}: {}", if active { "active" } else { "inactive" });
        }
    }
    Ok(())
}

fn settings_path(global: &GlobalArgs, env: &SourceConfig) -> std::path::PathBuf {
    global.settings.clone().unwrap_or_else(|| env.settings_path.clone())
}

fn no_data(config: &RunConfig) -> AppError {
    AppError::no_data(format!(
        "No yield data for {} between {} and {}.",
        config.product_id, config.start, config.end
    ))
}
