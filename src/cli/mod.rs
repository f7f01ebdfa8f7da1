//! Command-line parsing for the yield reporting tool.
//!
//! The goal of this module is to keep **argument parsing** separate from
//! command dispatch (`app`) and from the statistics code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{AggregationMode, SourceKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "yt", version, about = "Wafer yield statistics, trends and fail-bin reports")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand. Unset values fall back to the
/// environment (`YT_*`, `.env`) and then to defaults.
#[derive(Debug, Args, Clone, Default)]
pub struct GlobalArgs {
    /// Record source (overrides YT_SOURCE).
    #[arg(long, value_enum, global = true)]
    pub source: Option<SourceKind>,

    /// `.json` or `.csv` export read by the file source (overrides YT_DATA_FILE).
    #[arg(long, value_name = "PATH", global = true)]
    pub data_file: Option<PathBuf>,

    /// Base URL of the HTTP source (overrides YT_DATA_URL).
    #[arg(long, value_name = "URL", global = true)]
    pub data_url: Option<String>,

    /// Settings JSON file (overrides YT_SETTINGS_PATH).
    #[arg(long, value_name = "PATH", global = true)]
    pub settings: Option<PathBuf>,

    /// Seed for the mock source.
    #[arg(long, default_value_t = 42, global = true)]
    pub seed: u64,

    /// Debug logging on stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Overall yield statistics, control limits, histogram and daily trend.
    Stats(ReportArgs),
    /// Trend re-aggregated by week, month, quarter or lot.
    Trend(TrendArgs),
    /// Fail bins ranked by their share of all failures.
    Fails(ReportArgs),
    /// Statistics for every active product.
    Overview(RangeArgs),
    /// Read or write monthly yield targets.
    Target {
        #[command(subcommand)]
        action: TargetCommand,
    },
    /// List products or flip their active flag.
    Product {
        #[command(subcommand)]
        action: ProductCommand,
    },
}

/// Date range; missing dates default to the last 30 days.
#[derive(Debug, Args, Clone, Default)]
pub struct RangeArgs {
    /// First day (YYYY-MM-DD), inclusive.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD), inclusive. Defaults to today.
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Print JSON instead of tables.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    #[arg(short = 'p', long, default_value = "PRODUCT-A")]
    pub product: String,

    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Debug, Args, Clone)]
pub struct TrendArgs {
    #[command(flatten)]
    pub report: ReportArgs,

    #[arg(short = 'a', long, value_enum, default_value_t = AggregationMode::Daily)]
    pub aggregation: AggregationMode,

    /// Write the buckets to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum TargetCommand {
    /// Show the target in effect (stored or default).
    Get {
        #[arg(short = 'p', long)]
        product: String,
        /// Month as YYYY-MM. Defaults to the current month.
        #[arg(short = 'm', long)]
        month: Option<String>,
    },
    /// Store a target.
    Set {
        #[arg(short = 'p', long)]
        product: String,
        #[arg(short = 'm', long)]
        month: String,
        target: f64,
    },
    /// Store targets for several months of one year at once.
    SetYear {
        #[arg(short = 'p', long)]
        product: String,
        #[arg(short = 'y', long)]
        year: i32,
        /// `MM=VALUE`, repeatable; an empty value leaves that month unchanged.
        #[arg(short = 'm', long = "month", value_name = "MM=VALUE", value_parser = parse_month_target, required = true)]
        months: Vec<(u32, Option<f64>)>,
    },
}

/// Parse `MM=VALUE` (e.g. `03=97.5`, or `03=` to skip March).
fn parse_month_target(raw: &str) -> Result<(u32, Option<f64>), String> {
    let (month, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected MM=VALUE, got '{raw}'"))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| format!("invalid month '{month}'"))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month {month} is outside 1-12"));
    }
    let value = value.trim();
    if value.is_empty() {
        return Ok((month, None));
    }
    let target: f64 = value.parse().map_err(|_| format!("invalid target '{value}'"))?;
    Ok((month, Some(target)))
}

#[derive(Debug, Subcommand)]
pub enum ProductCommand {
    /// List the catalogue; `*` marks active products.
    List,
    /// Flip a product between active and inactive.
    Toggle { product: String },
}
