//! Shared report pipeline used by every reporting subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! fetch -> statistics -> target override -> trend aggregation -> fail ratios
//!
//! The CLI handlers then only decide how to present the output.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::data::RecordSource;
use crate::domain::{AggregationMode, FailRatio, OverallStatistics, RunConfig, TrendBucket};
use crate::error::AppError;
use crate::report::{ConventionalBins, fail_bins, summarize_fail_ratios};
use crate::settings::{SettingsStore, apply_target, list_products, month_of, resolve_target};
use crate::stats::calculate_yield_stats;
use crate::trend::aggregate_trend;

/// All computed outputs for one product and date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    pub product_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub aggregation: AggregationMode,
    /// Raw rows returned by the source.
    pub rows: usize,
    /// `None` when no row carried a rate.
    pub stats: Option<OverallStatistics>,
    pub buckets: Vec<TrendBucket>,
    pub fail_ratios: Vec<FailRatio>,
    /// Fail-bin series present in `buckets`.
    pub fail_bins: Vec<String>,
}

/// Run the full report for `config.product_id`.
///
/// The target comes from the settings store for the month containing
/// `config.end`.
pub fn run_report(
    config: &RunConfig,
    source: &dyn RecordSource,
    store: &dyn SettingsStore,
) -> Result<RunOutput, AppError> {
    let target = resolve_target(store, &config.product_id, &month_of(config.end));
    analyze(config, &config.product_id, source, target)
}

/// Run the report for every active product, fetching and reducing products
/// in parallel. Output follows catalogue order.
pub fn run_overview(
    config: &RunConfig,
    source: &dyn RecordSource,
    store: &dyn SettingsStore,
) -> Result<Vec<RunOutput>, AppError> {
    let month = month_of(config.end);
    let jobs: Vec<(String, f64)> = list_products(store)
        .into_iter()
        .filter(|p| p.active)
        .map(|p| {
            let target = resolve_target(store, &p.id, &month);
            (p.id, target)
        })
        .collect();

    info!(products = jobs.len(), "running overview");
    jobs.par_iter()
        .map(|(product_id, target)| analyze(config, product_id, source, *target))
        .collect()
}

fn analyze(
    config: &RunConfig,
    product_id: &str,
    source: &dyn RecordSource,
    target: f64,
) -> Result<RunOutput, AppError> {
    if config.start > config.end {
        return Err(AppError::usage(format!(
            "Start date {} is after end date {}.",
            config.start, config.end
        )));
    }

    let records = source.fetch(product_id, config.start, config.end)?;
    debug!(product_id, rows = records.len(), "fetched records");

    let mut stats = calculate_yield_stats(&records);
    let (buckets, fail_ratios) = match stats.as_mut() {
        Some(stats) => {
            apply_target(stats, target);
            (
                aggregate_trend(&stats.daily_trends, config.aggregation),
                summarize_fail_ratios(&stats.daily_trends, &ConventionalBins),
            )
        }
        None => (Vec::new(), Vec::new()),
    };
    let fail_bins = fail_bins(&buckets, &ConventionalBins);

    Ok(RunOutput {
        product_id: product_id.to_string(),
        start: config.start,
        end: config.end,
        aggregation: config.aggregation,
        rows: records.len(),
        stats,
        buckets,
        fail_ratios,
        fail_bins,
    })
}
