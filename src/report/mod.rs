//! Reporting utilities: fail-bin classification and fail-ratio rankings.

pub mod format;

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{DailyTrendPoint, FailRatio, TrendBucket};

pub use format::*;

/// Colors assigned to ranked fail bins, cycling when there are more bins.
pub const FAIL_PALETTE: [&str; 5] = ["#ef4444", "#f59e0b", "#8b5cf6", "#ec4899", "#6366f1"];

/// Decides which bin labels count as failures.
///
/// Bin coding differs between test floors.
pub trait BinClassifier {
    fn is_fail_bin(&self, label: &str) -> bool;
}

/// The conventional coding: bin `1_*` and anything mentioning `Pass` are
/// pass bins, everything else is a fail bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConventionalBins;

impl BinClassifier for ConventionalBins {
    fn is_fail_bin(&self, label: &str) -> bool {
        !(label.contains("Pass") || label.starts_with("1_"))
    }
}

impl<F> BinClassifier for F
where
    F: Fn(&str) -> bool,
{
    fn is_fail_bin(&self, label: &str) -> bool {
        self(label)
    }
}

/// Rank fail bins by their summed daily percentage.
///
/// Summing percentages across days is a display approximation; only the
/// per-day percentages are available at this point. Bins with equal
/// contributions are ordered by label, not by first appearance. Returns an
/// empty list when nothing failed.
pub fn summarize_fail_ratios<C>(points: &[DailyTrendPoint], classifier: &C) -> Vec<FailRatio>
where
    C: BinClassifier + ?Sized,
{
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total_fails = 0.0;

    for point in points {
        for (name, &pct) in &point.bin_stats {
            if !classifier.is_fail_bin(name) {
                continue;
            }
            *totals.entry(name.as_str()).or_insert(0.0) += pct;
            total_fails += pct;
        }
    }

    if total_fails == 0.0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&str, f64)> = totals.into_iter().collect();
    // Stable: equal contributions keep label order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .enumerate()
        .map(|(idx, (name, contribution))| FailRatio {
            name: name.to_string(),
            count: contribution.round() as i64,
            ratio: format!("{:.1}", contribution / total_fails * 100.0),
            color: FAIL_PALETTE[idx % FAIL_PALETTE.len()].to_string(),
        })
        .collect()
}

/// Sorted fail-bin labels present in any bucket (one chart series each).
pub fn fail_bins<C>(buckets: &[TrendBucket], classifier: &C) -> Vec<String>
where
    C: BinClassifier + ?Sized,
{
    buckets
        .iter()
        .flat_map(|bucket| bucket.bin_stats.keys())
        .filter(|name| classifier.is_fail_bin(name))
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}
