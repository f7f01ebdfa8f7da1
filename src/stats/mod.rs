//! Yield statistics engine.
//!
//! Reduces a batch of raw wafer rows into:
//! - overall distribution statistics with 3-sigma control limits and a histogram
//! - a daily trend with per-bin fail percentages
//!
//! The two views see different record sets: the overall figures
//! use every row that has a rate, the daily trend only rows that also have a
//! usable registration date.

pub mod daily;
pub mod summary;

use tracing::debug;

use crate::domain::{DEFAULT_TARGET, Normalized, OverallStatistics, RawRecord};
use crate::io::ingest::normalize_records;

pub use daily::{DailyBucket, build_daily_buckets, daily_trends};
pub use summary::{ControlLimits, Distribution, round2, summarize};

/// Compute overall statistics and the daily trend for a batch of raw rows.
///
/// Returns `None` (the empty result) when the batch is empty or no row
/// carries a rate.
pub fn calculate_yield_stats(records: &[RawRecord]) -> Option<OverallStatistics> {
    if records.is_empty() {
        return None;
    }
    calculate_from_normalized(&normalize_records(records))
}

/// Same as [`calculate_yield_stats`], for rows that are already normalized.
pub fn calculate_from_normalized(normalized: &[Normalized]) -> Option<OverallStatistics> {
    let yields: Vec<f64> = normalized.iter().filter_map(Normalized::yield_value).collect();
    let distribution = summarize(&yields)?;

    let daily_trends = daily_trends(normalized.iter().filter_map(Normalized::dated));

    debug!(
        rows = normalized.len(),
        with_rate = yields.len(),
        days = daily_trends.len(),
        "computed yield statistics"
    );

    Some(OverallStatistics {
        average: distribution.average,
        std_dev: distribution.std_dev,
        min: distribution.min,
        max: distribution.max,
        ucl: distribution.ucl,
        lcl: distribution.lcl,
        target: DEFAULT_TARGET,
        histogram: distribution.histogram,
        count: distribution.count,
        daily_trends,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn empty_batch_is_empty_result() {
        assert!(calculate_yield_stats(&[]).is_none());
    }

    #[test]
    fn batch_without_rates_is_empty_result() {
        let records = vec![
            RawRecord::new().with("REGIST_DATE", "2024-01-01"),
            RawRecord::new().with("LOT_ID", "L1"),
        ];
        assert!(calculate_yield_stats(&records).is_none());
    }

    #[test]
    fn undated_rows_feed_overall_but_not_daily() {
        let records = vec![
            RawRecord::new().with("PASS_CHIP_RATE", "85.5"),
            RawRecord::new()
                .with("PASS_CHIP_RATE", 95.5)
                .with("REGIST_DATE", "2024-05-01"),
        ];
        let stats = calculate_yield_stats(&records).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, 90.5);
        assert_eq!(stats.daily_trends.len(), 1);
        assert_eq!(stats.daily_trends[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(stats.daily_trends[0].mean_yield, 95.5);
    }

    #[test]
    fn target_defaults_to_constant() {
        let records = vec![RawRecord::new().with("PASS_CHIP_RATE", 99.0)];
        let stats = calculate_yield_stats(&records).unwrap();
        assert_eq!(stats.target, DEFAULT_TARGET);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.ucl, 99.0);
        assert_eq!(stats.lcl, 99.0);
    }
}
