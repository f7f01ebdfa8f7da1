//! Daily bucketing of canonical records.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{CanonicalRecord, DailyTrendPoint};
use crate::stats::summary::{mean, round2};

/// Accumulator for all records registered on one calendar day.
///
/// Chip sums are `i128` so any number of `i64` counts folds without overflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyBucket {
    pub yields: Vec<f64>,
    pub total_chips: i128,
    pub bin_sums: BTreeMap<String, i128>,
    pub lot_ids: BTreeSet<String>,
}

impl DailyBucket {
    pub fn add(&mut self, record: &CanonicalRecord) {
        self.yields.push(record.yield_value);
        self.total_chips += i128::from(record.effective_num);
        if let Some(lot_id) = &record.lot_id {
            self.lot_ids.insert(lot_id.clone());
        }
        for (name, count) in &record.bins {
            *self.bin_sums.entry(name.clone()).or_insert(0) += i128::from(*count);
        }
    }

    /// Lot shown for the day when several lots share it: the
    /// lexicographically smallest id.
    pub fn representative_lot(&self) -> Option<&str> {
        self.lot_ids.first().map(String::as_str)
    }

    /// Per-bin share of the day's effective chips, in percent (2dp).
    ///
    /// Every bin is `0.0` when the day has no effective chips.
    pub fn bin_percentages(&self) -> BTreeMap<String, f64> {
        self.bin_sums
            .iter()
            .map(|(name, &sum)| {
                let pct = if self.total_chips > 0 {
                    round2(sum as f64 / self.total_chips as f64 * 100.0)
                } else {
                    0.0
                };
                (name.clone(), pct)
            })
            .collect()
    }

    pub fn to_point(&self, date: NaiveDate) -> DailyTrendPoint {
        DailyTrendPoint {
            date,
            lot_id: self.representative_lot().map(str::to_string),
            mean_yield: round2(mean(&self.yields).unwrap_or(0.0)),
            wafer_count: self.yields.len(),
            bin_stats: self.bin_percentages(),
        }
    }
}

/// Fold records into one bucket per date.
pub fn build_daily_buckets<'a, I>(records: I) -> BTreeMap<NaiveDate, DailyBucket>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    let mut buckets: BTreeMap<NaiveDate, DailyBucket> = BTreeMap::new();
    for record in records {
        buckets.entry(record.date).or_default().add(record);
    }
    buckets
}

/// Daily trend points in ascending date order.
pub fn daily_trends<'a, I>(records: I) -> Vec<DailyTrendPoint>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    build_daily_buckets(records)
        .iter()
        .map(|(date, bucket)| bucket.to_point(*date))
        .collect()
}
