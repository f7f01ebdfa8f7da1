//! Trend aggregation: re-bucket a daily trend into weekly, monthly,
//! quarterly or per-lot chart points.
//!
//! Known limitation: a bucket's `mean_yield` is the mean of its *daily means*,
//! not a mean over the underlying wafers. Days with few wafers therefore
//! weigh as much as busy days. This matches what the dashboard has always
//! shown and is kept as-is.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::domain::{AggregationMode, DailyTrendPoint, TrendBucket};
use crate::stats::round2;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `2024-W05` using the ISO week-numbering year.
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// `Jan 2024`.
pub fn month_key(date: NaiveDate) -> String {
    format!("{} {}", MONTH_NAMES[date.month0() as usize], date.year())
}

/// `2024-Q1`.
pub fn quarter_key(date: NaiveDate) -> String {
    format!("{}-Q{}", date.year(), date.month0() / 3 + 1)
}

/// Bucket key of one daily point under `mode`.
pub fn bucket_key(point: &DailyTrendPoint, mode: AggregationMode) -> String {
    match mode {
        AggregationMode::Daily => point.date.format("%Y-%m-%d").to_string(),
        AggregationMode::Weekly => week_key(point.date),
        AggregationMode::Monthly => month_key(point.date),
        AggregationMode::Quarterly => quarter_key(point.date),
        AggregationMode::Bylot => point
            .lot_id
            .clone()
            .unwrap_or_else(|| point.date.format("%Y-%m-%d").to_string()),
    }
}

#[derive(Debug, Default)]
struct Group {
    first_date: Option<NaiveDate>,
    from_lot: bool,
    yields: Vec<f64>,
    wafer_count: usize,
    /// Bin label -> (sum of daily percentages, days reporting the bin).
    bins: BTreeMap<String, (f64, usize)>,
}

impl Group {
    fn add(&mut self, point: &DailyTrendPoint) {
        self.first_date = Some(self.first_date.map_or(point.date, |d| d.min(point.date)));
        self.yields.push(point.mean_yield);
        self.wafer_count += point.wafer_count;
        for (name, &pct) in &point.bin_stats {
            let slot = self.bins.entry(name.clone()).or_insert((0.0, 0));
            slot.0 += pct;
            slot.1 += 1;
        }
    }

    fn into_bucket(self, key: String) -> TrendBucket {
        let mean_yield = self.yields.iter().sum::<f64>() / self.yields.len() as f64;
        TrendBucket {
            lot_id: self.from_lot.then(|| key.clone()),
            date: key,
            mean_yield: round2(mean_yield),
            wafer_count: self.wafer_count,
            day_count: self.yields.len(),
            bin_stats: self
                .bins
                .into_iter()
                .map(|(name, (sum, days))| (name, round2(sum / days as f64)))
                .collect(),
        }
    }
}

/// Re-bucket a daily trend.
///
/// - `daily` passes every point through unchanged
/// - other modes average the daily means per bucket; a bin's average only
///   counts the days that reported that bin
/// - calendar buckets come out in chronological order, not lexical key
///   order; the two agree for the zero-padded week/quarter keys but not for
///   monthly keys (`Apr 2024` sorts before `Jan 2024` lexically)
/// - per-lot buckets come out in lexical key order
pub fn aggregate_trend(points: &[DailyTrendPoint], mode: AggregationMode) -> Vec<TrendBucket> {
    if mode == AggregationMode::Daily {
        return points.iter().map(TrendBucket::from).collect();
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for point in points {
        let group = groups.entry(bucket_key(point, mode)).or_default();
        group.from_lot |= mode == AggregationMode::Bylot && point.lot_id.is_some();
        group.add(point);
    }

    let mut ordered: Vec<(String, Group)> = groups.into_iter().collect();
    if mode != AggregationMode::Bylot {
        // Stable sort keeps the lexical tie order.
        ordered.sort_by_key(|(_, group)| group.first_date);
    }

    ordered
        .into_iter()
        .map(|(key, group)| group.into_bucket(key))
        .collect()
}
