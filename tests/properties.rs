//! Property-based tests for the yield statistics core.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate};
use proptest::prelude::*;

use yield_trends::domain::{AggregationMode, RawRecord};
use yield_trends::stats::{calculate_yield_stats, round2};
use yield_trends::trend::{aggregate_trend, month_key};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

type Row = (f64, i64, u8, i64, i64);

/// (rate, day offset, lot suffix, effective chips, open-bin chips); rates
/// include values outside `[0, 100]`.
fn row_strategy() -> impl Strategy<Value = Row> {
    (-20.0f64..120.0, 0i64..400, 0u8..3, 0i64..2000, 0i64..500)
}

/// Rows with physically meaningful rates only.
fn valid_row_strategy() -> impl Strategy<Value = Row> {
    (0.0f64..=100.0, 0i64..400, 0u8..3, 0i64..2000, 0i64..500)
}

fn to_record((rate, offset, lot, effective, open): Row) -> RawRecord {
    let date = base_date() + Duration::days(offset);
    RawRecord::new()
        .with("PASS_CHIP_RATE", rate)
        .with("REGIST_DATE", date.format("%Y-%m-%d").to_string())
        .with("LOT_ID", format!("LOT-{lot}"))
        .with("EFFECTIVE_NUM", effective)
        .with("bins", BTreeMap::from([("3_Open".to_string(), open)]))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn control_limits_bracket_the_average(rows in prop::collection::vec(valid_row_strategy(), 1..60)) {
        let records: Vec<RawRecord> = rows.into_iter().map(to_record).collect();
        let stats = calculate_yield_stats(&records).unwrap();

        prop_assert!(stats.lcl >= 0.0);
        // Each figure is rounded independently, so allow one rounding step.
        prop_assert!(stats.lcl <= stats.average + 0.01);
        prop_assert!(stats.average <= stats.ucl + 0.01);
    }

    #[test]
    fn histogram_counts_only_in_range_values(rows in prop::collection::vec(row_strategy(), 1..60)) {
        let in_range = rows.iter().filter(|r| (0.0..=100.0).contains(&r.0)).count() as u64;
        let records: Vec<RawRecord> = rows.iter().copied().map(to_record).collect();
        let stats = calculate_yield_stats(&records).unwrap();

        prop_assert_eq!(stats.histogram.counts.iter().sum::<u64>(), in_range);
        prop_assert_eq!(stats.count, records.len());
        prop_assert_eq!(stats.histogram.counts.len(), 10);
        prop_assert_eq!(stats.histogram.bins.len(), 11);
    }

    #[test]
    fn daily_dates_strictly_ascend(rows in prop::collection::vec(row_strategy(), 1..60)) {
        let records: Vec<RawRecord> = rows.into_iter().map(to_record).collect();
        let stats = calculate_yield_stats(&records).unwrap();

        prop_assert!(stats.daily_trends.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn bin_percentages_follow_chip_totals(rows in prop::collection::vec(row_strategy(), 1..40)) {
        let records: Vec<RawRecord> = rows.iter().copied().map(to_record).collect();
        let stats = calculate_yield_stats(&records).unwrap();

        for point in &stats.daily_trends {
            let offset = (point.date - base_date()).num_days();
            let day_rows: Vec<_> = rows.iter().filter(|r| r.1 == offset).collect();
            let total: i64 = day_rows.iter().map(|r| r.3).sum();
            let open: i64 = day_rows.iter().map(|r| r.4).sum();

            let expected = if total > 0 { round2(open as f64 / total as f64 * 100.0) } else { 0.0 };
            prop_assert_eq!(point.bin_stats.get("3_Open").copied(), Some(expected));
        }
    }

    #[test]
    fn daily_aggregation_is_idempotent(rows in prop::collection::vec(row_strategy(), 1..40)) {
        let records: Vec<RawRecord> = rows.into_iter().map(to_record).collect();
        let stats = calculate_yield_stats(&records).unwrap();

        let once = aggregate_trend(&stats.daily_trends, AggregationMode::Daily);
        let twice = aggregate_trend(&stats.daily_trends, AggregationMode::Daily);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.len(), stats.daily_trends.len());
        for (bucket, point) in once.iter().zip(&stats.daily_trends) {
            prop_assert_eq!(&bucket.date, &point.date.format("%Y-%m-%d").to_string());
            prop_assert_eq!(bucket.mean_yield, point.mean_yield);
            prop_assert_eq!(&bucket.bin_stats, &point.bin_stats);
        }
    }

    #[test]
    fn monthly_buckets_cover_exactly_the_present_months(rows in prop::collection::vec(row_strategy(), 1..60)) {
        let records: Vec<RawRecord> = rows.into_iter().map(to_record).collect();
        let stats = calculate_yield_stats(&records).unwrap();

        let present: BTreeSet<(i32, u32)> =
            stats.daily_trends.iter().map(|p| (p.date.year(), p.date.month())).collect();
        let buckets = aggregate_trend(&stats.daily_trends, AggregationMode::Monthly);

        prop_assert_eq!(buckets.len(), present.len());
        let keys: Vec<String> = buckets.iter().map(|b| b.date.clone()).collect();
        let expected: Vec<String> = present
            .iter()
            .map(|(y, m)| month_key(NaiveDate::from_ymd_opt(*y, *m, 1).unwrap()))
            .collect();
        prop_assert_eq!(keys, expected);
        prop_assert_eq!(
            buckets.iter().map(|b| b.day_count).sum::<usize>(),
            stats.daily_trends.len()
        );
    }
}
