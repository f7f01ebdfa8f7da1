//! Exports: trend buckets to CSV, statistics and fail ratios to JSON.
//!
//! Exports are meant to be easy to consume in spreadsheets or in the chart
//! layer. An empty statistics result is written as `{}`.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{OverallStatistics, TrendBucket};
use crate::error::AppError;

/// Write trend buckets as CSV: fixed columns, then one column per bin label
/// (union over all buckets, sorted). Missing bins are left blank.
pub fn write_trend_csv<W: Write>(writer: W, buckets: &[TrendBucket]) -> Result<(), AppError> {
    let bin_labels: BTreeSet<&str> = buckets
        .iter()
        .flat_map(|b| b.bin_stats.keys().map(String::as_str))
        .collect();

    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec!["date", "lot_id", "mean_yield", "wafer_count", "day_count"];
    header.extend(bin_labels.iter().copied());
    out.write_record(&header)
        .map_err(|e| AppError::usage(format!("Failed to write export CSV header: {e}")))?;

    for b in buckets {
        let mut row = vec![
            b.date.clone(),
            b.lot_id.clone().unwrap_or_default(),
            format!("{:.2}", b.mean_yield),
            b.wafer_count.to_string(),
            b.day_count.to_string(),
        ];
        row.extend(
            bin_labels
                .iter()
                .map(|label| b.bin_stats.get(*label).map(|v| format!("{v:.2}")).unwrap_or_default()),
        );
        out.write_record(&row)
            .map_err(|e| AppError::usage(format!("Failed to write export CSV row: {e}")))?;
    }

    out.flush()
        .map_err(|e| AppError::usage(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

pub fn export_trend_csv(path: &Path, buckets: &[TrendBucket]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_trend_csv(file, buckets)
}

/// Pretty JSON for a statistics result; `None` renders as `{}`.
pub fn statistics_json(stats: Option<&OverallStatistics>) -> Result<String, AppError> {
    match stats {
        Some(stats) => to_json(stats),
        None => Ok("{}".to_string()),
    }
}

/// Pretty JSON for any serializable report value.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::usage(format!("Failed to serialize JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bucket(date: &str, lot: Option<&str>, bins: &[(&str, f64)]) -> TrendBucket {
        TrendBucket {
            date: date.to_string(),
            lot_id: lot.map(str::to_string),
            mean_yield: 94.5,
            wafer_count: 3,
            day_count: 2,
            bin_stats: bins.iter().map(|(k, v)| (k.to_string(), *v)).collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn trend_csv_has_one_column_per_bin() {
        let buckets = vec![
            bucket("LOT-1", Some("LOT-1"), &[("3_Open", 2.5)]),
            bucket("2024-01-02", None, &[("7_Short", 1.0), ("3_Open", 0.5)]),
        ];
        let mut buf = Vec::new();
        write_trend_csv(&mut buf, &buckets).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "date,lot_id,mean_yield,wafer_count,day_count,3_Open,7_Short");
        assert_eq!(lines[1], "LOT-1,LOT-1,94.50,3,2,2.50,");
        assert_eq!(lines[2], "2024-01-02,,94.50,3,2,0.50,1.00");
    }

    #[test]
    fn empty_statistics_serialize_as_empty_object() {
        assert_eq!(statistics_json(None).unwrap(), "{}");
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trend.csv");
        export_trend_csv(&path, &[bucket("2024-W01", None, &[])]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date,lot_id,mean_yield,wafer_count,day_count\n2024-W01,"));
    }
}
