//! Raw record ingest and normalization.
//!
//! This module is responsible for turning heterogeneous wafer rows into
//! `CanonicalRecord`s that the statistics engine can fold.
//!
//! Design goals:
//! - **Lossy but resilient**: a malformed rate or count becomes `0`, never an error
//! - **Case-insensitive fields**: `PASS_CHIP_RATE` and `pass_chip_rate` are the same column
//! - **Row-level reporting** for file loads (skip bad rows, but report what happened)
//! - **Separation of concerns**: no statistics here

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{
    CanonicalRecord, FIELD_BINS, FIELD_DATE, FIELD_EFFECTIVE, FIELD_LOT, FIELD_RATE, Normalized, RawRecord,
    RawValue, timestamp_from_unix,
};
use crate::error::AppError;

/// CSV columns with this (case-insensitive) prefix are collected into `bins`.
pub const BIN_COLUMN_PREFIX: &str = "BIN_";

/// A row-level problem encountered while loading a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// File load output: raw rows plus row-level errors.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: Vec<RawRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Normalize one raw row.
///
/// A row without a rate is `Skipped`. A row whose rate is present but
/// malformed counts as `0.0`. Rows with a rate but no usable registration
/// date are `Undated`: they still feed the overall distribution.
pub fn normalize_record(raw: &RawRecord) -> Normalized {
    let Some(rate) = raw.get_present(FIELD_RATE) else {
        return Normalized::Skipped;
    };
    let yield_value = parse_rate(rate);

    let Some(date) = raw.get_present(FIELD_DATE).and_then(parse_date_value) else {
        return Normalized::Undated { yield_value };
    };

    Normalized::Dated(CanonicalRecord {
        yield_value,
        date,
        effective_num: raw.get_present(FIELD_EFFECTIVE).map_or(0, parse_count),
        lot_id: raw.get_present(FIELD_LOT).and_then(parse_lot_id),
        bins: raw.get_present(FIELD_BINS).map(parse_bins).unwrap_or_default(),
    })
}

/// Normalize a whole batch, preserving input order.
pub fn normalize_records(raw: &[RawRecord]) -> Vec<Normalized> {
    raw.iter().map(normalize_record).collect()
}

/// Coerce a rate value to a percentage; anything unparseable is `0.0`.
pub fn parse_rate(value: &RawValue) -> f64 {
    let parsed = match value {
        RawValue::Float(v) => Some(*v),
        RawValue::Int(v) => Some(*v as f64),
        RawValue::Text(s) => s.trim().trim_end_matches('%').trim_end().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Coerce an integer-like chip count; anything unparseable is `0`.
pub fn parse_count(value: &RawValue) -> i64 {
    match value {
        RawValue::Int(v) => *v,
        RawValue::Float(v) if v.is_finite() => v.trunc() as i64,
        RawValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().unwrap_or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && v.fract() == 0.0)
                    .map_or(0, |v| v as i64)
            })
        }
        _ => 0,
    }
}

/// Extract a calendar date.
///
/// - dates/timestamps: their calendar date
/// - text: the first 10 characters as `YYYY-MM-DD` (or `YYYY/MM/DD`)
/// - numbers: unix seconds (UTC)
pub fn parse_date_value(value: &RawValue) -> Option<NaiveDate> {
    if let Some(date) = value.calendar_date() {
        return Some(date);
    }
    match value {
        RawValue::Text(s) => parse_date_prefix(s),
        RawValue::Int(secs) => timestamp_from_unix(*secs).map(|ts| ts.date()),
        RawValue::Float(secs) if secs.is_finite() => timestamp_from_unix(secs.trunc() as i64).map(|ts| ts.date()),
        _ => None,
    }
}

fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    const FMTS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

    let s = s.trim();
    let prefix = match s.char_indices().nth(10) {
        Some((idx, _)) => &s[..idx],
        None => s,
    };
    FMTS.iter()
        .find_map(|fmt| NaiveDate::parse_from_str(prefix, fmt).ok())
}

fn parse_lot_id(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Text(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        RawValue::Int(v) => Some(v.to_string()),
        _ => None,
    }
}

/// Bin label -> chip count. Non-map values yield an empty map.
pub fn parse_bins(value: &RawValue) -> BTreeMap<String, i64> {
    match value {
        RawValue::Map(entries) => entries
            .iter()
            .map(|(label, count)| (label.clone(), parse_count(count)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Load raw rows from a `.json` (array of objects) or `.csv` file.
pub fn load_records(path: &Path) -> Result<LoadedRecords, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open data file '{}': {e}", path.display())))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        read_json_records(BufReader::new(file))
    } else {
        read_csv_records(file)
    }
}

/// Parse a JSON array of row objects.
pub fn read_json_records<R: Read>(reader: R) -> Result<LoadedRecords, AppError> {
    let value: serde_json::Value =
        serde_json::from_reader(reader).map_err(|e| AppError::usage(format!("Invalid JSON data: {e}")))?;
    let serde_json::Value::Array(rows) = value else {
        return Err(AppError::usage("JSON data must be an array of row objects."));
    };
    Ok(records_from_json_rows(rows))
}

/// Convert already-decoded JSON rows (file or HTTP body) into raw records.
pub fn records_from_json_rows(rows: Vec<serde_json::Value>) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();
    for (idx, row) in rows.into_iter().enumerate() {
        loaded.rows_read += 1;
        match RawRecord::try_from(row) {
            Ok(record) => loaded.records.push(record),
            Err(message) => loaded.row_errors.push(RowError { line: idx + 1, message }),
        }
    }
    loaded
}

/// Parse CSV rows. Every cell stays text; empty cells become nulls.
pub fn read_csv_records<R: Read>(reader: R) -> Result<LoadedRecords, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::usage(format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();

    let mut loaded = LoadedRecords::default();
    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1 and CSV lines are 1-based.
        let line = idx + 2;
        loaded.rows_read += 1;

        match result {
            Ok(row) => loaded.records.push(record_from_csv_row(&headers, &row)),
            Err(e) => loaded.row_errors.push(RowError {
                line,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }
    Ok(loaded)
}

fn record_from_csv_row(headers: &[String], row: &StringRecord) -> RawRecord {
    let mut record = RawRecord::new();
    let mut bins = BTreeMap::new();

    for (name, cell) in headers.iter().zip(row.iter()) {
        if let Some(label) = bin_label(name) {
            if !cell.is_empty() {
                bins.insert(label.to_string(), RawValue::Text(cell.to_string()));
            }
            continue;
        }
        let value = if cell.is_empty() {
            RawValue::Null
        } else {
            RawValue::Text(cell.to_string())
        };
        record.insert(name.clone(), value);
    }

    if !bins.is_empty() {
        record.insert(FIELD_BINS, RawValue::Map(bins));
    }
    record
}

fn bin_label(header: &str) -> Option<&str> {
    let prefix_len = BIN_COLUMN_PREFIX.len();
    let head = header.get(..prefix_len)?;
    if !head.eq_ignore_ascii_case(BIN_COLUMN_PREFIX) {
        return None;
    }
    Some(&header[prefix_len..]).filter(|label| !label.is_empty())
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}
