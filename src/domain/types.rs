//! Shared domain types.
//!
//! Raw rows arrive from a data source as loosely typed field maps
//! (`RawRecord`). Everything downstream of the normalizer works on the
//! canonical, strongly typed shapes defined here, and every output type is
//! serializable so the rendering side can consume it as plain JSON.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Target yield used until the settings store supplies a per-product value.
pub const DEFAULT_TARGET: f64 = 95.0;

pub const FIELD_RATE: &str = "PASS_CHIP_RATE";
pub const FIELD_DATE: &str = "REGIST_DATE";
pub const FIELD_EFFECTIVE: &str = "EFFECTIVE_NUM";
pub const FIELD_LOT: &str = "LOT_ID";
pub const FIELD_BINS: &str = "bins";

/// A single field value as delivered by a data source.
///
/// Sources disagree on encodings: a rate may be a float or a numeric string,
/// a registration date may be a timestamp, a date or an ISO string. The
/// normalizer decides how each variant is coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Map(BTreeMap<String, RawValue>),
}

impl RawValue {
    /// Calendar date for values that carry one natively (dates, timestamps).
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        match self {
            RawValue::Date(d) => Some(*d),
            RawValue::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Int(i64::from(value))
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(value: NaiveDate) -> Self {
        RawValue::Date(value)
    }
}

impl From<NaiveDateTime> for RawValue {
    fn from(value: NaiveDateTime) -> Self {
        RawValue::Timestamp(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawValue::Null, Into::into)
    }
}

impl From<BTreeMap<String, i64>> for RawValue {
    fn from(value: BTreeMap<String, i64>) -> Self {
        RawValue::Map(value.into_iter().map(|(k, v)| (k, RawValue::Int(v))).collect())
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Int(i),
                None => n.as_f64().map_or(RawValue::Null, RawValue::Float),
            },
            Value::String(s) => RawValue::Text(s),
            // Arrays never appear in yield rows; keep them as text so nothing is lost silently.
            Value::Array(items) => RawValue::Text(Value::Array(items).to_string()),
            Value::Object(map) => RawValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

/// One wafer's test result as a case-insensitive field map.
///
/// Keys are stored exactly as delivered. Lookup tries the upper-case spelling,
/// then the lower-case spelling, then any case-insensitive match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fixtures and generated rows.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields
            .get(&name.to_ascii_uppercase())
            .or_else(|| self.fields.get(&name.to_ascii_lowercase()))
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
    }

    /// Like `get`, but treats an explicit null the same as a missing field.
    pub fn get_present(&self, name: &str) -> Option<&RawValue> {
        self.get(name).filter(|v| !v.is_null())
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl TryFrom<serde_json::Value> for RawRecord {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(format!("expected a JSON object per row, found `{other}`")),
        }
    }
}

/// A normalized wafer record that can be bucketed by day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub yield_value: f64,
    pub date: NaiveDate,
    pub effective_num: i64,
    pub lot_id: Option<String>,
    pub bins: BTreeMap<String, i64>,
}

/// Outcome of normalizing one raw row.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Rate and calendar date both usable: feeds overall and daily statistics.
    Dated(CanonicalRecord),
    /// A rate but no usable date: feeds overall statistics only.
    Undated { yield_value: f64 },
    /// No rate field at all.
    Skipped,
}

impl Normalized {
    pub fn yield_value(&self) -> Option<f64> {
        match self {
            Normalized::Dated(record) => Some(record.yield_value),
            Normalized::Undated { yield_value } => Some(*yield_value),
            Normalized::Skipped => None,
        }
    }

    pub fn dated(&self) -> Option<&CanonicalRecord> {
        match self {
            Normalized::Dated(record) => Some(record),
            _ => None,
        }
    }
}

/// One day of the yield trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrendPoint {
    pub date: NaiveDate,
    pub lot_id: Option<String>,
    pub mean_yield: f64,
    pub wafer_count: usize,
    /// Bin label -> share of the day's effective chips, in percent (2dp).
    pub bin_stats: BTreeMap<String, f64>,
}

/// Fixed-width histogram over `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub counts: Vec<u64>,
    /// Bin edges; always one more than `counts`.
    pub bins: Vec<f64>,
}

/// Distribution statistics plus the daily trend for one product/date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStatistics {
    pub average: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub ucl: f64,
    pub lcl: f64,
    pub target: f64,
    pub histogram: Histogram,
    pub count: usize,
    pub daily_trends: Vec<DailyTrendPoint>,
}

/// Period used to re-bucket the daily trend for charting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    /// One bucket per lot id (falls back to the date for days without a lot).
    Bylot,
}

impl AggregationMode {
    pub const ALL: [AggregationMode; 5] = [
        AggregationMode::Daily,
        AggregationMode::Weekly,
        AggregationMode::Monthly,
        AggregationMode::Quarterly,
        AggregationMode::Bylot,
    ];

    /// X-axis caption used by the chart layer.
    pub fn axis_label(self) -> &'static str {
        match self {
            AggregationMode::Daily => "Daily",
            AggregationMode::Weekly => "Weekly",
            AggregationMode::Monthly => "Monthly",
            AggregationMode::Quarterly => "Quarterly",
            AggregationMode::Bylot => "Lot ID",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AggregationMode::Daily => "daily",
            AggregationMode::Weekly => "weekly",
            AggregationMode::Monthly => "monthly",
            AggregationMode::Quarterly => "quarterly",
            AggregationMode::Bylot => "bylot",
        }
    }
}

impl std::str::FromStr for AggregationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AggregationMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!("unknown aggregation `{s}` (expected daily, weekly, monthly, quarterly or bylot)")
            })
    }
}

/// One re-aggregated point of the chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    /// Bucket key: ISO date, `2024-W05`, `Jan 2024`, `2024-Q1` or a lot id.
    pub date: String,
    pub lot_id: Option<String>,
    pub mean_yield: f64,
    pub wafer_count: usize,
    /// Number of daily points folded into this bucket.
    pub day_count: usize,
    pub bin_stats: BTreeMap<String, f64>,
}

impl From<&DailyTrendPoint> for TrendBucket {
    fn from(point: &DailyTrendPoint) -> Self {
        Self {
            date: point.date.format("%Y-%m-%d").to_string(),
            lot_id: point.lot_id.clone(),
            mean_yield: point.mean_yield,
            wafer_count: point.wafer_count,
            day_count: 1,
            bin_stats: point.bin_stats.clone(),
        }
    }
}

/// One slice of the fail-bin breakdown (pie/list view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailRatio {
    pub name: String,
    /// Summed daily percentage, rounded to an integer for display.
    pub count: i64,
    /// Share of all fail contributions, formatted to one decimal place.
    pub ratio: String,
    pub color: String,
}

/// A product known to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub active: bool,
}

/// Where raw records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Seeded synthetic wafers.
    Mock,
    /// A local `.json` or `.csv` export.
    File,
    /// A JSON endpoint serving raw rows.
    Http,
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from CLI flags, `.env`/environment and defaults.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub product_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub aggregation: AggregationMode,
    pub source: SourceKind,
    pub data_file: Option<PathBuf>,
    pub data_url: Option<String>,
    pub settings_path: PathBuf,
    pub seed: u64,
    pub export_trend: Option<PathBuf>,
    pub json: bool,
}

/// Convert a unix timestamp (seconds) into a naive UTC timestamp.
pub fn timestamp_from_unix(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_tries_upper_then_lower_then_any_case() {
        let record = RawRecord::new()
            .with("PASS_CHIP_RATE", 97.5)
            .with("lot_id", "L1")
            .with("Effective_Num", 1000_i64);

        assert_eq!(record.get("pass_chip_rate"), Some(&RawValue::Float(97.5)));
        assert_eq!(record.get("LOT_ID"), Some(&RawValue::Text("L1".to_string())));
        assert_eq!(record.get("EFFECTIVE_NUM"), Some(&RawValue::Int(1000)));
        assert_eq!(record.get("REGIST_DATE"), None);
    }

    #[test]
    fn upper_case_key_wins_over_lower_case() {
        let record = RawRecord::new().with("LOT_ID", "UPPER").with("lot_id", "lower");
        assert_eq!(record.get("lot_id"), Some(&RawValue::Text("UPPER".to_string())));
    }

    #[test]
    fn null_is_treated_as_absent_by_get_present() {
        let record = RawRecord::new().with("PASS_CHIP_RATE", RawValue::Null);
        assert!(record.get("PASS_CHIP_RATE").is_some());
        assert!(record.get_present("PASS_CHIP_RATE").is_none());
    }

    #[test]
    fn json_rows_convert_to_records() {
        let value = serde_json::json!({
            "PASS_CHIP_RATE": "91.25",
            "EFFECTIVE_NUM": 1000,
            "bins": { "3_Open": 40 }
        });
        let record = RawRecord::try_from(value).unwrap();
        assert_eq!(record.get("pass_chip_rate"), Some(&RawValue::Text("91.25".to_string())));
        match record.get("bins") {
            Some(RawValue::Map(bins)) => assert_eq!(bins.get("3_Open"), Some(&RawValue::Int(40))),
            other => panic!("unexpected bins value: {other:?}"),
        }

        assert!(RawRecord::try_from(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn aggregation_mode_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<AggregationMode>().unwrap(), AggregationMode::Weekly);
        assert_eq!("bylot".parse::<AggregationMode>().unwrap(), AggregationMode::Bylot);
        assert!("hourly".parse::<AggregationMode>().is_err());
        assert_eq!(AggregationMode::Bylot.axis_label(), "Lot ID");
    }

    #[test]
    fn daily_point_converts_to_bucket() {
        let point = DailyTrendPoint {
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            lot_id: Some("L7".to_string()),
            mean_yield: 93.1,
            wafer_count: 4,
            bin_stats: BTreeMap::from([("3_Open".to_string(), 2.5)]),
        };
        let bucket = TrendBucket::from(&point);
        assert_eq!(bucket.date, "2024-03-09");
        assert_eq!(bucket.lot_id.as_deref(), Some("L7"));
        assert_eq!(bucket.day_count, 1);
        assert_eq!(bucket.bin_stats, point.bin_stats);
    }

    #[test]
    fn unix_timestamps_map_to_utc_dates() {
        let ts = timestamp_from_unix(1_704_067_200).unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
