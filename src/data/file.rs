//! Local `.json` / `.csv` exports as a record source.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::data::RecordSource;
use crate::domain::{FIELD_DATE, RawRecord, RawValue};
use crate::error::AppError;
use crate::io::ingest::{load_records, parse_date_value};

/// Column that, when present, ties a row to one product.
pub const FIELD_PRODUCT: &str = "PRODUCT_ID";

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for FileSource {
    /// Rows outside `[start, end]` and rows of another product are dropped.
    /// Rows without a parseable date are kept.
    fn fetch(&self, product_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawRecord>, AppError> {
        let loaded = load_records(&self.path)?;
        for err in &loaded.row_errors {
            warn!(path = %self.path.display(), line = err.line, "{}", err.message);
        }

        let records: Vec<RawRecord> = loaded
            .records
            .into_iter()
            .filter(|record| matches_product(record, product_id))
            .filter(|record| in_range(record, start, end))
            .collect();

        debug!(
            path = %self.path.display(),
            rows_read = loaded.rows_read,
            kept = records.len(),
            "loaded records from file"
        );
        Ok(records)
    }
}

fn matches_product(record: &RawRecord, product_id: &str) -> bool {
    match record.get_present(FIELD_PRODUCT) {
        Some(RawValue::Text(id)) => id.trim() == product_id,
        _ => true,
    }
}

fn in_range(record: &RawRecord, start: NaiveDate, end: NaiveDate) -> bool {
    match record.get_present(FIELD_DATE).and_then(parse_date_value) {
        Some(date) => date >= start && date <= end,
        None => true,
    }
}
