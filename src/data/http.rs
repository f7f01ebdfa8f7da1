//! HTTP JSON endpoint as a record source.
//!
//! `GET <base>/yield?product_id=..&start=YYYY-MM-DD&end=YYYY-MM-DD` must
//! answer with a JSON array of row objects (the same shape as a `.json`
//! export).

use chrono::NaiveDate;
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::data::RecordSource;
use crate::domain::RawRecord;
use crate::error::AppError;
use crate::io::ingest::records_from_json_rows;

const YIELD_PATH: &str = "yield";

pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{YIELD_PATH}", self.base_url.trim_end_matches('/'))
    }
}

impl RecordSource for HttpSource {
    fn fetch(&self, product_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawRecord>, AppError> {
        let url = self.endpoint();
        debug!(%url, product_id, %start, %end, "requesting yield rows");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("product_id", product_id),
                ("start", &start.to_string()),
                ("end", &end.to_string()),
            ])
            .send()
            .map_err(|e| AppError::collaborator(format!("Yield request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::collaborator(format!(
                "Yield request failed with status {}.",
                resp.status()
            )));
        }

        let rows: Vec<serde_json::Value> = resp
            .json()
            .map_err(|e| AppError::collaborator(format!("Failed to parse yield response: {e}")))?;

        let loaded = records_from_json_rows(rows);
        for err in &loaded.row_errors {
            warn!(%url, row = err.line, "{}", err.message);
        }
        Ok(loaded.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_path() {
        assert_eq!(HttpSource::new("http://fab.local/api").endpoint(), "http://fab.local/api/yield");
        assert_eq!(HttpSource::new("http://fab.local/api/").endpoint(), "http://fab.local/api/yield");
    }

    #[test]
    fn unreachable_host_is_a_collaborator_error() {
        let source = HttpSource::new("http://127.0.0.1:9");
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = source.fetch("PRODUCT-A", day, day).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_COLLABORATOR);
    }
}
