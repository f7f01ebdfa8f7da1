//! Record sources: where raw wafer rows come from.
//!
//! The statistics core never talks to a database or the network; a
//! `RecordSource` is handed to the pipeline and asked for one product's rows
//! over an inclusive date range.

use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;

use crate::domain::{RawRecord, RunConfig, SourceKind};
use crate::error::AppError;

pub mod file;
pub mod http;
pub mod mock;

pub use file::FileSource;
pub use http::HttpSource;
pub use mock::MockSource;

/// Default settings file location, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "data/settings.json";

/// Days covered when no start date is given.
pub const DEFAULT_RANGE_DAYS: i64 = 30;

pub const ENV_SOURCE: &str = "YT_SOURCE";
pub const ENV_DATA_FILE: &str = "YT_DATA_FILE";
pub const ENV_DATA_URL: &str = "YT_DATA_URL";
pub const ENV_SETTINGS_PATH: &str = "YT_SETTINGS_PATH";

/// Supplies raw rows for one product over `[start, end]`.
pub trait RecordSource: Send + Sync {
    fn fetch(&self, product_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawRecord>, AppError>;
}

/// Source and settings locations from `.env` / the environment.
///
/// CLI flags override every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub source: SourceKind,
    pub data_file: Option<PathBuf>,
    pub data_url: Option<String>,
    pub settings_path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Mock,
            data_file: None,
            data_url: None,
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
        }
    }
}

impl SourceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (the process environment in
    /// `from_env`, a map in tests). Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(ENV_SOURCE) {
            config.source = SourceKind::from_str(&raw, true)
                .map_err(|_| AppError::usage(format!("Invalid {ENV_SOURCE} '{raw}'. Expected mock, file or http.")))?;
        }
        config.data_file = get(ENV_DATA_FILE).map(PathBuf::from);
        config.data_url = get(ENV_DATA_URL);
        if let Some(path) = get(ENV_SETTINGS_PATH) {
            config.settings_path = PathBuf::from(path);
        }

        Ok(config)
    }
}

/// Fill in a missing start and/or end date: end defaults to `today`, start
/// to `DEFAULT_RANGE_DAYS` before the end.
pub fn default_range(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = end.unwrap_or(today);
    let start = start.unwrap_or(end - Duration::days(DEFAULT_RANGE_DAYS));
    (start, end)
}

/// Construct the record source a run asks for.
pub fn build_source(config: &RunConfig) -> Result<Box<dyn RecordSource>, AppError> {
    match config.source {
        SourceKind::Mock => Ok(Box::new(MockSource::new(config.seed))),
        SourceKind::File => {
            let path = config.data_file.clone().ok_or_else(|| {
                AppError::usage(format!("The file source needs --data-file (or {ENV_DATA_FILE})."))
            })?;
            Ok(Box::new(FileSource::new(path)))
        }
        SourceKind::Http => {
            let url = config.data_url.clone().ok_or_else(|| {
                AppError::usage(format!("The http source needs --data-url (or {ENV_DATA_URL})."))
            })?;
            Ok(Box::new(HttpSource::new(url)))
        }
    }
}
