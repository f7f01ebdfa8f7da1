//! Settings collaborator: per-product yield targets and active flags.
//!
//! Callers receive a store explicitly; the CLI uses `JsonFileStore`, tests
//! use `MemoryStore`.

use std::collections::BTreeMap;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{DEFAULT_TARGET, OverallStatistics, Product};
use crate::error::AppError;

/// Key/value access to persisted dashboard settings.
pub trait SettingsStore {
    /// Target for `product_id` in `month` (`YYYY-MM`), if one was set.
    fn get_target(&self, product_id: &str, month: &str) -> Option<f64>;
    fn set_target(&mut self, product_id: &str, month: &str, target: f64) -> Result<(), AppError>;

    /// Unknown products are inactive.
    fn get_product_active(&self, product_id: &str) -> bool;
    fn set_product_active(&mut self, product_id: &str, active: bool) -> Result<(), AppError>;
}

/// Serialized settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsData {
    #[serde(default)]
    pub product_active_states: BTreeMap<String, bool>,
    #[serde(default)]
    pub yield_targets: BTreeMap<String, f64>,
}

impl SettingsData {
    fn target(&self, product_id: &str, month: &str) -> Option<f64> {
        self.yield_targets.get(&target_key(product_id, month)).copied()
    }
}

/// Composite key `"<product>-<YYYY-MM>"`.
pub fn target_key(product_id: &str, month: &str) -> String {
    format!("{product_id}-{month}")
}

/// `YYYY-MM` for a date.
pub fn month_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Validate a `YYYY-MM` month key.
pub fn parse_month(month: &str) -> Result<String, AppError> {
    let month = month.trim();
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map(month_of)
        .map_err(|_| AppError::usage(format!("Invalid month '{month}'. Expected YYYY-MM.")))
}

/// Reject targets that cannot be stored as JSON numbers.
pub fn validate_target(target: f64) -> Result<f64, AppError> {
    if target.is_finite() {
        Ok(target)
    } else {
        Err(AppError::usage(format!("Invalid target '{target}'.")))
    }
}

/// Save targets for several months of one year.
///
/// `entries` pairs a month number with an optional value; months without a
/// value are skipped. Everything is validated before the first write, so a
/// bad entry leaves the store untouched. Returns the `(month, target)` pairs
/// that were saved.
pub fn set_year_targets<S: SettingsStore + ?Sized>(
    store: &mut S,
    product_id: &str,
    year: i32,
    entries: &[(u32, Option<f64>)],
) -> Result<Vec<(String, f64)>, AppError> {
    let mut pending = Vec::with_capacity(entries.len());
    for &(month, target) in entries {
        let Some(target) = target else { continue };
        let key = NaiveDate::from_ymd_opt(year, month, 1)
            .map(month_of)
            .ok_or_else(|| AppError::usage(format!("Invalid month {month} for year {year}.")))?;
        pending.push((key, validate_target(target)?));
    }
    for (month, target) in &pending {
        store.set_target(product_id, month, *target)?;
    }
    Ok(pending)
}

/// Stored target, or `DEFAULT_TARGET` when none was set.
pub fn resolve_target<S: SettingsStore + ?Sized>(store: &S, product_id: &str, month: &str) -> f64 {
    store.get_target(product_id, month).unwrap_or(DEFAULT_TARGET)
}

/// Overwrite the computed target with a looked-up one.
pub fn apply_target(stats: &mut OverallStatistics, target: f64) {
    stats.target = target;
}

/// The product catalogue with active flags taken from the store.
pub fn list_products<S: SettingsStore + ?Sized>(store: &S) -> Vec<Product> {
    const CATALOGUE: [(&str, &str); 3] = [
        ("PRODUCT-A", "Product A"),
        ("PRODUCT-B", "Product B"),
        ("PRODUCT-C", "Product C"),
    ];
    CATALOGUE
        .iter()
        .map(|(id, name)| Product {
            id: id.to_string(),
            name: name.to_string(),
            active: store.get_product_active(id),
        })
        .collect()
}

/// Non-persistent store for tests and mock runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: SettingsData,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded like the demo dashboard: `PRODUCT-A` active.
    pub fn with_defaults() -> Self {
        let mut data = SettingsData::default();
        data.product_active_states.insert("PRODUCT-A".to_string(), true);
        Self { data }
    }
}

impl SettingsStore for MemoryStore {
    fn get_target(&self, product_id: &str, month: &str) -> Option<f64> {
        self.data.target(product_id, month)
    }

    fn set_target(&mut self, product_id: &str, month: &str, target: f64) -> Result<(), AppError> {
        let target = validate_target(target)?;
        self.data.yield_targets.insert(target_key(product_id, month), target);
        Ok(())
    }

    fn get_product_active(&self, product_id: &str) -> bool {
        self.data.product_active_states.get(product_id).copied().unwrap_or(false)
    }

    fn set_product_active(&mut self, product_id: &str, active: bool) -> Result<(), AppError> {
        self.data.product_active_states.insert(product_id.to_string(), active);
        Ok(())
    }
}

/// JSON-file backed store; every write is saved immediately.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    data: SettingsData,
}

impl JsonFileStore {
    /// Open (or start) a settings file. A missing or corrupt file loads as
    /// empty settings.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = load_settings(&path);
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &SettingsData {
        &self.data
    }

    fn save(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|e| {
                AppError::collaborator(format!("Failed to create settings dir '{}': {e}", parent.display()))
            })?;
        }
        let file = File::create(&self.path).map_err(|e| {
            AppError::collaborator(format!("Failed to write settings '{}': {e}", self.path.display()))
        })?;
        serde_json::to_writer_pretty(file, &self.data)
            .map_err(|e| AppError::collaborator(format!("Failed to serialize settings: {e}")))?;
        debug!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}

fn load_settings(path: &Path) -> SettingsData {
    let Ok(file) = File::open(path) else {
        return SettingsData::default();
    };
    match serde_json::from_reader(file) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            SettingsData::default()
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn get_target(&self, product_id: &str, month: &str) -> Option<f64> {
        self.data.target(product_id, month)
    }

    fn set_target(&mut self, product_id: &str, month: &str, target: f64) -> Result<(), AppError> {
        let target = validate_target(target)?;
        self.data.yield_targets.insert(target_key(product_id, month), target);
        self.save()
    }

    fn get_product_active(&self, product_id: &str) -> bool {
        self.data.product_active_states.get(product_id).copied().unwrap_or(false)
    }

    fn set_product_active(&mut self, product_id: &str, active: bool) -> Result<(), AppError> {
        self.data.product_active_states.insert(product_id.to_string(), active);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawRecord;
    use crate::stats::calculate_yield_stats;

    #[test]
    fn month_keys() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(month_of(d), "2024-03");
        assert_eq!(parse_month(" 2024-11 ").unwrap(), "2024-11");
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("March").is_err());
    }

    #[test]
    fn memory_store_targets_and_flags() {
        let mut store = MemoryStore::new();
        assert_eq!(resolve_target(&store, "PRODUCT-A", "2024-01"), DEFAULT_TARGET);

        store.set_target("PRODUCT-A", "2024-01", 98.5).unwrap();
        assert_eq!(store.get_target("PRODUCT-A", "2024-01"), Some(98.5));
        assert_eq!(store.get_target("PRODUCT-A", "2024-02"), None);
        assert_eq!(resolve_target(&store, "PRODUCT-A", "2024-01"), 98.5);

        assert!(!store.get_product_active("PRODUCT-B"));
        store.set_product_active("PRODUCT-B", true).unwrap();
        assert!(store.get_product_active("PRODUCT-B"));
    }

    #[test]
    fn memory_store_rejects_non_finite_targets() {
        let mut store = MemoryStore::new();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(store.set_target("PRODUCT-A", "2024-01", bad).is_err());
        }
        assert_eq!(store.get_target("PRODUCT-A", "2024-01"), None);
    }

    #[test]
    fn year_targets_skip_empty_months() {
        let mut store = MemoryStore::new();
        let saved = set_year_targets(
            &mut store,
            "PRODUCT-B",
            2024,
            &[(1, Some(97.0)), (2, None), (12, Some(96.5))],
        )
        .unwrap();

        assert_eq!(saved, vec![("2024-01".to_string(), 97.0), ("2024-12".to_string(), 96.5)]);
        assert_eq!(store.get_target("PRODUCT-B", "2024-01"), Some(97.0));
        assert_eq!(store.get_target("PRODUCT-B", "2024-02"), None);
        assert_eq!(store.get_target("PRODUCT-B", "2024-12"), Some(96.5));
    }

    #[test]
    fn year_targets_validate_before_writing() {
        let mut store = MemoryStore::new();
        assert!(set_year_targets(&mut store, "PRODUCT-B", 2024, &[(1, Some(97.0)), (13, Some(90.0))]).is_err());
        assert!(set_year_targets(&mut store, "PRODUCT-B", 2024, &[(1, Some(97.0)), (2, Some(f64::NAN))]).is_err());
        assert_eq!(store.get_target("PRODUCT-B", "2024-01"), None);
    }

    #[test]
    fn products_reflect_active_flags() {
        let store = MemoryStore::with_defaults();
        let products = list_products(&store);
        assert_eq!(products.len(), 3);
        assert!(products[0].active);
        assert!(!products[1].active);
    }

    #[test]
    fn target_override_replaces_default() {
        let records = vec![RawRecord::new().with("PASS_CHIP_RATE", 97.0)];
        let mut stats = calculate_yield_stats(&records).unwrap();
        let mut store = MemoryStore::new();
        store.set_target("PRODUCT-A", "2024-06", 99.0).unwrap();

        apply_target(&mut stats, resolve_target(&store, "PRODUCT-A", "2024-06"));
        assert_eq!(stats.target, 99.0);
        assert_eq!(stats.average, 97.0);
    }

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = JsonFileStore::open(&path);
        store.set_target("PRODUCT-A", "2024-01", 97.25).unwrap();
        store.set_product_active("PRODUCT-C", true).unwrap();

        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get_target("PRODUCT-A", "2024-01"), Some(97.25));
        assert!(reopened.get_product_active("PRODUCT-C"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"PRODUCT-A-2024-01\""));
        assert!(text.contains("product_active_states"));
    }

    #[test]
    fn corrupt_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut store = JsonFileStore::open(&path);
        assert_eq!(store.data(), &SettingsData::default());
        assert!(store.set_target("PRODUCT-A", "2024-01", f64::NAN).is_err());
    }
}
