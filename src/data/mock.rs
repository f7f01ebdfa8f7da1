//! Seeded synthetic wafer rows, shaped like a CP test header export.
//!
//! Every day is generated from its own RNG stream (seed, product, date), so
//! overlapping date ranges return identical rows for the days they share.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Duration, NaiveDate, NaiveTime};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::debug;

use crate::data::RecordSource;
use crate::domain::RawRecord;
use crate::error::AppError;
use crate::stats::round2;

/// Chips tested per wafer.
pub const TOTAL_CHIPS: i64 = 1000;

const MAX_WAFERS_PER_DAY: usize = 5;
const NOISE_SIGMA: f64 = 1.5;
const OUTLIER_PROB: f64 = 0.05;
const OUTLIER_DROP: std::ops::Range<f64> = 5.0..15.0;

const OPEN_SHARE: f64 = 0.45;
const SHORT_SHARE: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSource {
    seed: u64,
}

impl MockSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Rows for a single day.
    pub fn day_rows(&self, product_id: &str, day: NaiveDate) -> Result<Vec<RawRecord>, AppError> {
        let mut rng = StdRng::seed_from_u64(day_seed(self.seed, product_id, day));
        let noise = Normal::new(0.0, NOISE_SIGMA)
            .map_err(|e| AppError::collaborator(format!("Noise distribution error: {e}")))?;

        let base = base_yield(product_id);
        let lot_id = format!("LOT-{}", day.format("%Y%m%d"));
        let registered = day.and_time(NaiveTime::MIN);
        let wafers = rng.gen_range(1..=MAX_WAFERS_PER_DAY);

        let mut rows = Vec::with_capacity(wafers);
        for wafer in 1..=wafers {
            let mut variation = noise.sample(&mut rng);
            if rng.gen_bool(OUTLIER_PROB) {
                variation -= rng.gen_range(OUTLIER_DROP);
            }
            let yield_value = (base + variation).clamp(0.0, 100.0);

            let pass_chips = (TOTAL_CHIPS as f64 * yield_value / 100.0) as i64;
            let fail_chips = TOTAL_CHIPS - pass_chips;
            let open = (fail_chips as f64 * OPEN_SHARE) as i64;
            let short = (fail_chips as f64 * SHORT_SHARE) as i64;
            let bins = BTreeMap::from([
                ("1_Pass".to_string(), pass_chips),
                ("3_Open".to_string(), open),
                ("7_Short".to_string(), short),
                ("99_Other".to_string(), fail_chips - open - short),
            ]);

            rows.push(
                RawRecord::new()
                    .with("SUBSTRATE_ID", format!("{lot_id}-{wafer:02}"))
                    .with("LOT_ID", lot_id.as_str())
                    .with("WAFER_ID", wafer as i64)
                    .with("PRODUCT_ID", product_id)
                    .with("PROCESS", "CP_FINAL")
                    .with("PASS_CHIP", pass_chips)
                    .with("PASS_CHIP_RATE", round2(yield_value))
                    .with("EFFECTIVE_NUM", TOTAL_CHIPS)
                    .with("REGIST_DATE", registered)
                    .with("bins", bins),
            );
        }
        Ok(rows)
    }
}

impl RecordSource for MockSource {
    fn fetch(&self, product_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawRecord>, AppError> {
        let mut rows = Vec::new();
        let mut day = start;
        while day <= end {
            rows.extend(self.day_rows(product_id, day)?);
            day += Duration::days(1);
        }
        debug!(product_id, %start, %end, rows = rows.len(), "generated mock rows");
        Ok(rows)
    }
}

/// Per-product base yield in `[90.0, 94.5]`.
pub fn base_yield(product_id: &str) -> f64 {
    let mut hasher = DefaultHasher::new();
    product_id.hash(&mut hasher);
    90.0 + (hasher.finish() % 10) as f64 / 2.0
}

fn day_seed(seed: u64, product_id: &str, day: NaiveDate) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    product_id.hash(&mut hasher);
    day.hash(&mut hasher);
    hasher.finish()
}
