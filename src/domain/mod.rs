//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw source rows (`RawRecord`, `RawValue`) and their normalized form (`CanonicalRecord`)
//! - statistics outputs (`OverallStatistics`, `DailyTrendPoint`, `Histogram`)
//! - chart/report outputs (`TrendBucket`, `FailRatio`) and run configuration

pub mod types;

pub use types::*;
