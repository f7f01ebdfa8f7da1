//! Input/output helpers.
//!
//! - raw record ingest + normalization (`ingest`)
//! - trend CSV and statistics JSON exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
