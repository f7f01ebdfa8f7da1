//! `yield-trends` library crate.
//!
//! The binary (`yt`) is a thin wrapper around this library so that:
//!
//! - the statistics core is testable without spawning processes
//! - the same reductions can back other front-ends (dashboards, notebooks)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod report;
pub mod settings;
pub mod stats;
pub mod trend;
