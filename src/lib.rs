//! Medalboard - filter and aggregate Olympic medal tables
//!
//! The engine lives in [`analysis`]: restrict a [`models::Dataset`] with a
//! [`analysis::FilterSpec`], group it with a [`analysis::GroupSpec`], and
//! optionally reshape the result with [`analysis::pivot_wide`]. The other
//! modules load data, read configuration and render reports around it.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod models;
pub mod report;
