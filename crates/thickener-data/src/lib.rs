//! Ingestion and analysis for the thickener engine.
//!
//! Reads historian workbooks into a [`thickener_core::models::Dataset`],
//! resamples it into time buckets and runs the before/after and target
//! compliance comparisons.

pub mod aggregator;
pub mod analysis;
pub mod compliance;
pub mod reader;

pub use thickener_core as core;
