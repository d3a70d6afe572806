//! Core types for the thickener analytics engine.
//!
//! Holds the canonical [`models::Dataset`], the column schema, the unit
//! conversions, the statistics helpers and the settings shared by the
//! ingestion/analysis crate and the command-line front end.

pub mod conversions;
pub mod error;
pub mod formatting;
pub mod models;
pub mod report;
pub mod schema;
pub mod settings;
pub mod stats;
pub mod time_utils;

pub use error::{Result, ThickenerError};
