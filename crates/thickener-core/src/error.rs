use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the thickener crates.
#[derive(Error, Debug)]
pub enum ThickenerError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The uploaded workbook could not be turned into a dataset.
    #[error("Failed to parse workbook: {0}")]
    Parse(String),

    /// A column name was not found in the dataset.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A column holds text cells where numbers were required.
    #[error("Column is not numeric: {0}")]
    NonNumericColumn(String),

    /// A column does not have one value per timestamp.
    #[error("Column {column} has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// A column with the same name is already present.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// A caller-supplied parameter is outside its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A resample rule outside the supported bucket sizes.
    #[error("Unknown resample rule: {0}")]
    UnknownBucket(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the thickener crates.
pub type Result<T> = std::result::Result<T, ThickenerError>;
