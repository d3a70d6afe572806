use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ThickenerError};
use crate::stats::Summary;
use crate::time_utils::parse_timestamp;

/// A timestamp read from the workbook. Workbooks carry no timezone.
pub type Timestamp = NaiveDateTime;

// ── CellValue ─────────────────────────────────────────────────────────────────

/// One cell of a measurement column.
///
/// Serialized untagged so a dataset renders as plain records JSON:
/// numbers as numbers, text as strings and missing cells as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Build a cell from an optional number; non-finite values become missing.
    pub fn from_number(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => CellValue::Number(v),
            _ => CellValue::Missing,
        }
    }

    /// The numeric value, if this cell holds a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Missing => write!(f, ""),
        }
    }
}

// ── Column ────────────────────────────────────────────────────────────────────

/// A named measurement series, one cell per dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a numeric column from optional values.
    pub fn numeric(name: impl Into<String>, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self::new(name, values.into_iter().map(CellValue::from_number).collect())
    }

    /// `true` when the column holds no text cell. An all-missing column counts
    /// as numeric.
    pub fn is_numeric(&self) -> bool {
        !self.values.iter().any(|v| matches!(v, CellValue::Text(_)))
    }

    /// Per-row numeric view; text and missing cells map to `None`.
    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.values.iter().map(CellValue::as_number).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ── Dataset ───────────────────────────────────────────────────────────────────

/// The canonical table produced by ingestion.
///
/// Stored column-wise: `timestamps[i]` and `columns[k].values[i]` belong to
/// row `i`. Every column has exactly one value per timestamp. A timestamp of
/// `None` marks a row whose time could not be parsed; such rows are kept but
/// skipped by every time-indexed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    timestamp_column: String,
    timestamps: Vec<Option<Timestamp>>,
    columns: Vec<Column>,
}

/// Unchecked wire form of a [`Dataset`]; columns are re-added one by one so
/// a payload with ragged or duplicate columns is rejected.
#[derive(Deserialize)]
struct RawDataset {
    timestamp_column: String,
    timestamps: Vec<Option<Timestamp>>,
    columns: Vec<Column>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = ThickenerError;

    fn try_from(raw: RawDataset) -> Result<Self> {
        let mut dataset = Dataset::new(raw.timestamp_column, raw.timestamps);
        for column in raw.columns {
            dataset.push_column(column)?;
        }
        Ok(dataset)
    }
}

impl Dataset {
    /// Create a dataset with only its timestamp column.
    pub fn new(timestamp_column: impl Into<String>, timestamps: Vec<Option<Timestamp>>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            timestamps,
            columns: Vec::new(),
        }
    }

    /// Append a new column. Fails on a length mismatch or a duplicate name.
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        self.check_length(&column)?;
        if column.name == self.timestamp_column || self.column(&column.name).is_some() {
            return Err(ThickenerError::DuplicateColumn(column.name));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Builder form of [`Dataset::push_column`].
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        self.push_column(column)?;
        Ok(self)
    }

    /// Replace the column with the same name in place, or append it.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        self.check_length(&column)?;
        if column.name == self.timestamp_column {
            return Err(ThickenerError::DuplicateColumn(column.name));
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Remove a column by name, returning it when it existed.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    fn check_length(&self, column: &Column) -> Result<()> {
        if column.len() != self.timestamps.len() {
            return Err(ThickenerError::LengthMismatch {
                column: column.name.clone(),
                expected: self.timestamps.len(),
                actual: column.len(),
            });
        }
        Ok(())
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    pub fn timestamps(&self) -> &[Option<Timestamp>] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// All column names, timestamp column first.
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once(self.timestamp_column.as_str())
            .chain(self.columns.iter().map(|c| c.name.as_str()))
            .collect()
    }

    /// Names of the measurement columns that are numeric.
    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of columns including the timestamp column.
    pub fn width(&self) -> usize {
        self.columns.len() + 1
    }

    /// Number of rows with a valid timestamp.
    pub fn valid_row_count(&self) -> usize {
        self.timestamps.iter().filter(|t| t.is_some()).count()
    }

    /// Earliest and latest valid timestamps.
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        let mut valid = self.timestamps.iter().flatten();
        let first = *valid.next()?;
        Some(valid.fold((first, first), |(lo, hi), &t| (lo.min(t), hi.max(t))))
    }

    /// `(timestamp, value)` pairs of a numeric column, skipping rows with a
    /// missing timestamp or a missing value.
    pub fn series(&self, name: &str) -> Result<Vec<(Timestamp, f64)>> {
        let column = self
            .column(name)
            .ok_or_else(|| ThickenerError::UnknownColumn(name.to_string()))?;
        if !column.is_numeric() {
            return Err(ThickenerError::NonNumericColumn(name.to_string()));
        }
        Ok(self
            .timestamps
            .iter()
            .zip(&column.values)
            .filter_map(|(ts, value)| Some(((*ts)?, value.as_number()?)))
            .collect())
    }

    // ── Records JSON ──────────────────────────────────────────────────────────

    /// Render the dataset as records-oriented JSON, one object per row.
    ///
    /// Timestamps are ISO-8601 strings (`null` when missing).
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        (0..self.len())
            .map(|row| {
                let mut record = serde_json::Map::with_capacity(self.width());
                let ts = match self.timestamps[row] {
                    Some(t) => serde_json::Value::String(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
                    None => serde_json::Value::Null,
                };
                record.insert(self.timestamp_column.clone(), ts);
                for column in &self.columns {
                    let value = match &column.values[row] {
                        CellValue::Number(v) => serde_json::Number::from_f64(*v)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null),
                        CellValue::Text(s) => serde_json::Value::String(s.clone()),
                        CellValue::Missing => serde_json::Value::Null,
                    };
                    record.insert(column.name.clone(), value);
                }
                record
            })
            .collect()
    }

    /// Rebuild a dataset from records JSON produced by [`Dataset::to_records`].
    ///
    /// `columns` gives the column order (timestamp column first); JSON objects
    /// do not preserve it. Keys absent from a record read as missing.
    pub fn from_records(
        columns: &[&str],
        records: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<Self> {
        let (ts_name, measurement_names) = columns.split_first().ok_or_else(|| {
            ThickenerError::InvalidParameter("at least a timestamp column is required".to_string())
        })?;

        let timestamps = records
            .iter()
            .map(|r| r.get(*ts_name).and_then(|v| v.as_str()).and_then(parse_timestamp))
            .collect();
        let mut dataset = Dataset::new(*ts_name, timestamps);

        for name in measurement_names {
            let values = records
                .iter()
                .map(|r| match r.get(*name) {
                    Some(serde_json::Value::Number(n)) => CellValue::from_number(n.as_f64()),
                    Some(serde_json::Value::String(s)) => CellValue::Text(s.clone()),
                    Some(serde_json::Value::Bool(b)) => CellValue::Text(b.to_string()),
                    _ => CellValue::Missing,
                })
                .collect();
            dataset.push_column(Column::new(*name, values))?;
        }
        Ok(dataset)
    }
}

// ── Analysis results ──────────────────────────────────────────────────────────

/// Statistics for one side of a comparison, or the explicit signal that the
/// side had no samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SideSummary {
    Stats(Summary),
    InsufficientData,
}

impl SideSummary {
    pub fn from_values(values: &[f64]) -> Self {
        Summary::from_values(values).map_or(SideSummary::InsufficientData, SideSummary::Stats)
    }

    pub fn stats(&self) -> Option<&Summary> {
        match self {
            SideSummary::Stats(s) => Some(s),
            SideSummary::InsufficientData => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, SideSummary::InsufficientData)
    }
}

/// A measurement split around a cutoff timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeforeAfter {
    pub column: String,
    pub cutoff: Timestamp,
    /// Lower bound of the before side when the comparison is windowed.
    pub window_start: Option<Timestamp>,
    /// Upper bound (inclusive) of the after side when windowed.
    pub window_end: Option<Timestamp>,
    pub before: Vec<f64>,
    pub after: Vec<f64>,
    pub before_summary: SideSummary,
    pub after_summary: SideSummary,
}

impl BeforeAfter {
    /// Both sides have samples.
    pub fn is_complete(&self) -> bool {
        !self.before_summary.is_insufficient() && !self.after_summary.is_insufficient()
    }

    /// After mean minus before mean; `None` unless both sides have samples.
    pub fn delta_mean(&self) -> Option<f64> {
        Some(self.after_summary.stats()?.mean - self.before_summary.stats()?.mean)
    }
}

/// Counts of samples below, inside and above a target band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCompliance {
    pub column: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub target: f64,
    pub tolerance: f64,
    pub below: usize,
    pub within: usize,
    pub above: usize,
    pub summary: Summary,
}

impl TargetCompliance {
    pub fn total(&self) -> usize {
        self.below + self.within + self.above
    }

    /// Share of samples inside the band, in percent. A report always holds at
    /// least one sample.
    pub fn percent_within(&self) -> f64 {
        100.0 * self.within as f64 / self.total() as f64
    }

    /// The inclusive band `[target - tolerance, target + tolerance]`.
    pub fn band(&self) -> (f64, f64) {
        (self.target - self.tolerance, self.target + self.tolerance)
    }
}

/// Result of a compliance request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComplianceOutcome {
    Report(TargetCompliance),
    NoDataInWindow,
}

impl ComplianceOutcome {
    pub fn report(&self) -> Option<&TargetCompliance> {
        match self {
            ComplianceOutcome::Report(r) => Some(r),
            ComplianceOutcome::NoDataInWindow => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
