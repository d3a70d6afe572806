//! Time-bucket resampling.
//!
//! Groups rows into fixed-width buckets aligned to the Unix epoch and reduces
//! every numeric column to its mean per bucket.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration};
use thickener_core::models::{CellValue, Column, Dataset, Timestamp};
use thickener_core::{Result, ThickenerError};
use tracing::debug;

// ── BucketSize ────────────────────────────────────────────────────────────────

/// The supported resample intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketSize {
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    FourHours,
    TwelveHours,
    OneDay,
    SevenDays,
}

impl BucketSize {
    pub const ALL: [BucketSize; 7] = [
        BucketSize::FifteenMinutes,
        BucketSize::ThirtyMinutes,
        BucketSize::OneHour,
        BucketSize::FourHours,
        BucketSize::TwelveHours,
        BucketSize::OneDay,
        BucketSize::SevenDays,
    ];

    /// Width of the bucket in seconds.
    pub fn seconds(self) -> i64 {
        match self {
            BucketSize::FifteenMinutes => 15 * 60,
            BucketSize::ThirtyMinutes => 30 * 60,
            BucketSize::OneHour => 3_600,
            BucketSize::FourHours => 4 * 3_600,
            BucketSize::TwelveHours => 12 * 3_600,
            BucketSize::OneDay => 86_400,
            BucketSize::SevenDays => 7 * 86_400,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// Rule code as typed on the command line.
    pub fn code(self) -> &'static str {
        match self {
            BucketSize::FifteenMinutes => "15min",
            BucketSize::ThirtyMinutes => "30min",
            BucketSize::OneHour => "1H",
            BucketSize::FourHours => "4H",
            BucketSize::TwelveHours => "12H",
            BucketSize::OneDay => "1D",
            BucketSize::SevenDays => "7D",
        }
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            BucketSize::FifteenMinutes => "15 min",
            BucketSize::ThirtyMinutes => "30 min",
            BucketSize::OneHour => "1 hour",
            BucketSize::FourHours => "4 hours",
            BucketSize::TwelveHours => "12 hours",
            BucketSize::OneDay => "1 day",
            BucketSize::SevenDays => "7 days",
        }
    }

    /// Start of the bucket containing `ts`.
    pub fn floor(self, ts: Timestamp) -> Timestamp {
        let secs = ts.and_utc().timestamp();
        let width = self.seconds();
        let start = secs.div_euclid(width) * width;
        DateTime::from_timestamp(start, 0)
            .map(|dt| dt.naive_utc())
            .unwrap_or(ts)
    }
}

impl fmt::Display for BucketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BucketSize {
    type Err = ThickenerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        BucketSize::ALL
            .into_iter()
            .find(|b| b.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ThickenerError::UnknownBucket(s.to_string()))
    }
}

// ── Bucket accumulation ───────────────────────────────────────────────────────

/// Running sums for one bucket, one slot per numeric column.
#[derive(Debug, Clone)]
struct BucketAccumulator {
    sums: Vec<f64>,
    counts: Vec<u32>,
}

impl BucketAccumulator {
    fn new(width: usize) -> Self {
        Self {
            sums: vec![0.0; width],
            counts: vec![0; width],
        }
    }

    fn add(&mut self, slot: usize, value: f64) {
        self.sums[slot] += value;
        self.counts[slot] += 1;
    }

    fn mean(&self, slot: usize) -> Option<f64> {
        match self.counts[slot] {
            0 => None,
            n => Some(self.sums[slot] / f64::from(n)),
        }
    }
}

// ── resample ──────────────────────────────────────────────────────────────────

/// Mean of every numeric column per bucket.
///
/// `None` returns the dataset unchanged. Otherwise rows without a timestamp
/// are dropped, non-numeric columns are dropped, and one row is emitted per
/// non-empty bucket, labelled by the bucket start, in ascending order.
pub fn resample(dataset: &Dataset, bucket: Option<BucketSize>) -> Dataset {
    let Some(bucket) = bucket else {
        return dataset.clone();
    };

    let numeric: Vec<&Column> = dataset.columns().iter().filter(|c| c.is_numeric()).collect();

    // BTreeMap keeps buckets sorted by start time.
    let mut buckets: BTreeMap<Timestamp, BucketAccumulator> = BTreeMap::new();
    for (row, ts) in dataset.timestamps().iter().enumerate() {
        let Some(ts) = ts else { continue };
        let acc = buckets
            .entry(bucket.floor(*ts))
            .or_insert_with(|| BucketAccumulator::new(numeric.len()));
        for (slot, column) in numeric.iter().enumerate() {
            if let Some(v) = column.values[row].as_number() {
                acc.add(slot, v);
            }
        }
    }

    let starts: Vec<Option<Timestamp>> = buckets.keys().copied().map(Some).collect();
    let mut out = Dataset::new(dataset.timestamp_column(), starts);
    for (slot, column) in numeric.iter().enumerate() {
        let values: Vec<CellValue> = buckets
            .values()
            .map(|acc| CellValue::from_number(acc.mean(slot)))
            .collect();
        // Lengths match and names are already unique in the source.
        if let Err(e) = out.push_column(Column::new(column.name.clone(), values)) {
            debug!("Dropping column {} from resample output: {}", column.name, e);
        }
    }

    debug!(
        "Resampled {} rows into {} buckets of {} ({} numeric columns)",
        dataset.len(),
        out.len(),
        bucket.label(),
        numeric.len()
    );

    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
