//! Before/after comparison around a cut-off timestamp.

use chrono::Duration;
use thickener_core::models::{BeforeAfter, Dataset, SideSummary, Timestamp};
use thickener_core::{Result, ThickenerError};
use tracing::debug;

// ── Public API ────────────────────────────────────────────────────────────────

/// Split `column` into samples strictly before `cutoff` and samples at or
/// after it, and summarise both sides.
///
/// Rows with a missing timestamp or a missing value are ignored. An empty
/// side is reported as [`SideSummary::InsufficientData`].
pub fn compare_before_after(
    dataset: &Dataset,
    column: &str,
    cutoff: Timestamp,
) -> Result<BeforeAfter> {
    split(dataset, column, cutoff, None)
}

/// Like [`compare_before_after`] but limited to `[cutoff - window, cutoff)`
/// before and `[cutoff, cutoff + window]` after.
pub fn compare_before_after_windowed(
    dataset: &Dataset,
    column: &str,
    cutoff: Timestamp,
    window: Duration,
) -> Result<BeforeAfter> {
    if window <= Duration::zero() {
        return Err(ThickenerError::InvalidParameter(format!(
            "comparison window must be positive, got {window}"
        )));
    }
    let start = cutoff.checked_sub_signed(window).ok_or_else(|| {
        ThickenerError::InvalidParameter(format!("window of {window} before {cutoff} is out of range"))
    })?;
    let end = cutoff.checked_add_signed(window).ok_or_else(|| {
        ThickenerError::InvalidParameter(format!("window of {window} after {cutoff} is out of range"))
    })?;
    split(dataset, column, cutoff, Some((start, end)))
}

// ── Private ───────────────────────────────────────────────────────────────────

fn split(
    dataset: &Dataset,
    column: &str,
    cutoff: Timestamp,
    window: Option<(Timestamp, Timestamp)>,
) -> Result<BeforeAfter> {
    let series = dataset.series(column)?;

    let mut before = Vec::new();
    let mut after = Vec::new();
    for (ts, value) in series {
        if ts < cutoff {
            if window.map_or(true, |(start, _)| ts >= start) {
                before.push(value);
            }
        } else if window.map_or(true, |(_, end)| ts <= end) {
            after.push(value);
        }
    }

    debug!(
        "Before/after on {} at {}: {} before, {} after",
        column,
        cutoff,
        before.len(),
        after.len()
    );

    Ok(BeforeAfter {
        column: column.to_string(),
        cutoff,
        window_start: window.map(|(start, _)| start),
        window_end: window.map(|(_, end)| end),
        before_summary: SideSummary::from_values(&before),
        after_summary: SideSummary::from_values(&after),
        before,
        after,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
