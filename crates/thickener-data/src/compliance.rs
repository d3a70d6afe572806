//! Target-band compliance over a time window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thickener_core::models::{ComplianceOutcome, Dataset, TargetCompliance, Timestamp};
use thickener_core::stats::Summary;
use thickener_core::time_utils::{day_end, day_start};
use thickener_core::{Result, ThickenerError};
use tracing::debug;

// ── DateWindow ────────────────────────────────────────────────────────────────

/// An inclusive `[start, end]` timestamp window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl DateWindow {
    /// Whole calendar days from the first instant of `start` to the last
    /// instant of `end`.
    pub fn inclusive(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: day_start(start),
            end: day_end(end),
        }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts <= self.end
    }
}

// ── target_compliance ─────────────────────────────────────────────────────────

/// Count samples of `column` inside `[start, end]` that fall below, within or
/// above `target ± tolerance`. The band edges count as within.
///
/// Returns [`ComplianceOutcome::NoDataInWindow`] when the window holds no
/// sample.
pub fn target_compliance(
    dataset: &Dataset,
    column: &str,
    start: Timestamp,
    end: Timestamp,
    target: f64,
    tolerance: f64,
) -> Result<ComplianceOutcome> {
    if !target.is_finite() {
        return Err(ThickenerError::InvalidParameter(format!(
            "target must be a finite number, got {target}"
        )));
    }
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ThickenerError::InvalidParameter(format!(
            "tolerance must be a finite number >= 0, got {tolerance}"
        )));
    }
    if start > end {
        return Err(ThickenerError::InvalidParameter(format!(
            "window start {start} is after window end {end}"
        )));
    }

    let window = DateWindow { start, end };
    let values: Vec<f64> = dataset
        .series(column)?
        .into_iter()
        .filter(|(ts, _)| window.contains(*ts))
        .map(|(_, v)| v)
        .collect();

    let Some(summary) = Summary::from_values(&values) else {
        debug!("No samples of {} between {} and {}", column, start, end);
        return Ok(ComplianceOutcome::NoDataInWindow);
    };

    let (lo, hi) = (target - tolerance, target + tolerance);
    let below = values.iter().filter(|&&v| v < lo).count();
    let above = values.iter().filter(|&&v| v > hi).count();
    let within = values.len() - below - above;

    debug!(
        "Compliance on {}: {} below, {} within, {} above",
        column, below, within, above
    );

    Ok(ComplianceOutcome::Report(TargetCompliance {
        column: column.to_string(),
        start,
        end,
        target,
        tolerance,
        below,
        within,
        above,
        summary,
    }))
}

/// [`target_compliance`] over whole calendar days.
pub fn target_compliance_on_dates(
    dataset: &Dataset,
    column: &str,
    window: DateWindow,
    target: f64,
    tolerance: f64,
) -> Result<ComplianceOutcome> {
    target_compliance(dataset, column, window.start, window.end, target, tolerance)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use thickener_core::models::Column;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(d: u32, h: u32) -> Timestamp {
        date(d).and_hms_opt(h, 0, 0).unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::new(
            "Date",
            vec![
                Some(at(1, 0)),
                Some(at(1, 6)),
                Some(at(1, 12)),
                Some(at(1, 18)),
                Some(at(2, 23)),
                None,
                Some(at(3, 0)),
            ],
        )
        .with_column(Column::numeric(
            "Underflow_%S",
            [
                Some(57.0),
                Some(58.0),
                Some(60.0),
                Some(62.0),
                None,
                Some(60.0),
                Some(65.0),
            ],
        ))
        .unwrap()
    }

    fn report(outcome: ComplianceOutcome) -> TargetCompliance {
        match outcome {
            ComplianceOutcome::Report(r) => r,
            ComplianceOutcome::NoDataInWindow => panic!("expected a report"),
        }
    }

    // ── Counting ──────────────────────────────────────────────────────────────

    #[test]
    fn test_band_edges_are_within() {
        let r = report(
            target_compliance(&dataset(), "Underflow_%S", at(1, 0), at(1, 18), 60.0, 2.0).unwrap(),
        );
        // 58 and 62 sit exactly on the band edges.
        assert_eq!((r.below, r.within, r.above), (1, 3, 0));
        assert_eq!(r.total(), 4);
        assert_eq!(r.percent_within(), 75.0);
    }

    #[test]
    fn test_zero_tolerance() {
        let r = report(
            target_compliance(&dataset(), "Underflow_%S", at(1, 0), at(1, 18), 60.0, 0.0).unwrap(),
        );
        assert_eq!((r.below, r.within, r.above), (2, 1, 1));
    }

    #[test]
    fn test_window_is_inclusive() {
        let r = report(
            target_compliance(&dataset(), "Underflow_%S", at(1, 6), at(1, 12), 60.0, 1.0).unwrap(),
        );
        assert_eq!(r.total(), 2);
    }

    #[test]
    fn test_missing_values_excluded_from_total() {
        let window = DateWindow::inclusive(date(1), date(3));
        let r = report(
            target_compliance_on_dates(&dataset(), "Underflow_%S", window, 60.0, 2.0).unwrap(),
        );
        // Five timestamped samples; the 2 Mar row has no value and the
        // untimestamped row is outside every window.
        assert_eq!(r.total(), 5);
        assert_eq!(r.below + r.within + r.above, r.total());
        assert_eq!(r.summary.count, 5);
    }

    #[test]
    fn test_no_data_in_window() {
        let outcome =
            target_compliance(&dataset(), "Underflow_%S", at(2, 0), at(2, 23), 60.0, 2.0).unwrap();
        assert_eq!(outcome, ComplianceOutcome::NoDataInWindow);
        assert!(outcome.report().is_none());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_rejects_negative_tolerance() {
        let err = target_compliance(&dataset(), "Underflow_%S", at(1, 0), at(3, 0), 60.0, -1.0)
            .unwrap_err();
        assert!(matches!(err, ThickenerError::InvalidParameter(_)));
    }

    #[test]
    fn test_rejects_non_finite_target() {
        let err =
            target_compliance(&dataset(), "Underflow_%S", at(1, 0), at(3, 0), f64::NAN, 1.0)
                .unwrap_err();
        assert!(matches!(err, ThickenerError::InvalidParameter(_)));
    }

    #[test]
    fn test_rejects_reversed_window() {
        let err = target_compliance(&dataset(), "Underflow_%S", at(3, 0), at(1, 0), 60.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, ThickenerError::InvalidParameter(_)));
    }

    #[test]
    fn test_unknown_column() {
        let err =
            target_compliance(&dataset(), "Nope", at(1, 0), at(3, 0), 60.0, 1.0).unwrap_err();
        assert!(matches!(err, ThickenerError::UnknownColumn(_)));
    }

    // ── DateWindow ────────────────────────────────────────────────────────────

    #[test]
    fn test_date_window_covers_whole_days() {
        let window = DateWindow::inclusive(date(1), date(2));
        assert!(window.contains(at(1, 0)));
        assert!(window.contains(date(2).and_hms_opt(23, 59, 59).unwrap()));
        assert!(!window.contains(at(3, 0)));
    }
}
