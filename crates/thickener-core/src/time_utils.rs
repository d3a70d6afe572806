use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Result, ThickenerError};

// ── Text timestamps ───────────────────────────────────────────────────────────

/// Date-time layouts seen in historian exports, tried in order.
const DATETIME_FMTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Date-only layouts; the time is taken as midnight.
const DATE_FMTS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Parse a timestamp from free text.
///
/// Accepts RFC 3339 (the wall-clock part is kept, the offset dropped), the
/// layouts in [`DATETIME_FMTS`] and the date-only layouts in [`DATE_FMTS`].
/// Returns `None` for empty or unrecognised input; never fails loudly.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    for fmt in DATETIME_FMTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive);
        }
    }

    DATE_FMTS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Like [`parse_timestamp`] but reports unrecognised input as an error.
///
/// Used at the command-line boundary where a bad value is a user mistake.
pub fn parse_timestamp_strict(s: &str) -> Result<NaiveDateTime> {
    parse_timestamp(s).ok_or_else(|| ThickenerError::TimestampParse(s.to_string()))
}

/// Parse a calendar date (`%Y-%m-%d` or `%d/%m/%Y`).
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();
    DATE_FMTS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ThickenerError::TimestampParse(s.to_string()))
}

// ── Excel serial dates ────────────────────────────────────────────────────────

/// Largest serial Excel can represent (9999-12-31).
const EXCEL_MAX_SERIAL: f64 = 2_958_465.999_999;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Convert an Excel serial day number (1900 date system) to a timestamp.
///
/// Uses the 1899-12-30 epoch, which agrees with Excel for every date after
/// 1900-02-28. Negative, non-finite and out-of-range serials yield `None`.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

// ── Day windows ───────────────────────────────────────────────────────────────

/// First instant of `date`.
pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Last representable instant of `date` (23:59:59.999999999).
/// Saturates at [`NaiveDateTime::MAX`] on the last representable date.
pub fn day_end(date: NaiveDate) -> NaiveDateTime {
    day_start(date)
        .checked_add_signed(Duration::days(1) - Duration::nanoseconds(1))
        .unwrap_or(NaiveDateTime::MAX)
}

// ── Display ───────────────────────────────────────────────────────────────────

/// Render a timestamp the way summaries and reports show it.
///
/// Midnight timestamps print as a bare date (`2024-03-01`), everything else
/// as `2024-03-01 06:15`.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
