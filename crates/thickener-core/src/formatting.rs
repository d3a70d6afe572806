use crate::models::{BeforeAfter, SideSummary, TargetCompliance};
use crate::time_utils::format_timestamp;

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use thickener_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    // Handle the sign separately so the thousands grouping works on the
    // absolute value.
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by half an ULP at the target precision so exact binary midpoints
    // round away from zero.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        // `frac_str` starts with "0.", e.g. "0.50". Strip the leading "0".
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", result)
    } else {
        result
    }
}

/// One side of a before/after comparison, e.g.
/// `Before (n=12): mean=48.20, p50=48.00, p5–p95=(45.10–51.90)`.
pub fn format_side(label: &str, side: &SideSummary) -> String {
    match side.stats() {
        Some(s) => format!(
            "{label} (n={}): mean={:.2}, p50={:.2}, p5–p95=({:.2}–{:.2})",
            s.count, s.mean, s.median, s.p5, s.p95
        ),
        None => format!("{label} (n=0): insufficient data"),
    }
}

/// Single-line summary of a before/after comparison.
pub fn format_before_after(result: &BeforeAfter) -> String {
    format!(
        "{}  |  {}",
        format_side("Before", &result.before_summary),
        format_side("After", &result.after_summary)
    )
}

/// Single-line summary of a compliance report.
///
/// ```text
/// Window: 2024-03-01 to 2024-03-31 | Target: 60 ±2  →  Below=3, Within=20, Above=1  (83.3% within)
/// ```
pub fn format_compliance(report: &TargetCompliance) -> String {
    format!(
        "Window: {} to {} | Target: {} ±{}  →  Below={}, Within={}, Above={}  ({:.1}% within)",
        format_timestamp(report.start),
        format_timestamp(report.end),
        report.target,
        report.tolerance,
        report.below,
        report.within,
        report.above,
        report.percent_within()
    )
}

/// Key figures of a compliance report as `(label, value)` pairs, in display
/// order.
pub fn compliance_kpis(report: &TargetCompliance) -> Vec<(&'static str, String)> {
    vec![
        ("% within target", format!("{:.1}%", report.percent_within())),
        ("Below", report.below.to_string()),
        ("Within", report.within.to_string()),
        ("Above", report.above.to_string()),
        ("Mean", format_number(report.summary.mean, 2)),
        ("Median", format_number(report.summary.median, 2)),
        ("Samples", report.total().to_string()),
    ]
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Summary;
    use chrono::NaiveDate;

    fn day(d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn report() -> TargetCompliance {
        TargetCompliance {
            column: "Underflow_%S".to_string(),
            start: day(1),
            end: day(31),
            target: 60.0,
            tolerance: 2.0,
            below: 3,
            within: 20,
            above: 1,
            summary: Summary::from_values(&[58.0, 60.0, 61.0]).unwrap(),
        }
    }

    // ── format_number ────────────────────────────────────────────────────────

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_with_thousands() {
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(1_000.0, 0), "1,000");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
    }

    #[test]
    fn test_format_number_negative_rounding_to_zero() {
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_format_number_rounds_up() {
        assert_eq!(format_number(1.005, 2), "1.01");
    }

    // ── before/after ─────────────────────────────────────────────────────────

    #[test]
    fn test_format_side_stats() {
        let side = SideSummary::from_values(&[1.0, 2.0, 3.0]);
        assert_eq!(
            format_side("Before", &side),
            "Before (n=3): mean=2.00, p50=2.00, p5–p95=(1.10–2.90)"
        );
    }

    #[test]
    fn test_format_side_insufficient() {
        assert_eq!(
            format_side("After", &SideSummary::InsufficientData),
            "After (n=0): insufficient data"
        );
    }

    #[test]
    fn test_format_before_after_joins_sides() {
        let result = BeforeAfter {
            column: "Tonnage, tph".to_string(),
            cutoff: day(15),
            window_start: None,
            window_end: None,
            before: vec![10.0],
            after: vec![],
            before_summary: SideSummary::from_values(&[10.0]),
            after_summary: SideSummary::InsufficientData,
        };
        assert_eq!(
            format_before_after(&result),
            "Before (n=1): mean=10.00, p50=10.00, p5–p95=(10.00–10.00)  |  After (n=0): insufficient data"
        );
    }

    // ── compliance ───────────────────────────────────────────────────────────

    #[test]
    fn test_format_compliance() {
        assert_eq!(
            format_compliance(&report()),
            "Window: 2024-03-01 to 2024-03-31 | Target: 60 ±2  →  Below=3, Within=20, Above=1  (83.3% within)"
        );
    }

    #[test]
    fn test_compliance_kpis_order() {
        let kpis = compliance_kpis(&report());
        let labels: Vec<&str> = kpis.iter().map(|(l, _)| *l).collect();
        assert_eq!(
            labels,
            vec!["% within target", "Below", "Within", "Above", "Mean", "Median", "Samples"]
        );
        assert_eq!(kpis[0].1, "83.3%");
        assert_eq!(kpis[6].1, "24");
    }

    // ── group_thousands (via format_number) ──────────────────────────────────

    #[test]
    fn test_group_thousands_seven_digits() {
        assert_eq!(format_number(1_234_567.0, 0), "1,234,567");
    }
}
