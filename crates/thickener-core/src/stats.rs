use serde::{Deserialize, Serialize};

// ── Percentile helper ─────────────────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using standard linear
/// interpolation (the same algorithm used by NumPy's `percentile` function).
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> Option<f64> {
    let len = sorted_data.len();
    match len {
        0 => return None,
        1 => return Some(sorted_data[0]),
        _ => {}
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted_data[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo]))
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// ── Summary ───────────────────────────────────────────────────────────────────

/// Descriptive statistics of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub p5: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// Summarise `values`, ignoring non-finite entries.
    ///
    /// Returns `None` when no finite value remains, so callers can never
    /// report statistics of an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            count: sorted.len(),
            mean: mean(&sorted)?,
            median: percentile(&sorted, 50.0)?,
            p5: percentile(&sorted, 5.0)?,
            p95: percentile(&sorted, 95.0)?,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── percentile ───────────────────────────────────────────────────────────

    #[test]
    fn test_percentile_empty_returns_none() {
        assert_eq!(percentile(&[], 90.0), None);
    }

    #[test]
    fn test_percentile_single_element() {
        assert_eq!(percentile(&[42.0], 5.0), Some(42.0));
        assert_eq!(percentile(&[42.0], 0.0), Some(42.0));
        assert_eq!(percentile(&[42.0], 100.0), Some(42.0));
    }

    #[test]
    fn test_percentile_p50_even() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        // rank = 0.5 * 3 = 1.5 → interpolate between data[1]=2 and data[2]=3
        assert!((percentile(&data, 50.0).unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_bounds() {
        let data = vec![10.0, 20.0, 30.0];
        assert!((percentile(&data, 0.0).unwrap() - 10.0).abs() < 1e-9);
        assert!((percentile(&data, 100.0).unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_p5_p95_twenty_one_elements() {
        // 0..=20: rank(5) = 0.05 * 20 = 1.0, rank(95) = 19.0
        let data: Vec<f64> = (0..=20).map(|x| x as f64).collect();
        assert!((percentile(&data, 5.0).unwrap() - 1.0).abs() < 1e-9);
        assert!((percentile(&data, 95.0).unwrap() - 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_p95_ten_elements() {
        // 1..=10 sorted: rank = 0.95 * 9 = 8.55 → 9 + 0.55*(10-9) = 9.55
        let data: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let p95 = percentile(&data, 95.0).unwrap();
        assert!((p95 - 9.55).abs() < 1e-9, "p95 = {p95}");
    }

    // ── Summary ───────────────────────────────────────────────────────────────

    #[test]
    fn test_summary_empty_is_none() {
        assert_eq!(Summary::from_values(&[]), None);
        assert_eq!(Summary::from_values(&[f64::NAN, f64::INFINITY]), None);
    }

    #[test]
    fn test_summary_unsorted_input() {
        let s = Summary::from_values(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.count, 4);
        assert!((s.mean - 2.5).abs() < 1e-9);
        assert!((s.median - 2.5).abs() < 1e-9);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        // rank(5) = 0.15 → 1 + 0.15 * 1
        assert!((s.p5 - 1.15).abs() < 1e-9);
        // rank(95) = 2.85 → 3 + 0.85 * 1
        assert!((s.p95 - 3.85).abs() < 1e-9);
    }

    #[test]
    fn test_summary_skips_non_finite() {
        let s = Summary::from_values(&[10.0, f64::NAN, 20.0]).unwrap();
        assert_eq!(s.count, 2);
        assert!((s.mean - 15.0).abs() < 1e-9);
    }
}
