use tc_core::sample::SAMPLE_COLUMNS;

use crate::segment::ObservationWindow;

/// Percentiles reported per column, in order.
pub const PERCENTILES: [f64; 3] = [75.0, 90.0, 95.0];

/// Statistical features per column: mean, median, std, skew, kurtosis, 3 percentiles.
pub const STAT_FEATURES_PER_COLUMN: usize = 5 + PERCENTILES.len();

/// Width of the statistical block of a feature vector.
pub const STAT_FEATURES: usize = STAT_FEATURES_PER_COLUMN * SAMPLE_COLUMNS;

/// Summary statistics of one window.
///
/// Layout: means of the four columns, then medians, standard deviations,
/// skewness, kurtosis, and finally `[p75, p90, p95]` of column 0, column 1, …
///
/// # Example
/// ```
/// use tc_features::segment::ObservationWindow;
/// use tc_features::stats::{statistical_features, STAT_FEATURES};
/// use tc_core::sample::Sample;
///
/// let w = ObservationWindow { index: 0, samples: vec![Sample::new(1, 2, 3, 4); 10] };
/// let f = statistical_features(&w);
/// assert_eq!(f.len(), STAT_FEATURES);
/// assert_eq!(f[0], 1.0);
/// ```
#[must_use]
pub fn statistical_features(window: &ObservationWindow) -> Vec<f64> {
    let columns = window.columns();
    let mut out = Vec::with_capacity(STAT_FEATURES);

    out.extend(columns.iter().map(|c| mean(c)));
    out.extend(columns.iter().map(|c| median(c)));
    out.extend(columns.iter().map(|c| std_dev(c)));
    out.extend(columns.iter().map(|c| skewness(c)));
    out.extend(columns.iter().map(|c| kurtosis(c)));
    for c in &columns {
        let mut sorted = c.clone();
        sorted.sort_by(f64::total_cmp);
        out.extend(PERCENTILES.iter().map(|&p| percentile_sorted(&sorted, p)));
    }

    out
}

/// Arithmetic mean; 0 for an empty slice.
#[must_use]
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population variance (divides by `n`).
#[must_use]
pub fn variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / data.len() as f64
}

/// Population standard deviation.
#[must_use]
pub fn std_dev(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

#[must_use]
pub fn median(data: &[f64]) -> f64 {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, 50.0)
}

/// Percentile `p` (0–100) of an ascending slice, linear interpolation between
/// closest ranks.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Central moments m2, m3, m4 (biased).
fn central_moments(data: &[f64]) -> (f64, f64, f64) {
    let n = data.len() as f64;
    let m = mean(data);
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for &x in data {
        let d = x - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

/// Biased sample skewness `m3 / m2^1.5`. A constant column has skewness 0.
#[must_use]
pub fn skewness(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let (m2, m3, _) = central_moments(data);
    if m2 < 1e-30 {
        return 0.0;
    }
    m3 / m2.powf(1.5)
}

/// Excess (Fisher) kurtosis `m4 / m2² − 3`. A constant column has kurtosis 0.
#[must_use]
pub fn kurtosis(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let (m2, _, m4) = central_moments(data);
    if m2 < 1e-30 {
        return 0.0;
    }
    m4 / (m2 * m2) - 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::sample::Sample;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn percentile_is_linear() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile_sorted(&sorted, 75.0), 3.25));
        assert!(close(percentile_sorted(&sorted, 90.0), 3.7));
        assert!(close(percentile_sorted(&sorted, 0.0), 1.0));
        assert!(close(percentile_sorted(&sorted, 100.0), 4.0));
        assert!(close(median(&[4.0, 1.0, 3.0, 2.0]), 2.5));
    }

    #[test]
    fn moments_of_known_series() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(mean(&data), 5.0));
        assert!(close(std_dev(&data), 2.0));
        // m3 = 5.25, m2 = 4 → 5.25 / 8
        assert!(close(skewness(&data), 0.656_25));
        // m4 = 44.5, m2² = 16 → 2.78125 − 3
        assert!(close(kurtosis(&data), -0.218_75));
    }

    #[test]
    fn constant_column_has_no_nan() {
        let data = [260.0; 10];
        assert!(close(skewness(&data), 0.0));
        assert!(close(kurtosis(&data), 0.0));
        assert!(close(std_dev(&data), 0.0));
    }

    #[test]
    fn layout_is_family_major_then_column() {
        let samples = (0..4u64).map(|i| Sample::new(i, 10 * i, 100, 0)).collect();
        let w = ObservationWindow { index: 0, samples };
        let f = statistical_features(&w);
        assert_eq!(f.len(), 32);
        // means
        assert!(close(f[0], 1.5));
        assert!(close(f[1], 15.0));
        assert!(close(f[2], 100.0));
        // medians start at 4
        assert!(close(f[4], 1.5));
        // percentiles of column 0 start at 20: p75 of [0,1,2,3] = 2.25
        assert!(close(f[20], 2.25));
        // p95 of column 1 = 10 * 2.85
        assert!(close(f[25], 28.5));
    }
}
