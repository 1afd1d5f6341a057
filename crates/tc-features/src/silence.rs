use tc_core::sample::SAMPLE_COLUMNS;

use crate::segment::ObservationWindow;
use crate::stats::{mean, variance};

/// Stand-alone default of the silence detector. Profiling overrides it through
/// `FeatureConfig::silence_threshold` (250).
pub const DEFAULT_SILENCE_THRESHOLD: u64 = 256;

/// Silence features per column: mean and variance of run length.
pub const SILENCE_FEATURES_PER_COLUMN: usize = 2;

/// Width of the silence block of a feature vector.
pub const SILENCE_FEATURES: usize = SILENCE_FEATURES_PER_COLUMN * SAMPLE_COLUMNS;

/// Lengths of the maximal runs of samples at or below `threshold`.
///
/// A column with no silent sample yields the single degenerate run `[0]`, so
/// downstream statistics are `{0, 0}` and vector width never changes.
///
/// # Example
/// ```
/// use tc_features::silence::silence_runs;
/// assert_eq!(silence_runs(&[0, 0, 900, 10, 900, 0, 0, 0], 256), vec![2, 1, 3]);
/// assert_eq!(silence_runs(&[900, 900], 256), vec![0]);
/// ```
#[must_use]
pub fn silence_runs(column: &[u64], threshold: u64) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut current = 0usize;

    for &v in column {
        if v <= threshold {
            current += 1;
        } else if current > 0 {
            runs.push(current);
            current = 0;
        }
    }
    if current > 0 {
        runs.push(current);
    }

    if runs.is_empty() {
        runs.push(0);
    }
    runs
}

/// `[mean run length, variance of run length]` for each column, in column order.
#[must_use]
pub fn silence_features(window: &ObservationWindow, threshold: u64) -> Vec<f64> {
    let mut out = Vec::with_capacity(SILENCE_FEATURES);
    for c in 0..SAMPLE_COLUMNS {
        let runs: Vec<f64> = silence_runs(&window.counters(c), threshold)
            .into_iter()
            .map(|r| r as f64)
            .collect();
        out.push(mean(&runs));
        out.push(variance(&runs));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::sample::Sample;

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(silence_runs(&[250, 251, 250], 250), vec![1, 1]);
    }

    #[test]
    fn runs_never_exceed_window_length() {
        let column: Vec<u64> = (0..240u64).map(|i| (i * 37) % 600).collect();
        let runs = silence_runs(&column, 250);
        assert!(runs.iter().sum::<usize>() <= column.len());
        assert_eq!(silence_runs(&column, 250), runs);
    }

    #[test]
    fn all_silent_column_is_one_run() {
        assert_eq!(silence_runs(&[0; 12], 250), vec![12]);
    }

    #[test]
    fn constant_260_window_yields_degenerate_zero_features() {
        let w = ObservationWindow {
            index: 0,
            samples: vec![Sample::new(260, 260, 260, 260); 10],
        };
        let f = silence_features(&w, 250);
        assert_eq!(f, vec![0.0; SILENCE_FEATURES]);
    }

    #[test]
    fn mean_and_variance_per_column() {
        // column 0 runs: [2, 1, 3] → mean 2, var 2/3
        let values = [0u64, 0, 900, 10, 900, 0, 0, 0];
        let samples = values.iter().map(|&v| Sample::new(v, 900, 0, 900)).collect();
        let w = ObservationWindow { index: 0, samples };
        let f = silence_features(&w, 256);
        assert!((f[0] - 2.0).abs() < 1e-12);
        assert!((f[1] - 2.0 / 3.0).abs() < 1e-12);
        // column 1 never silent
        assert_eq!(&f[2..4], &[0.0, 0.0]);
        // column 2 silent throughout
        assert!((f[4] - 8.0).abs() < 1e-12);
        assert!(f[5].abs() < 1e-12);
    }
}
