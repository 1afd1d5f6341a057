use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tc_core::config::FeatureConfig;
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::SAMPLE_COLUMNS;

use crate::scalogram::Scalogram;
use crate::segment::ObservationWindow;
use crate::silence::{SILENCE_FEATURES, silence_features};
use crate::stats::{STAT_FEATURES, statistical_features};

/// Column ranges of the three feature families in a concatenated vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub stats: Range<usize>,
    pub silence: Range<usize>,
    pub scalogram: Range<usize>,
}

impl FeatureLayout {
    #[must_use]
    pub fn new(n_scales: usize) -> Self {
        let silence_end = STAT_FEATURES + SILENCE_FEATURES;
        Self {
            stats: 0..STAT_FEATURES,
            silence: STAT_FEATURES..silence_end,
            scalogram: silence_end..silence_end + n_scales * SAMPLE_COLUMNS,
        }
    }

    /// Total feature vector length.
    #[must_use]
    pub fn width(&self) -> usize {
        self.scalogram.end
    }
}

/// The three feature families of a set of windows, one row per window.
#[derive(Clone, Debug, Default)]
pub struct ExtractedFeatures {
    pub stats: FeatureMatrix,
    pub silence: FeatureMatrix,
    pub scalogram: FeatureMatrix,
}

impl ExtractedFeatures {
    #[must_use]
    pub fn rows(&self) -> usize {
        self.stats.rows()
    }

    /// Keep the first `n` windows of every family.
    pub fn truncate_rows(&mut self, n: usize) {
        self.stats.truncate_rows(n);
        self.silence.truncate_rows(n);
        self.scalogram.truncate_rows(n);
    }

    /// Concatenate the families column-wise: `[stats | silence | scalogram]`.
    ///
    /// # Errors
    /// `DataShapeMismatch` if the families disagree on row count.
    pub fn concat(&self) -> PipelineResult<FeatureMatrix> {
        FeatureMatrix::hstack(&[&self.stats, &self.silence, &self.scalogram])
    }
}

/// Computes statistical, silence-run and scalogram features per window.
///
/// Train and test windows go through the same extractor so both splits share
/// the same parameters. Windows are processed in parallel; row order always
/// follows window order.
///
/// # Example
/// ```
/// use tc_features::extract::FeatureExtractor;
/// use tc_features::segment::ObservationWindow;
/// use tc_core::sample::Sample;
///
/// let extractor = FeatureExtractor::new(250, vec![2, 4]);
/// let windows = vec![ObservationWindow { index: 0, samples: vec![Sample::default(); 16] }];
/// let features = extractor.extract(&windows).unwrap();
/// assert_eq!(features.concat().unwrap().cols(), extractor.layout().width());
/// ```
#[derive(Clone, Debug)]
pub struct FeatureExtractor {
    silence_threshold: u64,
    scales: Vec<usize>,
}

impl FeatureExtractor {
    #[must_use]
    pub fn new(silence_threshold: u64, scales: Vec<usize>) -> Self {
        Self {
            silence_threshold,
            scales,
        }
    }

    #[must_use]
    pub fn from_config(config: &FeatureConfig) -> Self {
        Self::new(config.silence_threshold, config.scalogram_scales.clone())
    }

    #[must_use]
    pub fn layout(&self) -> FeatureLayout {
        FeatureLayout::new(self.scales.len())
    }

    /// Statistical block, one row per window.
    ///
    /// # Errors
    /// `DataShapeMismatch` if windows differ in length.
    pub fn statistical(&self, windows: &[ObservationWindow]) -> PipelineResult<FeatureMatrix> {
        let rows: Vec<Vec<f64>> = windows.par_iter().map(statistical_features).collect();
        stack(rows, STAT_FEATURES)
    }

    /// Silence-run block, one row per window.
    ///
    /// # Errors
    /// `DataShapeMismatch` if a row has an unexpected width.
    pub fn silence(&self, windows: &[ObservationWindow]) -> PipelineResult<FeatureMatrix> {
        let threshold = self.silence_threshold;
        let rows: Vec<Vec<f64>> = windows
            .par_iter()
            .map(|w| silence_features(w, threshold))
            .collect();
        stack(rows, SILENCE_FEATURES)
    }

    /// Scalogram block: for each column, one energy per scale.
    ///
    /// # Errors
    /// `DataShapeMismatch` if windows differ in length, `Configuration` on an
    /// invalid scale set.
    pub fn scalogram(&self, windows: &[ObservationWindow]) -> PipelineResult<FeatureMatrix> {
        let width = self.scales.len() * SAMPLE_COLUMNS;
        let Some(first) = windows.first() else {
            return Ok(FeatureMatrix::with_cols(width));
        };
        let len = first.len();
        if let Some(w) = windows.iter().find(|w| w.len() != len) {
            return Err(PipelineError::DataShapeMismatch {
                expected: len,
                found: w.len(),
            });
        }
        // Validates scales once; each worker then builds its own copy.
        Scalogram::new(len, &self.scales)?;

        let rows = windows
            .par_iter()
            .map_init(
                || Scalogram::new(len, &self.scales),
                |scalo, w| -> PipelineResult<Vec<f64>> {
                    let scalo = scalo.as_mut().map_err(|e| e.clone())?;
                    let mut row = Vec::with_capacity(width);
                    for column in w.columns() {
                        row.extend(scalo.energies(&column)?);
                    }
                    Ok(row)
                },
            )
            .collect::<PipelineResult<Vec<Vec<f64>>>>()?;
        stack(rows, width)
    }

    /// All three families.
    ///
    /// # Errors
    /// Propagates the first family's error.
    pub fn extract(&self, windows: &[ObservationWindow]) -> PipelineResult<ExtractedFeatures> {
        Ok(ExtractedFeatures {
            stats: self.statistical(windows)?,
            silence: self.silence(windows)?,
            scalogram: self.scalogram(windows)?,
        })
    }
}

fn stack(rows: Vec<Vec<f64>>, cols: usize) -> PipelineResult<FeatureMatrix> {
    let mut m = FeatureMatrix::with_cols(cols);
    for row in rows {
        m.push_row(&row)?;
    }
    Ok(m)
}
