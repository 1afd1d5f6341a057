use serde::{Deserialize, Serialize};
use tc_core::error::PipelineResult;
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::ClassId;

use crate::labels::{LabelIndex, check_training_set, check_width};

/// Assigns each row to the class whose training mean is closest (Euclidean).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroid {
    index: LabelIndex,
    width: usize,
    centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    /// # Errors
    /// `DataShapeMismatch` or `InsufficientData` on an unusable training set.
    pub fn fit(features: &FeatureMatrix, labels: &[ClassId]) -> PipelineResult<Self> {
        check_training_set(features, labels)?;
        let index = LabelIndex::fit(labels);
        let width = features.cols();
        let mut sums = vec![vec![0.0; width]; index.len()];
        let mut counts = vec![0usize; index.len()];

        for (row, &target) in features.iter_rows().zip(&index.encode(labels)) {
            counts[target] += 1;
            for (s, x) in sums[target].iter_mut().zip(row) {
                *s += x;
            }
        }
        for (sum, &n) in sums.iter_mut().zip(&counts) {
            sum.iter_mut().for_each(|s| *s /= n.max(1) as f64);
        }

        Ok(Self {
            index,
            width,
            centroids: sums,
        })
    }

    /// # Errors
    /// `DataShapeMismatch` if the width differs from the training width.
    pub fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<ClassId>> {
        check_width(features, self.width)?;
        Ok(features
            .iter_rows()
            .map(|row| {
                let mut best = (0, f64::INFINITY);
                for (k, c) in self.centroids.iter().enumerate() {
                    let d: f64 = row.iter().zip(c).map(|(x, m)| (x - m).powi(2)).sum();
                    if d < best.1 {
                        best = (k, d);
                    }
                }
                self.index.label(best.0)
            })
            .collect())
    }
}
