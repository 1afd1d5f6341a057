use serde::{Deserialize, Serialize};
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::ClassId;

/// Dense index of the class ids seen during training.
///
/// Classifiers work on `0..len()`; class ids may be sparse.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelIndex {
    classes: Vec<ClassId>,
}

impl LabelIndex {
    /// Sorted distinct ids of `labels`.
    #[must_use]
    pub fn fit(labels: &[ClassId]) -> Self {
        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, label: ClassId) -> Option<usize> {
        self.classes.binary_search(&label).ok()
    }

    /// Class id at dense position `idx`.
    #[must_use]
    pub fn label(&self, idx: usize) -> ClassId {
        self.classes[idx]
    }

    /// Dense positions of `labels`; every label must have been seen by `fit`.
    #[must_use]
    pub fn encode(&self, labels: &[ClassId]) -> Vec<usize> {
        labels.iter().filter_map(|&l| self.index_of(l)).collect()
    }
}

/// Reject a training set with no rows or with one label count per row violated.
pub(crate) fn check_training_set(features: &FeatureMatrix, labels: &[ClassId]) -> PipelineResult<()> {
    if features.rows() != labels.len() {
        return Err(PipelineError::DataShapeMismatch {
            expected: features.rows(),
            found: labels.len(),
        });
    }
    if features.is_empty() {
        return Err(PipelineError::InsufficientData {
            stage: "entraînement",
            needed: 1,
            available: 0,
        });
    }
    Ok(())
}

/// Reject prediction input whose width differs from the training width.
pub(crate) fn check_width(features: &FeatureMatrix, expected: usize) -> PipelineResult<()> {
    if features.cols() != expected {
        return Err(PipelineError::DataShapeMismatch {
            expected,
            found: features.cols(),
        });
    }
    Ok(())
}

/// Position of the largest value, first one on ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_ids_map_to_dense_positions() {
        let index = LabelIndex::fit(&[13, 2, 13, 31, 2]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.index_of(13), Some(1));
        assert_eq!(index.label(2), 31);
        assert_eq!(index.encode(&[31, 2]), vec![2, 0]);
        assert_eq!(index.index_of(5), None);
    }

    #[test]
    fn argmax_keeps_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }

    #[test]
    fn training_set_shape_is_checked() {
        let m = FeatureMatrix::zeros(3, 2);
        assert!(check_training_set(&m, &[0, 1]).is_err());
        assert!(check_training_set(&FeatureMatrix::with_cols(2), &[]).is_err());
        assert!(check_training_set(&m, &[0, 1, 1]).is_ok());
    }
}
