use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tc_core::error::PipelineResult;
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::ClassId;

use crate::labels::{LabelIndex, argmax, check_training_set, check_width};

/// One-vs-rest linear SVM trained with Pegasos sub-gradient steps.
///
/// Each class gets a weight vector whose last entry is the bias (inputs are
/// augmented with a constant 1). Prediction picks the highest margin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    index: LabelIndex,
    width: usize,
    weights: Vec<Vec<f64>>,
}

impl LinearSvm {
    /// # Errors
    /// `DataShapeMismatch` or `InsufficientData` on an unusable training set.
    pub fn fit(
        features: &FeatureMatrix,
        labels: &[ClassId],
        lambda: f64,
        epochs: usize,
        seed: u64,
    ) -> PipelineResult<Self> {
        check_training_set(features, labels)?;
        let index = LabelIndex::fit(labels);
        let targets = index.encode(labels);
        let width = features.cols();
        let lambda = lambda.max(1e-12);

        let mut weights = Vec::with_capacity(index.len());
        for class in 0..index.len() {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(class as u64));
            let mut w = vec![0.0; width + 1];
            let mut order: Vec<usize> = (0..features.rows()).collect();
            let mut t = 0.0f64;

            for _ in 0..epochs.max(1) {
                order.shuffle(&mut rng);
                for &r in &order {
                    t += 1.0;
                    let eta = 1.0 / (lambda * t);
                    let y = if targets[r] == class { 1.0 } else { -1.0 };
                    let row = features.row(r);
                    let margin = y * score(&w, row);

                    let shrink = 1.0 - eta * lambda;
                    w.iter_mut().for_each(|x| *x *= shrink);
                    if margin < 1.0 {
                        for (wi, xi) in w.iter_mut().zip(row) {
                            *wi += eta * y * xi;
                        }
                        w[width] += eta * y;
                    }
                }
            }
            weights.push(w);
        }

        Ok(Self {
            index,
            width,
            weights,
        })
    }

    /// # Errors
    /// `DataShapeMismatch` if the width differs from the training width.
    pub fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<ClassId>> {
        check_width(features, self.width)?;
        Ok(features
            .iter_rows()
            .map(|row| {
                let scores: Vec<f64> = self.weights.iter().map(|w| score(w, row)).collect();
                self.index.label(argmax(&scores))
            })
            .collect())
    }
}

#[inline]
fn score(w: &[f64], row: &[f64]) -> f64 {
    let bias = w[row.len()];
    row.iter().zip(w).map(|(x, wi)| x * wi).sum::<f64>() + bias
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linearly_separable_classes() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let d = f64::from(i) * 0.05;
            rows.push(vec![-2.0 - d, 0.5 + d]);
            labels.push(0);
            rows.push(vec![2.0 + d, -0.5 - d]);
            labels.push(1);
            rows.push(vec![0.1 + d, 4.0 + d]);
            labels.push(2);
        }
        let x = FeatureMatrix::from_rows(&rows).expect("uniform");
        let svm = LinearSvm::fit(&x, &labels, 1e-3, 50, 0).expect("fit");
        let predicted = svm.predict(&x).expect("predict");
        let correct = predicted.iter().zip(&labels).filter(|(p, t)| p == t).count();
        assert!(correct >= 57, "{correct}/60");
    }

    #[test]
    fn deterministic_for_a_seed() {
        let x = FeatureMatrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0], vec![3.0]])
            .expect("uniform");
        let y = [0, 0, 1, 1];
        let a = LinearSvm::fit(&x, &y, 0.01, 10, 3).expect("fit");
        let b = LinearSvm::fit(&x, &y, 0.01, 10, 3).expect("fit");
        assert_eq!(a, b);
    }
}
