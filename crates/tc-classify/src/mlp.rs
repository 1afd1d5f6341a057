use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tc_core::error::PipelineResult;
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::ClassId;

use crate::labels::{LabelIndex, argmax, check_training_set, check_width};

/// Training hyper-parameters of [`NeuralNet`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetParams {
    pub hidden: usize,
    /// L2 penalty, spread over the training set.
    pub alpha: f64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

/// Single hidden layer perceptron: ReLU hidden units, softmax output,
/// cross-entropy loss, plain SGD with L2 weight decay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeuralNet {
    index: LabelIndex,
    width: usize,
    hidden: usize,
    /// `hidden × width`, row-major.
    w1: Vec<f64>,
    b1: Vec<f64>,
    /// `classes × hidden`, row-major.
    w2: Vec<f64>,
    b2: Vec<f64>,
}

impl NeuralNet {
    /// # Errors
    /// `DataShapeMismatch` or `InsufficientData` on an unusable training set.
    pub fn fit(
        features: &FeatureMatrix,
        labels: &[ClassId],
        params: &NetParams,
    ) -> PipelineResult<Self> {
        check_training_set(features, labels)?;
        let index = LabelIndex::fit(labels);
        let targets = index.encode(labels);
        let width = features.cols();
        let hidden = params.hidden.max(1);
        let classes = index.len();
        let mut rng = StdRng::seed_from_u64(params.seed);

        // Glorot uniform
        let limit1 = (6.0 / (width + hidden) as f64).sqrt();
        let limit2 = (6.0 / (hidden + classes) as f64).sqrt();
        let mut net = Self {
            w1: (0..hidden * width).map(|_| rng.gen_range(-limit1..=limit1)).collect(),
            b1: vec![0.0; hidden],
            w2: (0..classes * hidden).map(|_| rng.gen_range(-limit2..=limit2)).collect(),
            b2: vec![0.0; classes],
            index,
            width,
            hidden,
        };

        let n = features.rows();
        let decay = params.alpha / n as f64;
        let mut order: Vec<usize> = (0..n).collect();
        let mut h = vec![0.0; hidden];
        let mut out = vec![0.0; classes];
        let mut dh = vec![0.0; hidden];

        for epoch in 0..params.epochs.max(1) {
            // Inverse-scaling schedule keeps late epochs from oscillating.
            let lr = params.learning_rate / (1.0 + epoch as f64 / 50.0);
            order.shuffle(&mut rng);
            for &r in &order {
                let x = features.row(r);
                net.forward(x, &mut h, &mut out);

                // Softmax cross-entropy gradient w.r.t. logits.
                out[targets[r]] -= 1.0;

                dh.fill(0.0);
                for k in 0..classes {
                    let g = out[k];
                    let row = &mut net.w2[k * hidden..(k + 1) * hidden];
                    for j in 0..hidden {
                        dh[j] += g * row[j];
                        row[j] -= lr * (g * h[j] + decay * row[j]);
                    }
                    net.b2[k] -= lr * g;
                }
                for j in 0..hidden {
                    if h[j] <= 0.0 {
                        continue;
                    }
                    let row = &mut net.w1[j * width..(j + 1) * width];
                    for (w, xi) in row.iter_mut().zip(x) {
                        *w -= lr * (dh[j] * xi + decay * *w);
                    }
                    net.b1[j] -= lr * dh[j];
                }
            }
        }

        Ok(net)
    }

    /// Hidden activations into `h`, class probabilities into `out`.
    fn forward(&self, x: &[f64], h: &mut [f64], out: &mut [f64]) {
        for (j, hj) in h.iter_mut().enumerate() {
            let row = &self.w1[j * self.width..(j + 1) * self.width];
            let z: f64 = row.iter().zip(x).map(|(w, xi)| w * xi).sum::<f64>() + self.b1[j];
            *hj = z.max(0.0);
        }
        for (k, ok) in out.iter_mut().enumerate() {
            let row = &self.w2[k * self.hidden..(k + 1) * self.hidden];
            *ok = row.iter().zip(h.iter()).map(|(w, hj)| w * hj).sum::<f64>() + self.b2[k];
        }
        let max = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut total = 0.0;
        for o in out.iter_mut() {
            *o = (*o - max).exp();
            total += *o;
        }
        out.iter_mut().for_each(|o| *o /= total);
    }

    /// # Errors
    /// `DataShapeMismatch` if the width differs from the training width.
    pub fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<ClassId>> {
        check_width(features, self.width)?;
        let mut h = vec![0.0; self.hidden];
        let mut out = vec![0.0; self.index.len()];
        Ok(features
            .iter_rows()
            .map(|row| {
                self.forward(row, &mut h, &mut out);
                self.index.label(argmax(&out))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NetParams {
        NetParams {
            hidden: 16,
            alpha: 1e-4,
            epochs: 200,
            learning_rate: 0.05,
            seed: 0,
        }
    }

    #[test]
    fn learns_xor() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..10 {
            for (a, b) in [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)] {
                rows.push(vec![a * 2.0 - 1.0, b * 2.0 - 1.0]);
                labels.push(u32::from(a != b));
            }
        }
        let x = FeatureMatrix::from_rows(&rows).expect("uniform");
        let net = NeuralNet::fit(&x, &labels, &params()).expect("fit");
        assert_eq!(net.predict(&x).expect("predict"), labels);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let x = FeatureMatrix::from_rows(&[vec![0.5, -1.0], vec![2.0, 3.0]]).expect("uniform");
        let net = NeuralNet::fit(&x, &[4, 7], &params()).expect("fit");
        let mut h = vec![0.0; 16];
        let mut out = vec![0.0; 2];
        net.forward(&[0.3, 0.3], &mut h, &mut out);
        assert!((out.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn labels_keep_their_ids() {
        let x = FeatureMatrix::from_rows(&[vec![-1.0], vec![-1.2], vec![1.0], vec![1.3]])
            .expect("uniform");
        let net = NeuralNet::fit(&x, &[13, 13, 31, 31], &params()).expect("fit");
        assert_eq!(net.predict(&x).expect("predict"), vec![13, 13, 31, 31]);
    }
}
