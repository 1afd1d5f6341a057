use serde::{Deserialize, Serialize};
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::ClassId;

use crate::labels::{LabelIndex, argmax, check_training_set, check_width};

/// Added to every covariance diagonal so that degenerate classes stay invertible.
const COVARIANCE_RIDGE: f64 = 1e-6;

/// One multivariate normal per class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ClassDensity {
    mean: Vec<f64>,
    /// Lower Cholesky factor of the covariance, row-major `width × width`.
    chol: Vec<f64>,
    /// `−½·ln det Σ`
    half_log_det: f64,
}

impl ClassDensity {
    /// Log-density up to the `−d/2·ln 2π` term shared by every class.
    fn log_density(&self, row: &[f64]) -> f64 {
        let d = self.mean.len();
        // Solve L·z = (x − μ); the Mahalanobis distance is |z|².
        let mut z = vec![0.0; d];
        for i in 0..d {
            let mut acc = row[i] - self.mean[i];
            for k in 0..i {
                acc -= self.chol[i * d + k] * z[k];
            }
            z[i] = acc / self.chol[i * d + i];
        }
        self.half_log_det - 0.5 * z.iter().map(|v| v * v).sum::<f64>()
    }
}

/// Maximum-likelihood classifier: a full-covariance Gaussian fitted to each
/// class, prediction picks the class of highest density (first on ties).
///
/// Covariances are sample covariances (`n − 1`), ridged on the diagonal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianClassifier {
    index: LabelIndex,
    width: usize,
    densities: Vec<ClassDensity>,
}

impl GaussianClassifier {
    /// # Errors
    /// `DataShapeMismatch` or `InsufficientData` on an unusable training set,
    /// `Configuration` if a class covariance is not positive definite.
    pub fn fit(features: &FeatureMatrix, labels: &[ClassId]) -> PipelineResult<Self> {
        check_training_set(features, labels)?;
        let index = LabelIndex::fit(labels);
        let targets = index.encode(labels);
        let d = features.cols();

        let densities = (0..index.len())
            .map(|k| -> PipelineResult<ClassDensity> {
                let rows: Vec<&[f64]> = features
                    .iter_rows()
                    .zip(&targets)
                    .filter(|&(_, &t)| t == k)
                    .map(|(row, _)| row)
                    .collect();
                let n = rows.len() as f64;

                let mut mean = vec![0.0; d];
                for row in &rows {
                    for (m, x) in mean.iter_mut().zip(*row) {
                        *m += x / n;
                    }
                }

                let denom = (n - 1.0).max(1.0);
                let mut cov = vec![0.0; d * d];
                for row in &rows {
                    for i in 0..d {
                        let di = row[i] - mean[i];
                        for j in 0..=i {
                            cov[i * d + j] += di * (row[j] - mean[j]) / denom;
                        }
                    }
                }
                for i in 0..d {
                    cov[i * d + i] += COVARIANCE_RIDGE;
                }

                let chol = cholesky(&cov, d).ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "covariance non définie positive pour la classe {}",
                        index.label(k)
                    ))
                })?;
                let half_log_det = -(0..d).map(|i| chol[i * d + i].ln()).sum::<f64>();
                Ok(ClassDensity {
                    mean,
                    chol,
                    half_log_det,
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(Self {
            index,
            width: d,
            densities,
        })
    }

    /// # Errors
    /// `DataShapeMismatch` if the width differs from the training width.
    pub fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<ClassId>> {
        check_width(features, self.width)?;
        Ok(features
            .iter_rows()
            .map(|row| {
                let scores: Vec<f64> = self.densities.iter().map(|g| g.log_density(row)).collect();
                self.index.label(argmax(&scores))
            })
            .collect())
    }
}

/// Lower Cholesky factor of a symmetric matrix whose lower triangle is filled.
/// `None` if the matrix is not positive definite.
fn cholesky(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Some(l)
}
