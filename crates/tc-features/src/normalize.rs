use serde::{Deserialize, Serialize};
use tc_core::config::{FeatureConfig, FitMode};
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::matrix::FeatureMatrix;

/// Per-column zero-mean / unit-variance scaling.
///
/// A column with zero variance keeps scale 1 and therefore maps to 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer {
    /// Fit column means and population standard deviations.
    ///
    /// # Errors
    /// `InsufficientData` on an empty matrix.
    pub fn fit(data: &FeatureMatrix) -> PipelineResult<Self> {
        if data.is_empty() {
            return Err(PipelineError::InsufficientData {
                stage: "standardisation",
                needed: 1,
                available: 0,
            });
        }
        let n = data.rows() as f64;
        let mut mean = vec![0.0; data.cols()];
        for row in data.iter_rows() {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; data.cols()];
        for row in data.iter_rows() {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        let scale = var
            .into_iter()
            .map(|s| {
                let sd = (s / n).sqrt();
                if sd > 1e-12 { sd } else { 1.0 }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    /// # Errors
    /// `DataShapeMismatch` if `data` has a different column count than the fit.
    pub fn transform(&self, data: &FeatureMatrix) -> PipelineResult<FeatureMatrix> {
        if data.cols() != self.mean.len() {
            return Err(PipelineError::DataShapeMismatch {
                expected: self.mean.len(),
                found: data.cols(),
            });
        }
        let mut out = data.clone();
        for r in 0..out.rows() {
            for c in 0..out.cols() {
                out.set(r, c, (data.get(r, c) - self.mean[c]) / self.scale[c]);
            }
        }
        Ok(out)
    }
}

/// Linear projection onto the leading principal directions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projector {
    mean: Vec<f64>,
    /// One unit-length direction per component, by decreasing variance.
    components: Vec<Vec<f64>>,
    explained_variance: Vec<f64>,
}

impl Projector {
    /// Fit `n_components` principal directions of `data`.
    ///
    /// Directions are eigenvectors of the covariance matrix, each oriented so
    /// that its largest-magnitude loading is positive.
    ///
    /// # Errors
    /// `Configuration` if `n_components` exceeds `min(rows, cols)` or is zero.
    pub fn fit(data: &FeatureMatrix, n_components: usize) -> PipelineResult<Self> {
        let (rows, cols) = (data.rows(), data.cols());
        if n_components == 0 || n_components > rows.min(cols) {
            return Err(PipelineError::Configuration(format!(
                "{n_components} composantes demandées pour une matrice {rows}×{cols}"
            )));
        }

        let mut mean = vec![0.0; cols];
        for row in data.iter_rows() {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= rows as f64);

        let denom = rows.saturating_sub(1).max(1) as f64;
        let mut cov = vec![0.0; cols * cols];
        for row in data.iter_rows() {
            for i in 0..cols {
                let di = row[i] - mean[i];
                for j in i..cols {
                    cov[i * cols + j] += di * (row[j] - mean[j]);
                }
            }
        }
        for i in 0..cols {
            for j in i..cols {
                let v = cov[i * cols + j] / denom;
                cov[i * cols + j] = v;
                cov[j * cols + i] = v;
            }
        }

        let (values, vectors) = symmetric_eigen(cov, cols);
        let mut order: Vec<usize> = (0..cols).collect();
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));

        let components = order
            .iter()
            .take(n_components)
            .map(|&k| {
                let mut v: Vec<f64> = (0..cols).map(|i| vectors[i * cols + k]).collect();
                let pivot = v
                    .iter()
                    .copied()
                    .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                    .unwrap_or(0.0);
                if pivot < 0.0 {
                    v.iter_mut().for_each(|x| *x = -*x);
                }
                v
            })
            .collect();
        let explained_variance = order
            .iter()
            .take(n_components)
            .map(|&k| values[k].max(0.0))
            .collect();

        Ok(Self {
            mean,
            components,
            explained_variance,
        })
    }

    /// Variance captured by each component.
    #[must_use]
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// # Errors
    /// `DataShapeMismatch` if `data` has a different column count than the fit.
    pub fn transform(&self, data: &FeatureMatrix) -> PipelineResult<FeatureMatrix> {
        if data.cols() != self.mean.len() {
            return Err(PipelineError::DataShapeMismatch {
                expected: self.mean.len(),
                found: data.cols(),
            });
        }
        let mut out = FeatureMatrix::zeros(data.rows(), self.components.len());
        for (r, row) in data.iter_rows().enumerate() {
            for (k, comp) in self.components.iter().enumerate() {
                let dot: f64 = row
                    .iter()
                    .zip(&self.mean)
                    .zip(comp)
                    .map(|((x, m), w)| (x - m) * w)
                    .sum();
                out.set(r, k, dot);
            }
        }
        Ok(out)
    }
}

/// Eigen-decomposition of a symmetric `n × n` row-major matrix by cyclic
/// Jacobi rotations. Returns `(eigenvalues, eigenvectors)`; eigenvector `k` is
/// column `k` of the returned row-major matrix.
fn symmetric_eigen(mut a: Vec<f64>, n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut v = vec![0.0; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i * n + j].powi(2))
            .sum();
        let diag: f64 = (0..n).map(|i| a[i * n + i].powi(2)).sum();
        if off <= 1e-22 * diag.max(1e-300) {
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[p * n + q];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let app = a[p * n + p];
                let aqq = a[q * n + q];
                let theta = (aqq - app) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let values = (0..n).map(|i| a[i * n + i]).collect();
    (values, v)
}

/// Standardized and projected train/test features.
#[derive(Clone, Debug)]
pub struct NormalizedFeatures {
    /// Standardized, pre-projection.
    pub std_train: FeatureMatrix,
    pub std_test: FeatureMatrix,
    /// Projected onto the principal directions.
    pub train: FeatureMatrix,
    pub test: FeatureMatrix,
}

/// Standardizes then projects both splits.
///
/// In [`FitMode::Independent`] each split gets its own scaler and projector;
/// the reference accuracy figures were computed that way. [`FitMode::Shared`]
/// fits on train only and applies that fit to test.
///
/// # Example
/// ```
/// use tc_features::normalize::Normalizer;
/// use tc_core::config::FitMode;
/// use tc_core::matrix::FeatureMatrix;
///
/// let data = FeatureMatrix::from_vec(4, 2, vec![1.0, 2.0, 2.0, 4.1, 3.0, 6.0, 4.0, 7.9]).unwrap();
/// let out = Normalizer::new(1, FitMode::Shared).fit_transform(&data, &data).unwrap();
/// assert_eq!(out.train.cols(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct Normalizer {
    components: usize,
    mode: FitMode,
}

impl Normalizer {
    #[must_use]
    pub fn new(components: usize, mode: FitMode) -> Self {
        Self { components, mode }
    }

    #[must_use]
    pub fn from_config(config: &FeatureConfig) -> Self {
        Self::new(config.pca_components, config.fit_mode)
    }

    /// # Errors
    /// Propagates fit/transform errors (empty split, too many components,
    /// column mismatch between splits).
    pub fn fit_transform(
        &self,
        train: &FeatureMatrix,
        test: &FeatureMatrix,
    ) -> PipelineResult<NormalizedFeatures> {
        let (std_train, std_test) = match self.mode {
            FitMode::Independent => (
                Standardizer::fit(train)?.transform(train)?,
                Standardizer::fit(test)?.transform(test)?,
            ),
            FitMode::Shared => {
                let scaler = Standardizer::fit(train)?;
                (scaler.transform(train)?, scaler.transform(test)?)
            }
        };

        let (projected_train, projected_test) = match self.mode {
            FitMode::Independent => (
                Projector::fit(&std_train, self.components)?.transform(&std_train)?,
                Projector::fit(&std_test, self.components)?.transform(&std_test)?,
            ),
            FitMode::Shared => {
                let projector = Projector::fit(&std_train, self.components)?;
                (
                    projector.transform(&std_train)?,
                    projector.transform(&std_test)?,
                )
            }
        };

        log::debug!(
            "Normalisation {:?} : {}×{} → {}×{}",
            self.mode,
            train.rows(),
            train.cols(),
            projected_train.rows(),
            projected_train.cols()
        );

        Ok(NormalizedFeatures {
            std_train,
            std_test,
            train: projected_train,
            test: projected_test,
        })
    }
}
