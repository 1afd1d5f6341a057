use std::path::Path;

use crate::error::PipelineResult;
use crate::matrix::FeatureMatrix;
use crate::sample::ClassId;

/// Opaque classifier capability.
///
/// The pipeline never looks inside a model: it trains it, asks it for labels,
/// and persists or reloads it by artifact name. `predict` on a classifier that
/// was neither trained nor loaded fails with `ModelNotAvailable`.
///
/// # Example
/// ```
/// use std::path::Path;
/// use tc_core::traits::Classifier;
/// use tc_core::matrix::FeatureMatrix;
/// use tc_core::error::PipelineResult;
///
/// struct AlwaysZero;
/// impl Classifier for AlwaysZero {
///     fn name(&self) -> &str { "zero" }
///     fn train(&mut self, _f: &FeatureMatrix, _l: &[u32]) -> PipelineResult<()> { Ok(()) }
///     fn predict(&self, f: &FeatureMatrix) -> PipelineResult<Vec<u32>> { Ok(vec![0; f.rows()]) }
///     fn persist(&self, _dir: &Path) -> anyhow::Result<()> { Ok(()) }
///     fn load(&mut self, _dir: &Path) -> anyhow::Result<()> { Ok(()) }
/// }
/// ```
pub trait Classifier {
    /// Artifact name used by `persist`/`load`.
    fn name(&self) -> &str;

    /// Fit on `features` (one row per window) with one label per row.
    ///
    /// # Errors
    /// `DataShapeMismatch` if row and label counts differ, `InsufficientData`
    /// if there is nothing to learn from.
    fn train(&mut self, features: &FeatureMatrix, labels: &[ClassId]) -> PipelineResult<()>;

    /// One label per row of `features`.
    ///
    /// # Errors
    /// `ModelNotAvailable` if the model was neither trained nor loaded.
    fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<ClassId>>;

    /// Write the fitted model under `dir`, overwriting any previous artifact.
    ///
    /// # Errors
    /// Returns an error if the model is unfit or the file cannot be written.
    fn persist(&self, dir: &Path) -> anyhow::Result<()>;

    /// Replace the model with the artifact stored under `dir`.
    ///
    /// # Errors
    /// Fails fast (`ModelNotAvailable`) when the artifact is absent.
    fn load(&mut self, dir: &Path) -> anyhow::Result<()>;
}
