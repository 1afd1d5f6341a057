use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tc_core::config::{ClassifierParams, Method};
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::ClassId;
use tc_core::traits::Classifier;

use crate::centroid::NearestCentroid;
use crate::forest::RandomForest;
use crate::gaussian::GaussianClassifier;
use crate::labels::check_training_set;
use crate::mlp::{NetParams, NeuralNet};
use crate::svm::LinearSvm;

/// Artifact name of the silence specialist.
pub const SILENCE_SPECIALIST: &str = "classification_model_svm_silence";

/// The closed set of classifier variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierKind {
    RandomForest,
    LinearSvm,
    NeuralNet,
    NearestCentroid,
    Gaussian,
}

impl ClassifierKind {
    /// Bulk classifier of a classification method.
    #[must_use]
    pub fn for_method(method: Method) -> Self {
        match method {
            Method::Multimethod => Self::RandomForest,
            Method::Svm => Self::LinearSvm,
            Method::NeuralNet => Self::NeuralNet,
            Method::NearestCentroid => Self::NearestCentroid,
            Method::Gaussian => Self::Gaussian,
        }
    }

    /// Default artifact name of the variant.
    #[must_use]
    pub fn artifact_name(self) -> &'static str {
        match self {
            Self::RandomForest => "classification_model_rf",
            Self::LinearSvm => "classification_model_svm",
            Self::NeuralNet => "classification_model",
            Self::NearestCentroid => "classification_model_centroid",
            Self::Gaussian => "classification_model_gaussian",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Fitted {
    Forest(RandomForest),
    Svm(LinearSvm),
    NeuralNet(NeuralNet),
    Centroid(NearestCentroid),
    Gaussian(GaussianClassifier),
}

impl Fitted {
    fn kind(&self) -> ClassifierKind {
        match self {
            Self::Forest(_) => ClassifierKind::RandomForest,
            Self::Svm(_) => ClassifierKind::LinearSvm,
            Self::NeuralNet(_) => ClassifierKind::NeuralNet,
            Self::Centroid(_) => ClassifierKind::NearestCentroid,
            Self::Gaussian(_) => ClassifierKind::Gaussian,
        }
    }
}

/// A classifier variant plus its hyper-parameters and, once trained or
/// loaded, its fitted state.
///
/// # Example
/// ```
/// use tc_classify::model::{ClassifierKind, Model};
/// use tc_core::config::ClassifierParams;
/// use tc_core::matrix::FeatureMatrix;
/// use tc_core::traits::Classifier;
///
/// let mut model = Model::new(ClassifierKind::NearestCentroid, ClassifierParams::default(), 0);
/// let x = FeatureMatrix::from_rows(&[vec![0.0], vec![10.0]]).unwrap();
/// model.train(&x, &[1, 2]).unwrap();
/// assert_eq!(model.predict(&x).unwrap(), vec![1, 2]);
/// ```
#[derive(Clone, Debug)]
pub struct Model {
    kind: ClassifierKind,
    name: String,
    params: ClassifierParams,
    seed: u64,
    fitted: Option<Fitted>,
}

impl Model {
    /// Unfit model named after its variant.
    #[must_use]
    pub fn new(kind: ClassifierKind, params: ClassifierParams, seed: u64) -> Self {
        Self::named(kind, kind.artifact_name(), params, seed)
    }

    #[must_use]
    pub fn named(
        kind: ClassifierKind,
        name: impl Into<String>,
        params: ClassifierParams,
        seed: u64,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            params,
            seed,
            fitted: None,
        }
    }

    /// Linear SVM stored as [`SILENCE_SPECIALIST`].
    #[must_use]
    pub fn silence_specialist(params: ClassifierParams, seed: u64) -> Self {
        Self::named(ClassifierKind::LinearSvm, SILENCE_SPECIALIST, params, seed)
    }

    #[must_use]
    pub fn kind(&self) -> ClassifierKind {
        self.kind
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// `<dir>/<name>.bin`
    #[must_use]
    pub fn artifact_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.bin", self.name))
    }

    fn not_available(&self) -> PipelineError {
        PipelineError::ModelNotAvailable {
            name: self.name.clone(),
        }
    }
}

impl Classifier for Model {
    fn name(&self) -> &str {
        &self.name
    }

    fn train(&mut self, features: &FeatureMatrix, labels: &[ClassId]) -> PipelineResult<()> {
        check_training_set(features, labels)?;
        let p = &self.params;
        let fitted = match self.kind {
            ClassifierKind::RandomForest => Fitted::Forest(RandomForest::fit(
                features,
                labels,
                p.forest_trees,
                p.forest_max_depth,
                self.seed,
            )?),
            ClassifierKind::LinearSvm => Fitted::Svm(LinearSvm::fit(
                features,
                labels,
                p.svm_lambda,
                p.svm_epochs,
                self.seed,
            )?),
            ClassifierKind::NeuralNet => Fitted::NeuralNet(NeuralNet::fit(
                features,
                labels,
                &NetParams {
                    hidden: p.nn_hidden,
                    alpha: p.nn_alpha,
                    epochs: p.nn_epochs,
                    learning_rate: p.nn_learning_rate,
                    seed: self.seed,
                },
            )?),
            ClassifierKind::NearestCentroid => {
                Fitted::Centroid(NearestCentroid::fit(features, labels)?)
            }
            ClassifierKind::Gaussian => Fitted::Gaussian(GaussianClassifier::fit(features, labels)?),
        };
        log::info!(
            "{} entraîné sur {} lignes × {} colonnes",
            self.name,
            features.rows(),
            features.cols()
        );
        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<ClassId>> {
        match &self.fitted {
            None => Err(self.not_available()),
            Some(Fitted::Forest(m)) => m.predict(features),
            Some(Fitted::Svm(m)) => m.predict(features),
            Some(Fitted::NeuralNet(m)) => m.predict(features),
            Some(Fitted::Centroid(m)) => m.predict(features),
            Some(Fitted::Gaussian(m)) => m.predict(features),
        }
    }

    fn persist(&self, dir: &Path) -> Result<()> {
        let fitted = self.fitted.as_ref().ok_or_else(|| self.not_available())?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create model directory: {}", dir.display()))?;
        let path = self.artifact_path(dir);
        let bytes = bincode::serialize(fitted)
            .with_context(|| format!("Cannot serialize model {}", self.name))?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Cannot write model: {}", path.display()))?;
        log::info!("Modèle sauvegardé : {}", path.display());
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> Result<()> {
        let path = self.artifact_path(dir);
        if !path.exists() {
            return Err(anyhow::Error::new(self.not_available())
                .context(format!("Missing model artifact: {}", path.display())));
        }
        let bytes =
            std::fs::read(&path).with_context(|| format!("Cannot read model: {}", path.display()))?;
        let fitted: Fitted = bincode::deserialize(&bytes)
            .with_context(|| format!("Corrupt model artifact: {}", path.display()))?;
        if fitted.kind() != self.kind {
            bail!(
                "{} contient un modèle {:?}, {:?} attendu",
                path.display(),
                fitted.kind(),
                self.kind
            );
        }
        log::debug!("Modèle chargé : {}", path.display());
        self.fitted = Some(fitted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (FeatureMatrix, Vec<ClassId>) {
        let rows: Vec<Vec<f64>> = (0..24)
            .map(|i| {
                let c = f64::from(i % 3);
                vec![c * 5.0 + f64::from(i % 4) * 0.1, -c * 3.0]
            })
            .collect();
        let labels = (0..24).map(|i| [2, 13, 20][i % 3]).collect();
        (FeatureMatrix::from_rows(&rows).expect("uniform"), labels)
    }

    fn small_params() -> ClassifierParams {
        ClassifierParams {
            nn_hidden: 8,
            nn_epochs: 50,
            ..ClassifierParams::default()
        }
    }

    #[test]
    fn unfit_model_is_not_available() {
        let model = Model::new(ClassifierKind::RandomForest, small_params(), 0);
        assert!(matches!(
            model.predict(&FeatureMatrix::zeros(1, 2)),
            Err(PipelineError::ModelNotAvailable { .. })
        ));
    }

    #[test]
    fn artifact_names_follow_the_variant() {
        let model = Model::new(ClassifierKind::NeuralNet, small_params(), 0);
        assert_eq!(model.name(), "classification_model");
        let specialist = Model::silence_specialist(small_params(), 0);
        assert_eq!(specialist.name(), SILENCE_SPECIALIST);
        assert_eq!(specialist.kind(), ClassifierKind::LinearSvm);
    }

    #[test]
    fn persisted_model_predicts_identically_after_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (x, y) = data();
        for kind in [
            ClassifierKind::RandomForest,
            ClassifierKind::LinearSvm,
            ClassifierKind::NeuralNet,
            ClassifierKind::NearestCentroid,
            ClassifierKind::Gaussian,
        ] {
            let mut trained = Model::new(kind, small_params(), 1);
            trained.train(&x, &y).expect("train");
            trained.persist(dir.path()).expect("persist");

            let mut loaded = Model::new(kind, small_params(), 1);
            loaded.load(dir.path()).expect("load");
            assert_eq!(
                loaded.predict(&x).expect("predict"),
                trained.predict(&x).expect("predict"),
                "{kind:?}"
            );
        }
    }

    #[test]
    fn missing_artifact_fails_fast() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut model = Model::new(ClassifierKind::LinearSvm, small_params(), 0);
        let err = model.load(dir.path()).expect_err("nothing persisted");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ModelNotAvailable { .. })
        ));
    }

    #[test]
    fn persisting_an_unfit_model_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model = Model::new(ClassifierKind::NearestCentroid, small_params(), 0);
        assert!(model.persist(dir.path()).is_err());
    }

    #[test]
    fn kind_mismatch_on_load_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (x, y) = data();
        let mut forest = Model::named(ClassifierKind::RandomForest, "shared", small_params(), 0);
        forest.train(&x, &y).expect("train");
        forest.persist(dir.path()).expect("persist");
        let mut svm = Model::named(ClassifierKind::LinearSvm, "shared", small_params(), 0);
        assert!(svm.load(dir.path()).is_err());
    }
}
