use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::sample::{ClassId, MAX_CLASS_ID, TrafficClass};

/// Scales of the base scalogram set.
pub const BASE_SCALES: [usize; 5] = [2, 4, 8, 16, 32];

/// Scales used when profiling for training (base set extended to 256).
pub const EXTENDED_SCALES: [usize; 8] = [2, 4, 8, 16, 32, 64, 128, 256];

/// Complete pipeline configuration.
///
/// Replaces every module-level threshold and path: each component receives
/// the section it needs at construction. Serializable to TOML; every field has
/// a sane default.
///
/// # Example
/// ```
/// use tc_core::config::PipelineConfig;
/// let config = PipelineConfig::default();
/// assert_eq!(config.window.obs_window, 240);
/// assert_eq!(config.window.slide_window, 40);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    pub features: FeatureConfig,
    pub smoothing: SmoothingConfig,
    pub ensemble: EnsembleConfig,
    pub classifier: ClassifierParams,
    pub evaluation: EvaluationConfig,
    pub paths: PathsConfig,
    /// Traffic classes, in stacking order. Fixed for the whole run.
    pub classes: Vec<ClassSpec>,
}

/// Observation-window segmentation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Samples per observation window.
    pub obs_window: usize,
    /// Step between consecutive windows. Must divide `obs_window`.
    pub slide_window: usize,
    /// Fraction of windows assigned to the train split, in (0, 1).
    pub train_fraction: f64,
    /// Random permutation of windows instead of index order.
    pub random_split: bool,
    /// Seed for the random split and for model training.
    pub seed: Option<u64>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            obs_window: 240,
            slide_window: 40,
            train_fraction: 0.5,
            random_split: false,
            seed: None,
        }
    }
}

/// How the normalizer/projector is fit on the two splits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum FitMode {
    /// Train and test are each standardized and projected with their own fit.
    /// Reproduces the reference accuracy figures.
    #[default]
    Independent,
    /// Fit on train, transform both splits with that fit.
    Shared,
}

/// Feature extraction.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FeatureConfig {
    /// A sample at or below this value counts as silent.
    pub silence_threshold: u64,
    /// Scale factors of the scalogram.
    pub scalogram_scales: Vec<usize>,
    /// Principal directions kept by the projector.
    pub pca_components: usize,
    pub fit_mode: FitMode,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 250,
            scalogram_scales: EXTENDED_SCALES.to_vec(),
            pca_components: 3,
            fit_mode: FitMode::Independent,
        }
    }
}

/// Temporal majority-vote smoothing.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SmoothingConfig {
    /// Labels per vote chunk.
    pub window: usize,
    /// Majority fraction that must be exceeded to rewrite a chunk.
    pub threshold: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 40,
            threshold: 0.60,
        }
    }
}

/// Bulk classification method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Method {
    /// Random forest, smoothed, with the silence specialist override.
    #[default]
    Multimethod,
    /// Linear SVM, smoothed.
    Svm,
    /// Neural network, smoothed.
    NeuralNet,
    /// Nearest class centroid, smoothed.
    NearestCentroid,
    /// Per-class multivariate normal, smoothed.
    Gaussian,
}

impl Method {
    /// Map the CLI index (0=multimethod, 1=SVM, 2=neural network, 3=centroid, 4=gaussian).
    ///
    /// # Errors
    /// `Configuration` for an unknown index.
    pub fn from_index(index: u8) -> PipelineResult<Self> {
        match index {
            0 => Ok(Self::Multimethod),
            1 => Ok(Self::Svm),
            2 => Ok(Self::NeuralNet),
            3 => Ok(Self::NearestCentroid),
            4 => Ok(Self::Gaussian),
            other => Err(PipelineError::Configuration(format!(
                "méthode de classification inconnue : {other}"
            ))),
        }
    }
}

/// Fusion policy between the bulk classifier and the silence specialist.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EnsembleConfig {
    pub method: Method,
    /// Smallest smoothed label that hands a window to the silence specialist.
    pub override_label_min: ClassId,
    /// Largest such label (inclusive). `None` = unbounded.
    pub override_label_max: Option<ClassId>,
    /// Feature columns `[start, end)` fed to the silence specialist.
    /// `None` = the silence block of the feature layout.
    pub silence_columns: Option<(usize, usize)>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            method: Method::Multimethod,
            override_label_min: 13,
            override_label_max: None,
            silence_columns: None,
        }
    }
}

impl EnsembleConfig {
    /// `true` if a smoothed label falls in the override range.
    #[inline]
    #[must_use]
    pub fn is_override_candidate(&self, label: ClassId) -> bool {
        label >= self.override_label_min && self.override_label_max.is_none_or(|max| label <= max)
    }

    /// Configured silence columns as a range.
    #[must_use]
    pub fn silence_range(&self) -> Option<Range<usize>> {
        self.silence_columns.map(|(start, end)| start..end)
    }
}

/// Hyper-parameters of the concrete classifier variants.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ClassifierParams {
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    /// Pegasos regularisation strength.
    pub svm_lambda: f64,
    pub svm_epochs: usize,
    pub nn_hidden: usize,
    /// L2 penalty.
    pub nn_alpha: f64,
    pub nn_epochs: usize,
    pub nn_learning_rate: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            forest_trees: 10,
            forest_max_depth: 2,
            svm_lambda: 1e-3,
            svm_epochs: 50,
            nn_hidden: 64,
            nn_alpha: 0.1,
            nn_epochs: 300,
            nn_learning_rate: 0.05,
        }
    }
}

/// Binary scoring split.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EvaluationConfig {
    pub split_low: ClassId,
    pub split_high: ClassId,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            split_low: 13,
            split_high: 31,
        }
    }
}

/// On-disk locations.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory holding persisted models.
    pub model_dir: PathBuf,
    /// Profiled-feature cache file.
    pub cache: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("classification-model"),
            cache: PathBuf::from("profiled-data/input_data.bin"),
        }
    }
}

/// A configured class and its dataset file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ClassSpec {
    pub id: ClassId,
    pub name: String,
    pub dataset: PathBuf,
}

impl ClassSpec {
    #[must_use]
    pub fn traffic_class(&self) -> TrafficClass {
        TrafficClass::new(self.id, self.name.clone())
    }
}

impl PipelineConfig {
    /// Reject inconsistent values.
    ///
    /// # Errors
    /// `Configuration` naming the first offending field.
    pub fn validate(&self) -> PipelineResult<()> {
        let w = &self.window;
        if w.slide_window == 0 || w.obs_window == 0 {
            return Err(PipelineError::Configuration(
                "obs_window et slide_window doivent être > 0".into(),
            ));
        }
        if w.obs_window % w.slide_window != 0 {
            return Err(PipelineError::Configuration(format!(
                "obs_window ({}) doit être un multiple de slide_window ({})",
                w.obs_window, w.slide_window
            )));
        }
        if !(w.train_fraction > 0.0 && w.train_fraction < 1.0) {
            return Err(PipelineError::Configuration(format!(
                "train_fraction hors de ]0, 1[ : {}",
                w.train_fraction
            )));
        }
        let f = &self.features;
        if f.scalogram_scales.is_empty() || f.scalogram_scales.contains(&0) {
            return Err(PipelineError::Configuration(
                "scalogram_scales doit être non vide et sans zéro".into(),
            ));
        }
        if f.pca_components == 0 {
            return Err(PipelineError::Configuration(
                "pca_components doit être > 0".into(),
            ));
        }
        let s = &self.smoothing;
        if s.window == 0 {
            return Err(PipelineError::Configuration(
                "smoothing.window doit être > 0".into(),
            ));
        }
        if !(s.threshold > 0.0 && s.threshold <= 1.0) {
            return Err(PipelineError::Configuration(format!(
                "smoothing.threshold hors de ]0, 1] : {}",
                s.threshold
            )));
        }
        if let Some((start, end)) = self.ensemble.silence_columns {
            if start >= end {
                return Err(PipelineError::Configuration(format!(
                    "silence_columns vide : {start}..{end}"
                )));
            }
        }
        if self.evaluation.split_low > self.evaluation.split_high {
            return Err(PipelineError::Configuration(format!(
                "split_low ({}) > split_high ({})",
                self.evaluation.split_low, self.evaluation.split_high
            )));
        }
        let mut seen = HashSet::new();
        for class in &self.classes {
            if class.id > MAX_CLASS_ID {
                return Err(PipelineError::Configuration(format!(
                    "identifiant de classe {} > {MAX_CLASS_ID}",
                    class.id
                )));
            }
            if !seen.insert(class.id) {
                return Err(PipelineError::Configuration(format!(
                    "identifiant de classe dupliqué : {}",
                    class.id
                )));
            }
        }
        Ok(())
    }

    /// Reject a configuration with no class to profile.
    ///
    /// # Errors
    /// `Configuration` if `classes` is empty.
    pub fn require_classes(&self) -> PipelineResult<()> {
        if self.classes.is_empty() {
            return Err(PipelineError::Configuration(
                "aucune classe de trafic configurée".into(),
            ));
        }
        Ok(())
    }

    /// Configured classes as [`TrafficClass`] values, in stacking order.
    #[must_use]
    pub fn traffic_classes(&self) -> Vec<TrafficClass> {
        self.classes.iter().map(ClassSpec::traffic_class).collect()
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    window: Option<WindowSection>,
    features: Option<FeaturesSection>,
    smoothing: Option<SmoothingSection>,
    ensemble: Option<EnsembleSection>,
    classifier: Option<ClassifierSection>,
    evaluation: Option<EvaluationSection>,
    paths: Option<PathsSection>,
    classes: Option<Vec<ClassSpec>>,
}

#[derive(Deserialize)]
struct WindowSection {
    obs_window: Option<usize>,
    slide_window: Option<usize>,
    train_fraction: Option<f64>,
    random_split: Option<bool>,
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct FeaturesSection {
    silence_threshold: Option<u64>,
    scalogram_scales: Option<Vec<usize>>,
    pca_components: Option<usize>,
    fit_mode: Option<FitMode>,
}

#[derive(Deserialize)]
struct SmoothingSection {
    window: Option<usize>,
    threshold: Option<f64>,
}

#[derive(Deserialize)]
struct EnsembleSection {
    method: Option<Method>,
    override_label_min: Option<ClassId>,
    override_label_max: Option<ClassId>,
    silence_columns: Option<(usize, usize)>,
}

#[derive(Deserialize)]
struct ClassifierSection {
    forest_trees: Option<usize>,
    forest_max_depth: Option<usize>,
    svm_lambda: Option<f64>,
    svm_epochs: Option<usize>,
    nn_hidden: Option<usize>,
    nn_alpha: Option<f64>,
    nn_epochs: Option<usize>,
    nn_learning_rate: Option<f64>,
}

#[derive(Deserialize)]
struct EvaluationSection {
    split_low: Option<ClassId>,
    split_high: Option<ClassId>,
}

#[derive(Deserialize)]
struct PathsSection {
    model_dir: Option<PathBuf>,
    cache: Option<PathBuf>,
}

macro_rules! merge {
    ($dst:expr, $src:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $src.$field {
                $dst.$field = v;
            }
        )+
    };
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or fails validation.
///
/// # Example
/// ```no_run
/// use tc_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Configuration rejetée : {}", path.display()))?;
    log::debug!(
        "Config chargée depuis {} ({} classes)",
        path.display(),
        config.classes.len()
    );
    Ok(config)
}

/// Parse TOML text over the defaults and validate the result.
///
/// # Errors
/// Returns an error on malformed TOML or an invalid value.
pub fn parse_config(content: &str) -> Result<PipelineConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;
    let mut config = PipelineConfig::default();

    if let Some(s) = file.window {
        merge!(
            config.window,
            s,
            obs_window,
            slide_window,
            train_fraction,
            random_split
        );
        if s.seed.is_some() {
            config.window.seed = s.seed;
        }
    }
    if let Some(s) = file.features {
        merge!(
            config.features,
            s,
            silence_threshold,
            scalogram_scales,
            pca_components,
            fit_mode
        );
    }
    if let Some(s) = file.smoothing {
        merge!(config.smoothing, s, window, threshold);
    }
    if let Some(s) = file.ensemble {
        merge!(config.ensemble, s, method, override_label_min);
        if s.override_label_max.is_some() {
            config.ensemble.override_label_max = s.override_label_max;
        }
        if s.silence_columns.is_some() {
            config.ensemble.silence_columns = s.silence_columns;
        }
    }
    if let Some(s) = file.classifier {
        merge!(
            config.classifier,
            s,
            forest_trees,
            forest_max_depth,
            svm_lambda,
            svm_epochs,
            nn_hidden,
            nn_alpha,
            nn_epochs,
            nn_learning_rate
        );
    }
    if let Some(s) = file.evaluation {
        merge!(config.evaluation, s, split_low, split_high);
    }
    if let Some(s) = file.paths {
        merge!(config.paths, s, model_dir, cache);
    }
    if let Some(classes) = file.classes {
        config.classes = classes;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
            [window]
            obs_window = 40
            slide_window = 20

            [smoothing]
            threshold = 0.55

            [[classes]]
            id = 0
            name = "YouTube"
            dataset = "datasets/youtube.dat"
            "#,
        )
        .expect("valid config");
        assert_eq!(config.window.obs_window, 40);
        assert_eq!(config.window.slide_window, 20);
        assert!((config.window.train_fraction - 0.5).abs() < f64::EPSILON);
        assert!((config.smoothing.threshold - 0.55).abs() < f64::EPSILON);
        assert_eq!(config.smoothing.window, 40);
        assert_eq!(config.classes.len(), 1);
        assert_eq!(config.traffic_classes()[0].name, "YouTube");
    }

    #[test]
    fn uneven_slide_is_rejected() {
        let err = parse_config("[window]\nobs_window = 240\nslide_window = 50\n")
            .expect_err("240 % 50 != 0");
        let inner = err.downcast_ref::<PipelineError>();
        assert!(matches!(inner, Some(PipelineError::Configuration(_))));
    }

    #[test]
    fn duplicate_class_ids_are_rejected() {
        let mut config = PipelineConfig::default();
        for name in ["a", "b"] {
            config.classes.push(ClassSpec {
                id: 1,
                name: name.into(),
                dataset: PathBuf::from(name),
            });
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn class_id_above_ceiling_is_rejected() {
        let mut config = PipelineConfig::default();
        config.classes.push(ClassSpec {
            id: 20_000,
            name: "sparse".into(),
            dataset: PathBuf::from("sparse.dat"),
        });
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));
        config.classes[0].id = MAX_CLASS_ID;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_class_list_is_a_configuration_error() {
        assert!(matches!(
            PipelineConfig::default().require_classes(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn override_range() {
        let mut e = EnsembleConfig::default();
        assert!(!e.is_override_candidate(12));
        assert!(e.is_override_candidate(13));
        assert!(e.is_override_candidate(400));
        e.override_label_max = Some(20);
        assert!(!e.is_override_candidate(21));
    }

    #[test]
    fn method_index_mapping() {
        assert_eq!(Method::from_index(0), Ok(Method::Multimethod));
        assert_eq!(Method::from_index(2), Ok(Method::NeuralNet));
        assert_eq!(Method::from_index(4), Ok(Method::Gaussian));
        assert!(Method::from_index(9).is_err());
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tclass.toml");
        std::fs::write(&path, "[features]\nfit_mode = \"Shared\"\n").expect("write");
        let config = load_config(&path).expect("load");
        assert_eq!(config.features.fit_mode, FitMode::Shared);
    }
}
