use thiserror::Error;

/// Errors raised by the classification pipeline.
///
/// Every variant names the violated precondition so the binary can report
/// which stage failed without printing a partial result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Inconsistent window/slide sizes, mismatched class/dataset counts, or
    /// any other invalid configuration value.
    #[error("Configuration invalide : {0}")]
    Configuration(String),

    /// Too few samples (or windows) to produce a single observation.
    #[error("Données insuffisantes ({stage}) : {needed} requis, {available} disponibles")]
    InsufficientData {
        /// Stage that needed the data.
        stage: &'static str,
        /// Minimum amount required.
        needed: usize,
        /// Amount actually available.
        available: usize,
    },

    /// `predict` called on a classifier that was neither trained nor loaded.
    #[error("Modèle indisponible : {name}")]
    ModelNotAvailable {
        /// Artifact name of the model.
        name: String,
    },

    /// A metric whose denominator is zero.
    #[error("Métrique indéterminée : {metric} (dénominateur nul)")]
    IndeterminateMetric {
        /// Metric name (`precision`, `recall`, `accuracy`).
        metric: &'static str,
    },

    /// Feature vectors of differing length stacked together.
    #[error("Dimensions incohérentes : {expected} attendues, {found} reçues")]
    DataShapeMismatch {
        /// Expected length.
        expected: usize,
        /// Length actually received.
        found: usize,
    },
}

/// Shorthand for results carrying a [`PipelineError`].
pub type PipelineResult<T> = Result<T, PipelineError>;
