use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use tc_core::config::{EnsembleConfig, Method, PipelineConfig};
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::ClassId;
use tc_core::traits::Classifier;
use tc_features::profiler::ProfiledFeatures;
use tc_features::smoothing::TemporalSmoother;

use crate::model::{ClassifierKind, Model};

/// Test-split inputs of one ensemble prediction.
#[derive(Clone, Copy, Debug)]
pub struct EnsembleInput<'a> {
    /// Projected features, read by the bulk classifier.
    pub projected: &'a FeatureMatrix,
    /// Standardized, pre-projection features; the silence specialist reads
    /// its columns from here.
    pub standardized: &'a FeatureMatrix,
    /// Length of each class segment, for smoothing.
    pub segments: &'a [usize],
}

impl<'a> EnsembleInput<'a> {
    /// Test split of a profiling run.
    #[must_use]
    pub fn test_split(data: &'a ProfiledFeatures, segments: &'a [usize]) -> Self {
        Self {
            projected: &data.norm_test,
            standardized: &data.std_test,
            segments,
        }
    }
}

/// Bulk classifier, temporal smoothing and an optional silence specialist.
///
/// Prediction runs the bulk classifier on every window, smooths the labels
/// per class segment, then hands the windows whose smoothed label falls in
/// the override range to the specialist. Its label replaces the smoothed one
/// for exactly those windows.
pub struct ClassifierEnsemble<B = Model, S = Model> {
    bulk: B,
    specialist: Option<S>,
    smoother: TemporalSmoother,
    config: EnsembleConfig,
    silence_columns: Range<usize>,
}

impl<B: Classifier, S: Classifier> ClassifierEnsemble<B, S> {
    #[must_use]
    pub fn new(
        bulk: B,
        specialist: Option<S>,
        smoother: TemporalSmoother,
        config: EnsembleConfig,
        silence_columns: Range<usize>,
    ) -> Self {
        Self {
            bulk,
            specialist,
            smoother,
            config,
            silence_columns,
        }
    }

    #[must_use]
    pub fn bulk(&self) -> &B {
        &self.bulk
    }

    /// Train the bulk classifier on the projected train split and the
    /// specialist on the silence columns of the standardized train split.
    ///
    /// # Errors
    /// Any training error of either model.
    pub fn train(&mut self, data: &ProfiledFeatures) -> PipelineResult<()> {
        let labels = data.train_labels();
        self.bulk.train(&data.norm_train, &labels)?;
        if let Some(specialist) = &mut self.specialist {
            let silence = data.std_train.select_columns(self.silence_columns.clone())?;
            specialist.train(&silence, &labels)?;
        }
        Ok(())
    }

    /// # Errors
    /// I/O errors writing either artifact.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        self.bulk.persist(dir)?;
        if let Some(specialist) = &self.specialist {
            specialist.persist(dir)?;
        }
        Ok(())
    }

    /// # Errors
    /// `ModelNotAvailable` (wrapped) if an artifact is missing.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        self.bulk.load(dir)?;
        if let Some(specialist) = &mut self.specialist {
            specialist.load(dir)?;
        }
        Ok(())
    }

    /// Train and persist when `retrain`, load otherwise.
    ///
    /// # Errors
    /// Training, persistence or load errors.
    pub fn prepare(&mut self, retrain: bool, dir: &Path, data: &ProfiledFeatures) -> Result<()> {
        if retrain {
            self.train(data).context("Entraînement des modèles")?;
            self.persist(dir)
        } else {
            self.load(dir)
                .with_context(|| format!("Chargement des modèles depuis {}", dir.display()))
        }
    }

    /// Final label of every window of `input`.
    ///
    /// # Errors
    /// `ModelNotAvailable` from an unfit model, `DataShapeMismatch` if a model
    /// returns the wrong number of labels or the segments do not cover the
    /// input.
    pub fn predict(&self, input: &EnsembleInput<'_>) -> PipelineResult<Vec<ClassId>> {
        let rows = input.projected.rows();
        let raw = self.bulk.predict(input.projected)?;
        check_len(rows, raw.len())?;
        let mut labels = self.smoother.smooth_segments(&raw, input.segments)?;

        let Some(specialist) = &self.specialist else {
            return Ok(labels);
        };
        let candidates: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| self.config.is_override_candidate(**l))
            .map(|(i, _)| i)
            .collect();
        log::debug!(
            "{} fenêtres sur {} confiées au spécialiste silence",
            candidates.len(),
            rows
        );
        if candidates.is_empty() {
            return Ok(labels);
        }

        check_len(rows, input.standardized.rows())?;
        let silence = input
            .standardized
            .select_columns(self.silence_columns.clone())?
            .select_rows(&candidates);
        let overrides = specialist.predict(&silence)?;
        check_len(candidates.len(), overrides.len())?;
        for (i, label) in candidates.into_iter().zip(overrides) {
            labels[i] = label;
        }
        Ok(labels)
    }
}

impl ClassifierEnsemble {
    /// Models of the configured method. Only the multimethod ensemble gets a
    /// silence specialist. `silence_block` is the silence block of the feature
    /// layout, used unless the configuration names other columns.
    #[must_use]
    pub fn from_config(config: &PipelineConfig, silence_block: Range<usize>) -> Self {
        let seed = config.window.seed.unwrap_or(0);
        let method = config.ensemble.method;
        let bulk = Model::new(
            ClassifierKind::for_method(method),
            config.classifier.clone(),
            seed,
        );
        let specialist = (method == Method::Multimethod)
            .then(|| Model::silence_specialist(config.classifier.clone(), seed));
        Self::new(
            bulk,
            specialist,
            TemporalSmoother::from_config(&config.smoothing),
            config.ensemble.clone(),
            config.ensemble.silence_range().unwrap_or(silence_block),
        )
    }
}

fn check_len(expected: usize, found: usize) -> PipelineResult<()> {
    if expected != found {
        return Err(PipelineError::DataShapeMismatch { expected, found });
    }
    Ok(())
}
