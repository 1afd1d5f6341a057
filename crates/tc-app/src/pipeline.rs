use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tc_classify::evaluate::{ClassShare, RenderOptions, evaluate};
use tc_classify::{BinaryScores, ClassifierEnsemble, ConfusionMatrix, EnsembleInput, class_share};
use tc_core::config::{Method, PipelineConfig};
use tc_core::sample::ClassId;
use tc_features::profiler::{ProfiledFeatures, Profiler};

use crate::cache::{read_cache, write_cache};

/// What one invocation does besides classifying.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Re-profile the datasets instead of reading the cache.
    pub profile: bool,
    /// Train and persist models instead of loading them.
    pub retrain: bool,
    pub share_boundary: Option<ClassId>,
}

/// Outcome of a classification run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub method: Method,
    pub windows: usize,
    pub scores: BinaryScores,
    pub share: Option<ClassShare>,
    #[serde(skip)]
    pub matrix: ConfusionMatrix,
    #[serde(skip)]
    pub labels: Vec<String>,
}

impl RunReport {
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Cannot encode report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Cannot write report: {}", path.display()))?;
        Ok(())
    }
}

/// Profiled features: fresh when `profile`, cached otherwise.
///
/// # Errors
/// Profiling, cache read or cache write errors.
pub fn profiled_features(config: &PipelineConfig, profile: bool) -> Result<ProfiledFeatures> {
    if profile {
        config.require_classes()?;
        let profiler = Profiler::from_config(config)?;
        let data = profiler.profile_classes(&config.classes)?;
        write_cache(&config.paths.cache, &data)?;
        Ok(data)
    } else {
        read_cache(&config.paths.cache)
    }
}

/// Profile or load, train or load, classify the test split and score it.
///
/// # Errors
/// The first failing stage aborts the run; nothing is reported.
pub fn run(config: &PipelineConfig, options: &RunOptions) -> Result<RunReport> {
    config.validate()?;
    let data = profiled_features(config, options.profile)?;

    let mut ensemble = ClassifierEnsemble::from_config(config, data.layout.silence.clone());
    ensemble.prepare(options.retrain, &config.paths.model_dir, &data)?;

    let segments = data.test_segments();
    let predicted = ensemble
        .predict(&EnsembleInput::test_split(&data, &segments))
        .context("Classification")?;
    let truth = data.test_labels();

    let matrix = ConfusionMatrix::build(&truth, &predicted)?;
    let scores = evaluate(&matrix, &config.evaluation)?;
    let share = options
        .share_boundary
        .map(|b| class_share(&predicted, b))
        .transpose()?;

    Ok(RunReport {
        method: config.ensemble.method,
        windows: predicted.len(),
        scores,
        share,
        labels: matrix_labels(&data, matrix.size()),
        matrix,
    })
}

/// One display name per confusion-matrix index.
fn matrix_labels(data: &ProfiledFeatures, size: usize) -> Vec<String> {
    (0..size)
        .map(|id| {
            data.classes
                .iter()
                .find(|c| c.id as usize == id)
                .map_or_else(|| id.to_string(), |c| c.name.clone())
        })
        .collect()
}

/// Print the report to stdout.
pub fn print_report(report: &RunReport, matrix: Option<&RenderOptions>) {
    if let Some(options) = matrix {
        print!("{}", report.matrix.render(&report.labels, options));
    }
    println!("{}", report.scores);
    if let Some(share) = report.share {
        println!(
            "Below boundary = {:.4}, at or above = {:.4}",
            share.below, share.at_or_above
        );
    }
}

/// Config file if present, defaults otherwise.
///
/// # Errors
/// Returns an error if the file exists but cannot be parsed.
pub fn resolve_config(path: &Path) -> Result<PipelineConfig> {
    if path.exists() {
        tc_core::config::load_config(path)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            path.display()
        );
        Ok(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use tc_core::config::ClassSpec;

    fn write_dataset(path: &Path, seed: u64, bursty: bool) {
        let mut file = std::fs::File::create(path).expect("create");
        for i in 0..300u64 {
            let v = if bursty && (i + seed) % 5 == 0 {
                8000
            } else if bursty {
                0
            } else {
                400 + (i * 37 + seed) % 900
            };
            writeln!(file, "{} {} {} {}", v, v / 3, v / 500, (i + seed) % 4).expect("write");
        }
    }

    fn config(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.window.obs_window = 40;
        config.window.slide_window = 20;
        config.features.scalogram_scales = vec![2, 4, 8];
        config.features.pca_components = 2;
        config.smoothing.window = 4;
        config.evaluation.split_low = 1;
        config.evaluation.split_high = 1;
        config.ensemble.override_label_min = 1;
        config.paths.model_dir = dir.join("models");
        config.paths.cache = dir.join("profiled-data").join("input_data.bin");
        for (id, bursty) in [(0u32, false), (1, true)] {
            let dataset = dir.join(format!("class{id}.dat"));
            write_dataset(&dataset, u64::from(id), bursty);
            config.classes.push(ClassSpec {
                id,
                name: format!("class {id}"),
                dataset,
            });
        }
        config
    }

    #[test]
    fn full_run_then_cached_rerun() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path());

        let first = run(
            &config,
            &RunOptions {
                profile: true,
                retrain: true,
                share_boundary: Some(1),
            },
        )
        .expect("first run");
        assert!(config.paths.cache.exists());
        assert!(
            config
                .paths
                .model_dir
                .join("classification_model_svm_silence.bin")
                .exists()
        );
        assert_eq!(first.windows, 2 * 7);
        assert_eq!(first.labels, vec!["class 0", "class 1"]);

        let second = run(&config, &RunOptions::default()).expect("cached run");
        assert_eq!(second.scores, first.scores);

        let report = dir.path().join("report.json");
        second.write_json(&report).expect("json");
        let text = std::fs::read_to_string(&report).expect("read");
        assert!(text.contains("\"fn\""));
        assert!(text.contains("\"Multimethod\""));
    }

    #[test]
    fn run_without_cache_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path());
        assert!(run(&config, &RunOptions::default()).is_err());
    }

    #[test]
    fn profiling_without_classes_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config(dir.path());
        config.classes.clear();
        assert!(profiled_features(&config, true).is_err());
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let config = resolve_config(Path::new("/nonexistent/tclass.toml")).expect("defaults");
        assert_eq!(config, PipelineConfig::default());
    }
}
