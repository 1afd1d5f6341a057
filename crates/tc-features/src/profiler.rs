use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tc_core::config::{ClassSpec, PipelineConfig};
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::matrix::FeatureMatrix;
use tc_core::sample::{ClassId, Sample, TrafficClass};

use crate::dataset::read_samples;
use crate::extract::{ExtractedFeatures, FeatureExtractor, FeatureLayout};
use crate::normalize::Normalizer;
use crate::segment::{SplitOrder, WindowSegmenter};

/// Extracted train/test features of one class, before balancing.
#[derive(Clone, Debug)]
pub struct ClassProfile {
    pub class: TrafficClass,
    pub train: ExtractedFeatures,
    pub test: ExtractedFeatures,
}

/// Windows kept per class after balancing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub train: usize,
    pub test: usize,
}

/// Output of a profiling run, as written to the cache.
///
/// Rows are stacked class by class in configuration order; every class
/// contributes exactly `samples_number.train` train rows and
/// `samples_number.test` test rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfiledFeatures {
    pub unnorm_train: FeatureMatrix,
    pub unnorm_test: FeatureMatrix,
    /// Standardized, before projection.
    pub std_train: FeatureMatrix,
    pub std_test: FeatureMatrix,
    /// Projected onto the principal directions.
    pub norm_train: FeatureMatrix,
    pub norm_test: FeatureMatrix,
    pub classes: Vec<TrafficClass>,
    pub samples_number: SampleCounts,
    pub layout: FeatureLayout,
}

impl ProfiledFeatures {
    /// Truth label of every train row.
    #[must_use]
    pub fn train_labels(&self) -> Vec<ClassId> {
        self.labels(self.samples_number.train)
    }

    /// Truth label of every test row.
    #[must_use]
    pub fn test_labels(&self) -> Vec<ClassId> {
        self.labels(self.samples_number.test)
    }

    /// Length of each class segment of the test split.
    #[must_use]
    pub fn test_segments(&self) -> Vec<usize> {
        vec![self.samples_number.test; self.classes.len()]
    }

    fn labels(&self, per_class: usize) -> Vec<ClassId> {
        self.classes
            .iter()
            .flat_map(|c| std::iter::repeat_n(c.id, per_class))
            .collect()
    }
}

/// Segment → split → extract for each class, then balance, stack and
/// normalize.
#[derive(Clone, Debug)]
pub struct Profiler {
    segmenter: WindowSegmenter,
    extractor: FeatureExtractor,
    normalizer: Normalizer,
    train_fraction: f64,
    order: SplitOrder,
}

impl Profiler {
    /// # Errors
    /// `Configuration` if the window sizes are inconsistent.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        Ok(Self {
            segmenter: WindowSegmenter::from_config(&config.window)?,
            extractor: FeatureExtractor::from_config(&config.features),
            normalizer: Normalizer::from_config(&config.features),
            train_fraction: config.window.train_fraction,
            order: SplitOrder::from_config(&config.window),
        })
    }

    #[must_use]
    pub fn layout(&self) -> FeatureLayout {
        self.extractor.layout()
    }

    /// Profile one class from its in-memory samples.
    ///
    /// # Errors
    /// `InsufficientData` if the samples do not fill a single window;
    /// extraction errors otherwise.
    pub fn profile_samples(
        &self,
        class: TrafficClass,
        samples: &[Sample],
    ) -> PipelineResult<ClassProfile> {
        let windows = self.segmenter.require_windows(samples)?;
        let n_windows = windows.len();
        let split = self.segmenter.split(windows, self.train_fraction, self.order);
        log::debug!(
            "{} : {} fenêtres ({} train / {} test)",
            class.name,
            n_windows,
            split.train.len(),
            split.test.len()
        );

        Ok(ClassProfile {
            train: self.extractor.extract(&split.train)?,
            test: self.extractor.extract(&split.test)?,
            class,
        })
    }

    /// Read a class's dataset file and profile it.
    ///
    /// # Errors
    /// I/O or parse errors on the dataset, then any profiling error.
    pub fn profile_dataset(&self, spec: &ClassSpec) -> Result<ClassProfile> {
        let samples = read_samples(&spec.dataset)?;
        let profile = self
            .profile_samples(spec.traffic_class(), &samples)
            .with_context(|| format!("Profilage de la classe {} ({})", spec.id, spec.name))?;
        Ok(profile)
    }

    /// Profile every configured class, in order, and assemble the result.
    ///
    /// # Errors
    /// The first class that fails aborts the run; no partial matrix is returned.
    pub fn profile_classes(&self, classes: &[ClassSpec]) -> Result<ProfiledFeatures> {
        let mut profiles = Vec::with_capacity(classes.len());
        for spec in classes {
            log::info!("Profilage : {} ({})", spec.name, spec.dataset.display());
            profiles.push(self.profile_dataset(spec)?);
        }
        Ok(self.assemble(profiles)?)
    }

    /// Balance every class to the smallest window count, stack, and
    /// normalize.
    ///
    /// # Errors
    /// `Configuration` with no profile, `InsufficientData` if some class has
    /// no train or no test window, normalization errors otherwise.
    pub fn assemble(&self, mut profiles: Vec<ClassProfile>) -> PipelineResult<ProfiledFeatures> {
        if profiles.is_empty() {
            return Err(PipelineError::Configuration(
                "aucune classe à assembler".into(),
            ));
        }

        let counts = SampleCounts {
            train: min_rows(&profiles, |p| &p.train, "équilibrage train")?,
            test: min_rows(&profiles, |p| &p.test, "équilibrage test")?,
        };

        let layout = self.layout();
        let mut unnorm_train = FeatureMatrix::with_cols(layout.width());
        let mut unnorm_test = FeatureMatrix::with_cols(layout.width());
        for p in &mut profiles {
            if p.train.rows() > counts.train || p.test.rows() > counts.test {
                log::warn!(
                    "{} tronquée à {} train / {} test (sur {} / {})",
                    p.class.name,
                    counts.train,
                    counts.test,
                    p.train.rows(),
                    p.test.rows()
                );
            }
            p.train.truncate_rows(counts.train);
            p.test.truncate_rows(counts.test);
            unnorm_train.vstack(&p.train.concat()?)?;
            unnorm_test.vstack(&p.test.concat()?)?;
        }

        let normalized = self.normalizer.fit_transform(&unnorm_train, &unnorm_test)?;
        log::info!(
            "{} classes, {} lignes train, {} lignes test, {} colonnes",
            profiles.len(),
            unnorm_train.rows(),
            unnorm_test.rows(),
            unnorm_train.cols()
        );

        Ok(ProfiledFeatures {
            unnorm_train,
            unnorm_test,
            std_train: normalized.std_train,
            std_test: normalized.std_test,
            norm_train: normalized.train,
            norm_test: normalized.test,
            classes: profiles.into_iter().map(|p| p.class).collect(),
            samples_number: counts,
            layout,
        })
    }
}

fn min_rows(
    profiles: &[ClassProfile],
    split: impl Fn(&ClassProfile) -> &ExtractedFeatures,
    stage: &'static str,
) -> PipelineResult<usize> {
    let min = profiles.iter().map(|p| split(p).rows()).min().unwrap_or(0);
    if min == 0 {
        return Err(PipelineError::InsufficientData {
            stage,
            needed: 1,
            available: 0,
        });
    }
    Ok(min)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use tc_core::config::FitMode;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.window.obs_window = 40;
        config.window.slide_window = 20;
        config.features.scalogram_scales = vec![2, 4];
        config.features.pca_components = 2;
        config
    }

    fn traffic(n: usize, seed: u64) -> Vec<Sample> {
        (0..n as u64)
            .map(|i| {
                let burst = if (i + seed) % 9 == 0 { 4000 } else { (i * 31 + seed * 7) % 300 };
                Sample::new(burst, burst / 2 + seed, (i + seed) % 4, 1 + i % 3)
            })
            .collect()
    }

    #[test]
    fn two_classes_of_200_samples_give_8_windows_each() {
        let profiler = Profiler::from_config(&config()).expect("valid config");
        let a = profiler
            .profile_samples(TrafficClass::new(0, "a"), &traffic(200, 1))
            .expect("enough samples");
        let b = profiler
            .profile_samples(TrafficClass::new(1, "b"), &traffic(200, 5))
            .expect("enough samples");
        assert_eq!(a.train.rows() + a.test.rows(), 8);
        assert_eq!(a.train.rows(), 4);

        let profiled = profiler.assemble(vec![a, b]).expect("assemble");
        assert_eq!(profiled.samples_number, SampleCounts { train: 4, test: 4 });
        assert_eq!(profiled.unnorm_train.rows(), 8);
        assert_eq!(profiled.unnorm_train.cols(), profiled.layout.width());
        assert_eq!(profiled.norm_test.cols(), 2);
        assert_eq!(profiled.test_labels(), vec![0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(profiled.test_segments(), vec![4, 4]);
    }

    #[test]
    fn classes_are_balanced_to_the_smallest() {
        let profiler = Profiler::from_config(&config()).expect("valid config");
        let long = profiler
            .profile_samples(TrafficClass::new(3, "long"), &traffic(400, 2))
            .expect("enough samples");
        let short = profiler
            .profile_samples(TrafficClass::new(8, "short"), &traffic(200, 3))
            .expect("enough samples");
        let profiled = profiler.assemble(vec![long, short]).expect("assemble");
        assert_eq!(profiled.samples_number.train, 4);
        assert_eq!(profiled.unnorm_test.rows(), 2 * profiled.samples_number.test);
        assert_eq!(profiled.train_labels()[..4], [3, 3, 3, 3]);
    }

    #[test]
    fn too_few_samples_is_insufficient_data() {
        let profiler = Profiler::from_config(&config()).expect("valid config");
        let err = profiler
            .profile_samples(TrafficClass::new(0, "tiny"), &traffic(40, 0))
            .expect_err("40 samples cannot fill a window");
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }

    #[test]
    fn shared_mode_keeps_raw_features() {
        let mut cfg = config();
        cfg.features.fit_mode = FitMode::Shared;
        let profiler = Profiler::from_config(&cfg).expect("valid config");
        let a = profiler
            .profile_samples(TrafficClass::new(0, "a"), &traffic(200, 1))
            .expect("profile");
        let b = profiler
            .profile_samples(TrafficClass::new(1, "b"), &traffic(200, 4))
            .expect("profile");
        let independent = Profiler::from_config(&config())
            .expect("valid config")
            .assemble(vec![a.clone(), b.clone()])
            .expect("assemble");
        let shared = profiler.assemble(vec![a, b]).expect("assemble");
        assert_eq!(shared.unnorm_test, independent.unnorm_test);
        assert_eq!(shared.std_train, independent.std_train);
    }

    #[test]
    fn profiles_dataset_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut specs = Vec::new();
        for (id, seed) in [(0u32, 1u64), (1, 6)] {
            let path = dir.path().join(format!("class{id}.dat"));
            let mut file = std::fs::File::create(&path).expect("create");
            for s in traffic(200, seed) {
                writeln!(
                    file,
                    "{} {} {} {}",
                    s.bytes_up, s.bytes_down, s.packets_up, s.packets_down
                )
                .expect("write");
            }
            specs.push(ClassSpec {
                id,
                name: format!("class {id}"),
                dataset: path,
            });
        }

        let profiler = Profiler::from_config(&config()).expect("valid config");
        let profiled = profiler.profile_classes(&specs).expect("profile");
        assert_eq!(profiled.classes.len(), 2);
        assert_eq!(profiled.classes[1].name, "class 1");
    }

    #[test]
    fn missing_dataset_fails_the_run() {
        let profiler = Profiler::from_config(&config()).expect("valid config");
        let spec = ClassSpec {
            id: 0,
            name: "ghost".into(),
            dataset: "/nonexistent/ghost.dat".into(),
        };
        assert!(profiler.profile_classes(&[spec]).is_err());
    }
}
