use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tc_core::config::WindowConfig;
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::sample::{SAMPLE_COLUMNS, Sample};

/// A contiguous run of `obs_window` samples: one classification unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservationWindow {
    /// Position of the window in its class's window sequence.
    pub index: usize,
    pub samples: Vec<Sample>,
}

impl ObservationWindow {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Raw counters of column `c`.
    #[must_use]
    pub fn counters(&self, c: usize) -> Vec<u64> {
        self.samples.iter().map(|s| s.column(c)).collect()
    }

    /// Counters of column `c` as reals.
    #[must_use]
    pub fn column(&self, c: usize) -> Vec<f64> {
        self.samples.iter().map(|s| s.column(c) as f64).collect()
    }

    /// All four columns as reals, in sample column order.
    #[must_use]
    pub fn columns(&self) -> [Vec<f64>; SAMPLE_COLUMNS] {
        std::array::from_fn(|c| self.column(c))
    }
}

/// How windows are assigned to the train and test splits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitOrder {
    /// All train windows precede all test windows.
    Sequential,
    /// Uniformly random permutation; reproducible when a seed is given.
    Random { seed: Option<u64> },
}

/// Windows of one class, split for training and evaluation.
#[derive(Clone, Debug, Default)]
pub struct TrainTestSplit {
    pub train: Vec<ObservationWindow>,
    pub test: Vec<ObservationWindow>,
}

/// Cuts a sample sequence into overlapping observation windows.
///
/// The sequence is trimmed to a whole number of slide-sized chunks; window `i`
/// is the concatenation of chunks `[i, i + obs_window / slide_window)`.
///
/// # Example
/// ```
/// use tc_features::segment::WindowSegmenter;
/// use tc_core::sample::Sample;
///
/// let segmenter = WindowSegmenter::new(40, 20).unwrap();
/// let samples = vec![Sample::default(); 200];
/// assert_eq!(segmenter.segment(&samples).len(), 8);
/// ```
#[derive(Clone, Debug)]
pub struct WindowSegmenter {
    obs_window: usize,
    slide_window: usize,
    window_size: usize,
}

impl WindowSegmenter {
    /// # Errors
    /// `Configuration` if either size is zero or `slide_window` does not divide
    /// `obs_window`.
    pub fn new(obs_window: usize, slide_window: usize) -> PipelineResult<Self> {
        if obs_window == 0 || slide_window == 0 {
            return Err(PipelineError::Configuration(
                "obs_window et slide_window doivent être > 0".into(),
            ));
        }
        if obs_window % slide_window != 0 {
            return Err(PipelineError::Configuration(format!(
                "obs_window ({obs_window}) doit être un multiple de slide_window ({slide_window})"
            )));
        }
        Ok(Self {
            obs_window,
            slide_window,
            window_size: obs_window / slide_window,
        })
    }

    /// # Errors
    /// See [`WindowSegmenter::new`].
    pub fn from_config(config: &WindowConfig) -> PipelineResult<Self> {
        Self::new(config.obs_window, config.slide_window)
    }

    #[must_use]
    pub fn obs_window(&self) -> usize {
        self.obs_window
    }

    #[must_use]
    pub fn slide_window(&self) -> usize {
        self.slide_window
    }

    /// Slide chunks per observation window.
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// `floor((n − obs_window) / slide_window)`, zero when `n <= obs_window`.
    #[inline]
    #[must_use]
    pub fn window_count(&self, n_samples: usize) -> usize {
        n_samples.saturating_sub(self.obs_window) / self.slide_window
    }

    /// All windows of `samples`, in temporal order. Empty when the sequence is
    /// too short; use [`WindowSegmenter::require_windows`] where windows are
    /// mandatory.
    #[must_use]
    pub fn segment(&self, samples: &[Sample]) -> Vec<ObservationWindow> {
        let n_obs = self.window_count(samples.len());
        if n_obs == 0 {
            return Vec::new();
        }

        let n_trimmed = (n_obs - 1) * self.slide_window + self.obs_window;
        let chunks: Vec<&[Sample]> = samples[..n_trimmed]
            .chunks_exact(self.slide_window)
            .collect();
        debug_assert_eq!(chunks.len(), n_obs + self.window_size - 1);

        (0..n_obs)
            .map(|i| ObservationWindow {
                index: i,
                samples: chunks[i..i + self.window_size].concat(),
            })
            .collect()
    }

    /// Like [`WindowSegmenter::segment`] but refuses to return nothing.
    ///
    /// # Errors
    /// `InsufficientData` if not a single window fits.
    pub fn require_windows(&self, samples: &[Sample]) -> PipelineResult<Vec<ObservationWindow>> {
        let windows = self.segment(samples);
        if windows.is_empty() {
            return Err(PipelineError::InsufficientData {
                stage: "segmentation",
                needed: self.obs_window + self.slide_window,
                available: samples.len(),
            });
        }
        Ok(windows)
    }

    /// Split windows into train/test. `floor(n · train_fraction)` windows go
    /// to train.
    #[must_use]
    pub fn split(
        &self,
        windows: Vec<ObservationWindow>,
        train_fraction: f64,
        order: SplitOrder,
    ) -> TrainTestSplit {
        let n = windows.len();
        let n_train = ((n as f64) * train_fraction).floor() as usize;
        let n_train = n_train.min(n);

        let mut indices: Vec<usize> = (0..n).collect();
        if let SplitOrder::Random { seed } = order {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }

        let mut slots: Vec<Option<ObservationWindow>> = windows.into_iter().map(Some).collect();
        let mut take = |i: usize| slots[i].take();
        let train = indices[..n_train].iter().filter_map(|&i| take(i)).collect();
        let test = indices[n_train..].iter().filter_map(|&i| take(i)).collect();

        TrainTestSplit { train, test }
    }
}

impl SplitOrder {
    #[must_use]
    pub fn from_config(config: &WindowConfig) -> Self {
        if config.random_split {
            Self::Random { seed: config.seed }
        } else {
            Self::Sequential
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<Sample> {
        (0..n as u64).map(|i| Sample::new(i, i * 2, i % 7, 1)).collect()
    }

    #[test]
    fn uneven_slide_is_a_configuration_error() {
        assert!(matches!(
            WindowSegmenter::new(240, 50),
            Err(PipelineError::Configuration(_))
        ));
        assert!(WindowSegmenter::new(240, 0).is_err());
    }

    #[test]
    fn window_count_matches_formula() {
        for (obs, slide) in [(240, 40), (40, 20), (30, 10), (8, 8)] {
            let seg = WindowSegmenter::new(obs, slide).expect("valid sizes");
            for n in [0, obs - 1, obs, obs + 1, obs + slide, 3 * obs + 7, 1000] {
                let expected = if n > obs { (n - obs) / slide } else { 0 };
                let windows = seg.segment(&ramp(n));
                assert_eq!(windows.len(), expected, "obs={obs} slide={slide} n={n}");
            }
        }
    }

    #[test]
    fn windows_are_consecutive_original_samples() {
        let seg = WindowSegmenter::new(240, 40).expect("valid sizes");
        let samples = ramp(1000);
        let windows = seg.segment(&samples);
        assert_eq!(windows.len(), 19);
        for w in &windows {
            assert_eq!(w.len(), 240);
            let start = w.index * 40;
            assert_eq!(w.samples.as_slice(), &samples[start..start + 240]);
        }
    }

    #[test]
    fn short_sequences_yield_no_windows_and_an_error_when_required() {
        let seg = WindowSegmenter::new(40, 20).expect("valid sizes");
        for n in [0, 10, 40] {
            assert!(seg.segment(&ramp(n)).is_empty());
            assert!(matches!(
                seg.require_windows(&ramp(n)),
                Err(PipelineError::InsufficientData { available, .. }) if available == n
            ));
        }
    }

    #[test]
    fn sequential_split_preserves_order() {
        let seg = WindowSegmenter::new(40, 20).expect("valid sizes");
        let windows = seg.segment(&ramp(200));
        let split = seg.split(windows, 0.5, SplitOrder::Sequential);
        let train: Vec<usize> = split.train.iter().map(|w| w.index).collect();
        let test: Vec<usize> = split.test.iter().map(|w| w.index).collect();
        assert_eq!(train, vec![0, 1, 2, 3]);
        assert_eq!(test, vec![4, 5, 6, 7]);
    }

    #[test]
    fn seeded_random_split_is_reproducible_and_complete() {
        let seg = WindowSegmenter::new(40, 20).expect("valid sizes");
        let run = || {
            let split = seg.split(
                seg.segment(&ramp(400)),
                0.5,
                SplitOrder::Random { seed: Some(7) },
            );
            (
                split.train.iter().map(|w| w.index).collect::<Vec<_>>(),
                split.test.iter().map(|w| w.index).collect::<Vec<_>>(),
            )
        };
        let (train_a, test_a) = run();
        let (train_b, test_b) = run();
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);

        let mut all: Vec<usize> = train_a.iter().chain(test_a.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..18).collect::<Vec<_>>());
        assert_eq!(train_a.len(), 9);
    }
}
