use tc_core::config::SmoothingConfig;
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::sample::ClassId;

/// Majority-vote relabeling over consecutive chunks of predicted labels.
///
/// Each chunk of `window` labels (the last one may be shorter) is rewritten
/// to its most frequent label when that label's share strictly exceeds
/// `threshold`. Ties between equally frequent labels go to the one seen
/// first in the chunk.
///
/// # Example
/// ```
/// use tc_features::smoothing::TemporalSmoother;
/// let smoother = TemporalSmoother::new(4, 0.6);
/// assert_eq!(smoother.smooth(&[1, 1, 2, 1, 3, 4]), vec![1, 1, 1, 1, 3, 4]);
/// ```
#[derive(Clone, Debug)]
pub struct TemporalSmoother {
    window: usize,
    threshold: f64,
}

impl TemporalSmoother {
    /// A zero `window` is treated as 1 (every chunk is already uniform).
    #[must_use]
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window: window.max(1),
            threshold,
        }
    }

    #[must_use]
    pub fn from_config(config: &SmoothingConfig) -> Self {
        Self::new(config.window, config.threshold)
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Smooth one contiguous label sequence.
    #[must_use]
    pub fn smooth(&self, labels: &[ClassId]) -> Vec<ClassId> {
        let mut out = Vec::with_capacity(labels.len());
        for chunk in labels.chunks(self.window) {
            match self.majority(chunk) {
                Some(label) => out.extend(std::iter::repeat_n(label, chunk.len())),
                None => out.extend_from_slice(chunk),
            }
        }
        out
    }

    /// Smooth each segment independently. `segments` gives the length of each
    /// consecutive class segment; no chunk ever spans two segments.
    ///
    /// # Errors
    /// `DataShapeMismatch` if the segment lengths do not sum to `labels.len()`.
    pub fn smooth_segments(
        &self,
        labels: &[ClassId],
        segments: &[usize],
    ) -> PipelineResult<Vec<ClassId>> {
        let total: usize = segments.iter().sum();
        if total != labels.len() {
            return Err(PipelineError::DataShapeMismatch {
                expected: labels.len(),
                found: total,
            });
        }

        let mut out = Vec::with_capacity(labels.len());
        let mut start = 0;
        for &len in segments {
            out.extend(self.smooth(&labels[start..start + len]));
            start += len;
        }
        Ok(out)
    }

    /// Majority label of `chunk` if its share exceeds the threshold.
    fn majority(&self, chunk: &[ClassId]) -> Option<ClassId> {
        // Chunks are short; a first-seen ordered tally keeps ties stable.
        let mut counts: Vec<(ClassId, usize)> = Vec::new();
        for &label in chunk {
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((label, 1)),
            }
        }

        let mut best: Option<(ClassId, usize)> = None;
        for &(label, n) in &counts {
            if best.is_none_or(|(_, m)| n > m) {
                best = Some((label, n));
            }
        }

        best.and_then(|(label, n)| {
            (n as f64 / chunk.len() as f64 > self.threshold).then_some(label)
        })
    }
}
