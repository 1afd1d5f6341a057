use std::fmt;
use std::fmt::Write as _;
use std::ops::Range;

use serde::Serialize;
use tc_core::config::EvaluationConfig;
use tc_core::error::{PipelineError, PipelineResult};
use tc_core::sample::{ClassId, MAX_CLASS_ID};

/// Square count matrix indexed by class id: `get(i, j)` is the number of
/// windows of true class `i` predicted as `j`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    size: usize,
    cells: Vec<u64>,
}

impl ConfusionMatrix {
    /// Count `(truth, predicted)` pairs. The matrix spans every id up to the
    /// largest one seen.
    ///
    /// # Errors
    /// `DataShapeMismatch` if the two sequences differ in length,
    /// `Configuration` if an id exceeds [`MAX_CLASS_ID`].
    pub fn build(truth: &[ClassId], predicted: &[ClassId]) -> PipelineResult<Self> {
        if truth.len() != predicted.len() {
            return Err(PipelineError::DataShapeMismatch {
                expected: truth.len(),
                found: predicted.len(),
            });
        }
        let largest = truth.iter().chain(predicted).max().copied();
        if let Some(id) = largest.filter(|&id| id > MAX_CLASS_ID) {
            return Err(PipelineError::Configuration(format!(
                "identifiant de classe {id} > {MAX_CLASS_ID} : matrice de confusion trop grande"
            )));
        }
        let size = largest.map_or(0, |m| m as usize + 1);
        let mut cells = vec![0; size * size];
        for (&t, &p) in truth.iter().zip(predicted) {
            cells[t as usize * size + p as usize] += 1;
        }
        Ok(Self { size, cells })
    }

    /// # Errors
    /// `DataShapeMismatch` if the rows do not form a square matrix.
    pub fn from_rows(rows: &[Vec<u64>]) -> PipelineResult<Self> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return Err(PipelineError::DataShapeMismatch {
                    expected: size,
                    found: row.len(),
                });
            }
            cells.extend_from_slice(row);
        }
        Ok(Self { size, cells })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn get(&self, truth: usize, predicted: usize) -> u64 {
        self.cells[truth * self.size + predicted]
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.cells.iter().sum()
    }

    /// Sum of the block `rows × cols`, ranges clamped to the matrix.
    #[must_use]
    pub fn block_sum(&self, rows: Range<usize>, cols: Range<usize>) -> u64 {
        let clamp = |r: Range<usize>| r.start.min(self.size)..r.end.min(self.size);
        let cols = clamp(cols);
        clamp(rows)
            .map(|i| cols.clone().map(|j| self.get(i, j)).sum::<u64>())
            .sum()
    }

    /// Text table with one row and one column per label.
    #[must_use]
    pub fn render(&self, labels: &[String], options: &RenderOptions) -> String {
        let width = labels.iter().map(String::len).max().unwrap_or(0).max(5);
        let empty = " ".repeat(width);
        let n = self.size.min(labels.len());
        let mut out = String::new();

        let _ = write!(out, "    {empty} ");
        for label in &labels[..n] {
            let _ = write!(out, "{label:>width$} ");
        }
        out.push('\n');

        for (i, label) in labels[..n].iter().enumerate() {
            let _ = write!(out, "    {label:>width$} ");
            for j in 0..n {
                let value = self.get(i, j);
                let hidden = (options.hide_zeroes && value == 0)
                    || (options.hide_diagonal && i == j)
                    || options
                        .hide_threshold
                        .is_some_and(|t| value as f64 <= t);
                if hidden {
                    let _ = write!(out, "{empty} ");
                } else {
                    let _ = write!(out, "{:>width$.1} ", value as f64);
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Cells blanked by [`ConfusionMatrix::render`].
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    pub hide_zeroes: bool,
    pub hide_diagonal: bool,
    /// Blank every cell not strictly above this value.
    pub hide_threshold: Option<f64>,
}

/// Two-superclass view of a confusion matrix.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BinaryScores {
    pub tp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub fp: u64,
    pub tn: u64,
    pub precision: f64,
    pub recall: f64,
    pub accuracy: f64,
}

impl fmt::Display for BinaryScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "True positives = {}", self.tp)?;
        writeln!(f, "False negatives = {}", self.fn_)?;
        writeln!(f, "False positives = {}", self.fp)?;
        writeln!(f, "True negatives = {}", self.tn)?;
        writeln!(f, "Precision = {:.4}", self.precision)?;
        writeln!(f, "Recall = {:.4}", self.recall)?;
        write!(f, "Accuracy = {:.4}", self.accuracy)
    }
}

/// Collapse the matrix around `split_low`.
///
/// The block of ids `< split_low` is counted as `tp` (truth and prediction
/// both below the split); ids in `[split_low, split_high]` form the other
/// superclass.
///
/// # Errors
/// `IndeterminateMetric` naming the first metric whose denominator is zero.
///
/// # Example
/// ```
/// use tc_classify::evaluate::{binary_scores, ConfusionMatrix};
/// let cm = ConfusionMatrix::from_rows(&[vec![5, 1], vec![2, 10]]).unwrap();
/// let s = binary_scores(&cm, 1, 1).unwrap();
/// assert_eq!((s.tp, s.fn_, s.fp, s.tn), (5, 2, 1, 10));
/// ```
pub fn binary_scores(
    cm: &ConfusionMatrix,
    split_low: ClassId,
    split_high: ClassId,
) -> PipelineResult<BinaryScores> {
    let low = split_low as usize;
    let high = split_high as usize + 1;

    let tp = cm.block_sum(0..low, 0..low);
    let fn_ = cm.block_sum(low..high, 0..low);
    let fp = cm.block_sum(0..low, low..high);
    let tn = cm.block_sum(low..high, low..high);

    let ratio = |num: u64, den: u64, metric: &'static str| {
        if den == 0 {
            Err(PipelineError::IndeterminateMetric { metric })
        } else {
            Ok(num as f64 / den as f64)
        }
    };

    Ok(BinaryScores {
        precision: ratio(tp, tp + fp, "precision")?,
        recall: ratio(tp, tp + fn_, "recall")?,
        accuracy: ratio(tp + tn, tp + fp + fn_ + tn, "accuracy")?,
        tp,
        fn_,
        fp,
        tn,
    })
}

/// [`binary_scores`] with the configured split.
///
/// # Errors
/// See [`binary_scores`].
pub fn evaluate(cm: &ConfusionMatrix, config: &EvaluationConfig) -> PipelineResult<BinaryScores> {
    binary_scores(cm, config.split_low, config.split_high)
}

/// Fractions of predictions on each side of a class boundary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ClassShare {
    pub below: f64,
    pub at_or_above: f64,
}

/// Share of `labels` below `boundary` and at or above it.
///
/// # Errors
/// `IndeterminateMetric` on an empty label sequence.
pub fn class_share(labels: &[ClassId], boundary: ClassId) -> PipelineResult<ClassShare> {
    if labels.is_empty() {
        return Err(PipelineError::IndeterminateMetric {
            metric: "class_share",
        });
    }
    let below = labels.iter().filter(|&&l| l < boundary).count() as f64;
    let total = labels.len() as f64;
    Ok(ClassShare {
        below: below / total,
        at_or_above: (total - below) / total,
    })
}
