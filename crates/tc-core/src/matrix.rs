use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Dense row-major matrix of features, one row per observation window.
///
/// Rows all share the same length; every insertion path checks it and fails
/// with [`PipelineError::DataShapeMismatch`] otherwise.
///
/// # Example
/// ```
/// use tc_core::matrix::FeatureMatrix;
/// let mut m = FeatureMatrix::with_cols(2);
/// m.push_row(&[1.0, 2.0]).unwrap();
/// m.push_row(&[3.0, 4.0]).unwrap();
/// assert_eq!(m.rows(), 2);
/// assert_eq!(m.get(1, 0), 3.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Empty matrix whose rows will have `cols` entries.
    #[must_use]
    pub fn with_cols(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: Vec::new(),
        }
    }

    /// Zero-filled `rows × cols` matrix.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build from a flat row-major buffer.
    ///
    /// # Errors
    /// `DataShapeMismatch` if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> PipelineResult<Self> {
        if data.len() != rows * cols {
            return Err(PipelineError::DataShapeMismatch {
                expected: rows * cols,
                found: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from a list of rows of identical length.
    ///
    /// # Errors
    /// `DataShapeMismatch` on the first row whose length differs from the first.
    pub fn from_rows(rows: &[Vec<f64>]) -> PipelineResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut m = Self::with_cols(cols);
        m.data.reserve(rows.len() * cols);
        for row in rows {
            m.push_row(row)?;
        }
        Ok(m)
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    #[must_use]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: f64) {
        self.data[r * self.cols + c] = v;
    }

    /// Row `r` as a slice.
    #[inline]
    #[must_use]
    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Iterate over rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics; a zero-column matrix has no meaningful rows.
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Column `c` copied out.
    #[must_use]
    pub fn column(&self, c: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, c)).collect()
    }

    /// Append one row.
    ///
    /// # Errors
    /// `DataShapeMismatch` if `row.len() != self.cols()`.
    pub fn push_row(&mut self, row: &[f64]) -> PipelineResult<()> {
        if row.len() != self.cols {
            return Err(PipelineError::DataShapeMismatch {
                expected: self.cols,
                found: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Keep only the first `n` rows (no-op when `n >= rows`).
    pub fn truncate_rows(&mut self, n: usize) {
        if n < self.rows {
            self.rows = n;
            self.data.truncate(n * self.cols);
        }
    }

    /// Stack `other` below `self`.
    ///
    /// # Errors
    /// `DataShapeMismatch` if the column counts differ.
    pub fn vstack(&mut self, other: &Self) -> PipelineResult<()> {
        if other.cols != self.cols {
            return Err(PipelineError::DataShapeMismatch {
                expected: self.cols,
                found: other.cols,
            });
        }
        self.data.extend_from_slice(&other.data);
        self.rows += other.rows;
        Ok(())
    }

    /// Concatenate matrices column-wise (same row count).
    ///
    /// # Errors
    /// `DataShapeMismatch` if any block has a different row count.
    pub fn hstack(blocks: &[&Self]) -> PipelineResult<Self> {
        let rows = blocks.first().map_or(0, |b| b.rows);
        let cols: usize = blocks.iter().map(|b| b.cols).sum();
        let mut data = Vec::with_capacity(rows * cols);
        for b in blocks {
            if b.rows != rows {
                return Err(PipelineError::DataShapeMismatch {
                    expected: rows,
                    found: b.rows,
                });
            }
        }
        for r in 0..rows {
            for b in blocks {
                data.extend_from_slice(b.row(r));
            }
        }
        Ok(Self { rows, cols, data })
    }

    /// Copy of the columns in `range`.
    ///
    /// # Errors
    /// `Configuration` if the range falls outside the matrix.
    pub fn select_columns(&self, range: Range<usize>) -> PipelineResult<Self> {
        if range.start >= range.end || range.end > self.cols {
            return Err(PipelineError::Configuration(format!(
                "colonnes {}..{} hors de la matrice ({} colonnes)",
                range.start, range.end, self.cols
            )));
        }
        let cols = range.len();
        let mut data = Vec::with_capacity(self.rows * cols);
        for row in self.iter_rows() {
            data.extend_from_slice(&row[range.clone()]);
        }
        Ok(Self {
            rows: self.rows,
            cols,
            data,
        })
    }

    /// Copy of the rows at `indices`, in that order.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            rows: indices.len(),
            cols: self.cols,
            data,
        }
    }

    /// Raw row-major buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_rejects_wrong_length() {
        let mut m = FeatureMatrix::with_cols(3);
        assert!(m.push_row(&[1.0, 2.0, 3.0]).is_ok());
        assert_eq!(
            m.push_row(&[1.0]),
            Err(PipelineError::DataShapeMismatch {
                expected: 3,
                found: 1
            })
        );
        assert_eq!(m.rows(), 1);
    }

    #[test]
    fn hstack_interleaves_rows() {
        let a = FeatureMatrix::from_vec(2, 1, vec![1.0, 2.0]).expect("shape");
        let b = FeatureMatrix::from_vec(2, 2, vec![10.0, 11.0, 20.0, 21.0]).expect("shape");
        let m = FeatureMatrix::hstack(&[&a, &b]).expect("same rows");
        assert_eq!(m.cols(), 3);
        assert_eq!(m.row(0), &[1.0, 10.0, 11.0]);
        assert_eq!(m.row(1), &[2.0, 20.0, 21.0]);
    }

    #[test]
    fn hstack_rejects_row_mismatch() {
        let a = FeatureMatrix::zeros(2, 1);
        let b = FeatureMatrix::zeros(3, 1);
        assert!(matches!(
            FeatureMatrix::hstack(&[&a, &b]),
            Err(PipelineError::DataShapeMismatch { .. })
        ));
    }

    #[test]
    fn vstack_and_truncate() {
        let mut m = FeatureMatrix::with_cols(2);
        m.vstack(&FeatureMatrix::zeros(3, 2)).expect("same cols");
        m.vstack(&FeatureMatrix::zeros(2, 2)).expect("same cols");
        assert_eq!(m.rows(), 5);
        m.truncate_rows(4);
        assert_eq!(m.rows(), 4);
        assert_eq!(m.as_slice().len(), 8);
        assert!(m.vstack(&FeatureMatrix::zeros(1, 3)).is_err());
    }

    #[test]
    fn empty_matrix_keeps_its_width_on_vstack() {
        let mut m = FeatureMatrix::with_cols(2);
        assert_eq!(
            m.vstack(&FeatureMatrix::zeros(1, 3)),
            Err(PipelineError::DataShapeMismatch {
                expected: 2,
                found: 3
            })
        );
        assert_eq!((m.rows(), m.cols()), (0, 2));
    }

    #[test]
    fn select_columns_bounds() {
        let m = FeatureMatrix::from_vec(1, 4, vec![0.0, 1.0, 2.0, 3.0]).expect("shape");
        let s = m.select_columns(1..3).expect("in range");
        assert_eq!(s.row(0), &[1.0, 2.0]);
        assert!(m.select_columns(2..6).is_err());
    }
}
