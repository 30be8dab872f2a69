//! Domain types for the banker simulation.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Index of a client row in the ledger.
pub type ClientId = usize;

/// One unit count per resource type.
///
/// `SmallVec<[u32; 8]>` keeps the common few-resource case off the heap.
pub type ResourceVector = SmallVec<[u32; 8]>;

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

/// Owned row-major `rows x cols` matrix of unit counts.
///
/// Dimensions are fixed at construction; rows are handed out as slices so
/// hot loops index without further bounds bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// Builds a matrix from nested rows. Every row must have the same length.
    pub fn from_rows<R: AsRef<[u32]>>(rows: &[R]) -> Option<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return None;
            }
            data.extend_from_slice(row);
        }
        Some(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[u32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [u32] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.data[i * self.cols + j]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[u32]> {
        // Chunk size must be non-zero; a zero-width matrix has no data anyway.
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Sum of column `j` across all rows.
    pub fn column_sum(&self, j: usize) -> u64 {
        self.iter_rows().map(|row| u64::from(row[j])).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_rejects_ragged() {
        assert!(Matrix::from_rows(&[vec![1, 2], vec![3]]).is_none());
    }

    #[test]
    fn rows_are_row_major() {
        let m = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6]]).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert_eq!(m.row(1), &[4, 5, 6]);
        assert_eq!(m.get(0, 2), 3);
        assert_eq!(m.column_sum(1), 7);
    }

    #[test]
    fn row_mut_touches_only_that_row() {
        let mut m = Matrix::zeros(3, 2);
        m.row_mut(1)[0] = 9;
        assert_eq!(m.row(0), &[0, 0]);
        assert_eq!(m.row(1), &[9, 0]);
        assert_eq!(m.row(2), &[0, 0]);
        assert_eq!(m.iter_rows().count(), 3);
    }
}
