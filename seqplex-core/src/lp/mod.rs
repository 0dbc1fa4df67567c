//! LP data model.
//!
//! An [`LpModel`] holds the objective, the constraint matrix, and all
//! bounds in the computational form
//!
//! ```text
//! minimize/maximize  c^T x + offset
//! subject to         lhs <= A x <= rhs
//!                    lo  <=  x  <= up
//! ```
//!
//! The matrix is stored twice: column-wise (the arena-backed column set
//! that backs pricing and basis columns) and row-wise (the mirror needed
//! by the dual update kernel). All mutators keep the two in sync.

pub mod colset;
pub mod rowset;

use sprs::{CsMat, TriMat};
use thiserror::Error;

use crate::algebra::{SVector, SvView};

pub use colset::ColSet;
pub use rowset::RowSet;

/// Objective sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

/// Ill-formed input detected by the model mutators.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("column {col}: lower bound {lo} exceeds upper bound {up}")]
    BoundReversal { col: usize, lo: f64, up: f64 },

    #[error("row {row}: left-hand side {lhs} exceeds right-hand side {rhs}")]
    SideReversal { row: usize, lhs: f64, rhs: f64 },

    #[error("duplicate index {index} in sparse vector")]
    DuplicateIndex { index: usize },

    #[error("index {index} out of range (dimension {dim})")]
    IndexOutOfRange { index: usize, dim: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// The LP problem data.
#[derive(Debug, Clone, Default)]
pub struct LpModel {
    cols: ColSet,
    rows: RowSet,
    sense: Sense,
    offset: f64,
}

impl LpModel {
    pub fn new() -> Self {
        Self {
            cols: ColSet::new(),
            rows: RowSet::new(),
            sense: Sense::Minimize,
            offset: 0.0,
        }
    }

    pub fn num_cols(&self) -> usize {
        self.cols.num()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.num()
    }

    pub fn nnz(&self) -> usize {
        self.cols.nnz()
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn set_sense(&mut self, sense: Sense) {
        self.sense = sense;
    }

    pub fn obj_offset(&self) -> f64 {
        self.offset
    }

    pub fn set_obj_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn col(&self, j: usize) -> SvView<'_> {
        self.cols.col(j)
    }

    pub fn row(&self, r: usize) -> SvView<'_> {
        self.rows.row(r)
    }

    pub fn obj(&self, j: usize) -> f64 {
        self.cols.obj(j)
    }

    pub fn lower(&self, j: usize) -> f64 {
        self.cols.lower(j)
    }

    pub fn upper(&self, j: usize) -> f64 {
        self.cols.upper(j)
    }

    pub fn lhs(&self, r: usize) -> f64 {
        self.rows.lhs(r)
    }

    pub fn rhs(&self, r: usize) -> f64 {
        self.rows.rhs(r)
    }

    fn check_entries(entries: &[(usize, f64)], dim: usize) -> Result<(), ModelError> {
        for (k, &(i, _)) in entries.iter().enumerate() {
            if i >= dim {
                return Err(ModelError::IndexOutOfRange { index: i, dim });
            }
            if entries[..k].iter().any(|&(j, _)| j == i) {
                return Err(ModelError::DuplicateIndex { index: i });
            }
        }
        Ok(())
    }

    /// Append a structural column. Entries are (row, value) pairs.
    pub fn add_col(
        &mut self,
        obj: f64,
        lower: f64,
        entries: &[(usize, f64)],
        upper: f64,
    ) -> Result<usize, ModelError> {
        if lower > upper {
            return Err(ModelError::BoundReversal {
                col: self.num_cols(),
                lo: lower,
                up: upper,
            });
        }
        Self::check_entries(entries, self.num_rows())?;

        let sv = SVector::from_entries(entries);
        self.cols.add(obj, lower, sv.view(), upper);
        let j = self.num_cols() - 1;
        for &(r, v) in entries {
            self.rows.vecs_mut().add_entry(r, j, v);
        }
        Ok(j)
    }

    /// Append a row. Entries are (column, value) pairs.
    pub fn add_row(
        &mut self,
        lhs: f64,
        entries: &[(usize, f64)],
        rhs: f64,
    ) -> Result<usize, ModelError> {
        if lhs > rhs {
            return Err(ModelError::SideReversal {
                row: self.num_rows(),
                lhs,
                rhs,
            });
        }
        Self::check_entries(entries, self.num_cols())?;

        let sv = SVector::from_entries(entries);
        self.rows.add(lhs, sv.view(), rhs);
        let r = self.num_rows() - 1;
        for &(j, v) in entries {
            self.cols.vecs_mut().add_entry(j, r, v);
        }
        Ok(r)
    }

    /// Remove column `j`. The last column takes its number.
    pub fn remove_col(&mut self, j: usize) -> Result<(), ModelError> {
        let n = self.num_cols();
        if j >= n {
            return Err(ModelError::IndexOutOfRange { index: j, dim: n });
        }
        let last = n - 1;
        let touched: Vec<usize> = self.cols.col(j).iter().map(|nz| nz.idx).collect();
        let moved: Vec<usize> = self.cols.col(last).iter().map(|nz| nz.idx).collect();

        self.cols.remove(j);
        for &r in &touched {
            self.rows.vecs_mut().remove_entry(r, j);
        }
        if j != last {
            for &r in &moved {
                self.rows.vecs_mut().renumber_entry(r, last, j);
            }
        }
        Ok(())
    }

    /// Remove row `r`. The last row takes its number.
    pub fn remove_row(&mut self, r: usize) -> Result<(), ModelError> {
        let m = self.num_rows();
        if r >= m {
            return Err(ModelError::IndexOutOfRange { index: r, dim: m });
        }
        let last = m - 1;
        let touched: Vec<usize> = self.rows.row(r).iter().map(|nz| nz.idx).collect();
        let moved: Vec<usize> = self.rows.row(last).iter().map(|nz| nz.idx).collect();

        self.rows.remove(r);
        for &j in &touched {
            self.cols.vecs_mut().remove_entry(j, r);
        }
        if r != last {
            for &j in &moved {
                self.cols.vecs_mut().renumber_entry(j, last, r);
            }
        }
        Ok(())
    }

    /// Remove a set of columns. Returns the permutation `perm[old] = new`
    /// (`-1` for removed columns) so callers can migrate per-column state.
    pub fn remove_cols(&mut self, nums: &[usize]) -> Result<Vec<i32>, ModelError> {
        let n = self.num_cols();
        for &j in nums {
            if j >= n {
                return Err(ModelError::IndexOutOfRange { index: j, dim: n });
            }
        }
        let mut perm = vec![0i32; n];
        self.cols.remove_set(nums, &mut perm);
        for r in 0..self.num_rows() {
            self.rows.vecs_mut().permute_entries(r, &perm);
        }
        Ok(perm)
    }

    /// Remove a set of rows, returning the row permutation.
    pub fn remove_rows(&mut self, nums: &[usize]) -> Result<Vec<i32>, ModelError> {
        let m = self.num_rows();
        for &r in nums {
            if r >= m {
                return Err(ModelError::IndexOutOfRange { index: r, dim: m });
            }
        }
        let mut perm = vec![0i32; m];
        self.rows.remove_set(nums, &mut perm);
        for j in 0..self.num_cols() {
            self.cols.vecs_mut().permute_entries(j, &perm);
        }
        Ok(perm)
    }

    pub fn clear(&mut self) {
        self.cols.clear();
        self.rows.clear();
        self.offset = 0.0;
        self.sense = Sense::Minimize;
    }

    pub fn change_obj(&mut self, j: usize, v: f64) -> Result<(), ModelError> {
        self.check_col(j)?;
        self.cols.set_obj(j, v);
        Ok(())
    }

    pub fn change_bounds(&mut self, j: usize, lo: f64, up: f64) -> Result<(), ModelError> {
        self.check_col(j)?;
        if lo > up {
            return Err(ModelError::BoundReversal { col: j, lo, up });
        }
        self.cols.set_lower(j, lo);
        self.cols.set_upper(j, up);
        Ok(())
    }

    pub fn change_lower(&mut self, j: usize, lo: f64) -> Result<(), ModelError> {
        self.check_col(j)?;
        if lo > self.cols.upper(j) {
            return Err(ModelError::BoundReversal {
                col: j,
                lo,
                up: self.cols.upper(j),
            });
        }
        self.cols.set_lower(j, lo);
        Ok(())
    }

    pub fn change_upper(&mut self, j: usize, up: f64) -> Result<(), ModelError> {
        self.check_col(j)?;
        if self.cols.lower(j) > up {
            return Err(ModelError::BoundReversal {
                col: j,
                lo: self.cols.lower(j),
                up,
            });
        }
        self.cols.set_upper(j, up);
        Ok(())
    }

    pub fn change_range(&mut self, r: usize, lhs: f64, rhs: f64) -> Result<(), ModelError> {
        self.check_row(r)?;
        if lhs > rhs {
            return Err(ModelError::SideReversal { row: r, lhs, rhs });
        }
        self.rows.set_lhs(r, lhs);
        self.rows.set_rhs(r, rhs);
        Ok(())
    }

    pub fn change_lhs(&mut self, r: usize, lhs: f64) -> Result<(), ModelError> {
        self.check_row(r)?;
        if lhs > self.rows.rhs(r) {
            return Err(ModelError::SideReversal {
                row: r,
                lhs,
                rhs: self.rows.rhs(r),
            });
        }
        self.rows.set_lhs(r, lhs);
        Ok(())
    }

    pub fn change_rhs(&mut self, r: usize, rhs: f64) -> Result<(), ModelError> {
        self.check_row(r)?;
        if self.rows.lhs(r) > rhs {
            return Err(ModelError::SideReversal {
                row: r,
                lhs: self.rows.lhs(r),
                rhs,
            });
        }
        self.rows.set_rhs(r, rhs);
        Ok(())
    }

    fn check_col(&self, j: usize) -> Result<(), ModelError> {
        if j >= self.num_cols() {
            return Err(ModelError::IndexOutOfRange {
                index: j,
                dim: self.num_cols(),
            });
        }
        Ok(())
    }

    fn check_row(&self, r: usize) -> Result<(), ModelError> {
        if r >= self.num_rows() {
            return Err(ModelError::IndexOutOfRange {
                index: r,
                dim: self.num_rows(),
            });
        }
        Ok(())
    }

    /// Build a model from a CSC constraint matrix and the bound vectors.
    pub fn from_csc(
        a: &CsMat<f64>,
        obj: &[f64],
        lower: &[f64],
        upper: &[f64],
        lhs: &[f64],
        rhs: &[f64],
        sense: Sense,
    ) -> Result<Self, ModelError> {
        let (m, n) = (a.rows(), a.cols());
        for (name_len, expected) in [
            (obj.len(), n),
            (lower.len(), n),
            (upper.len(), n),
            (lhs.len(), m),
            (rhs.len(), m),
        ] {
            if name_len != expected {
                return Err(ModelError::DimensionMismatch {
                    expected,
                    got: name_len,
                });
            }
        }

        let a_csc;
        let a = if a.is_csc() {
            a
        } else {
            a_csc = a.to_csc();
            &a_csc
        };

        let mut lp = Self::new();
        lp.sense = sense;
        for r in 0..m {
            lp.add_row(lhs[r], &[], rhs[r])?;
        }
        for j in 0..n {
            let entries: Vec<(usize, f64)> = a
                .outer_view(j)
                .map(|cv| cv.iter().map(|(r, &v)| (r, v)).collect())
                .unwrap_or_default();
            lp.add_col(obj[j], lower[j], &entries, upper[j])?;
        }
        Ok(lp)
    }

    /// Export the constraint matrix as CSC.
    pub fn to_csc(&self) -> CsMat<f64> {
        let mut tri = TriMat::new((self.num_rows(), self.num_cols()));
        for j in 0..self.num_cols() {
            for nz in self.col(j).iter() {
                tri.add_triplet(nz.idx, j, nz.val);
            }
        }
        tri.to_csc()
    }

    /// Check bound and side coherence of the whole model.
    pub fn validate(&self) -> Result<(), ModelError> {
        for j in 0..self.num_cols() {
            if self.lower(j) > self.upper(j) {
                return Err(ModelError::BoundReversal {
                    col: j,
                    lo: self.lower(j),
                    up: self.upper(j),
                });
            }
        }
        for r in 0..self.num_rows() {
            if self.lhs(r) > self.rhs(r) {
                return Err(ModelError::SideReversal {
                    row: r,
                    lhs: self.lhs(r),
                    rhs: self.rhs(r),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inf() -> f64 {
        1e100
    }

    #[test]
    fn test_build_and_mirror() {
        let mut lp = LpModel::new();
        lp.add_row(1.0, &[], inf()).unwrap();
        lp.add_row(-inf(), &[], 4.0).unwrap();
        lp.add_col(1.0, 0.0, &[(0, 1.0), (1, 2.0)], inf()).unwrap();
        lp.add_col(2.0, 0.0, &[(0, 1.0)], inf()).unwrap();

        assert_eq!(lp.num_cols(), 2);
        assert_eq!(lp.num_rows(), 2);
        assert_eq!(lp.nnz(), 3);
        // row mirror sees both columns in row 0
        assert!((lp.row(0).get(0) - 1.0).abs() < 1e-12);
        assert!((lp.row(0).get(1) - 1.0).abs() < 1e-12);
        assert!((lp.row(1).get(0) - 2.0).abs() < 1e-12);
        assert_eq!(lp.row(1).get(1), 0.0);
    }

    #[test]
    fn test_remove_col_renumbers_mirror() {
        let mut lp = LpModel::new();
        lp.add_row(0.0, &[], 1.0).unwrap();
        lp.add_col(0.0, 0.0, &[(0, 1.0)], 1.0).unwrap();
        lp.add_col(0.0, 0.0, &[(0, 2.0)], 1.0).unwrap();
        lp.add_col(0.0, 0.0, &[(0, 3.0)], 1.0).unwrap();

        lp.remove_col(0).unwrap(); // col 2 becomes col 0
        assert_eq!(lp.num_cols(), 2);
        assert!((lp.row(0).get(0) - 3.0).abs() < 1e-12);
        assert!((lp.row(0).get(1) - 2.0).abs() < 1e-12);
        assert!((lp.col(0).get(0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_remove_rows_permutes_cols() {
        let mut lp = LpModel::new();
        for r in 0..3 {
            lp.add_row(0.0, &[], r as f64).unwrap();
        }
        lp.add_col(0.0, 0.0, &[(0, 1.0), (1, 2.0), (2, 3.0)], 1.0)
            .unwrap();
        let perm = lp.remove_rows(&[1]).unwrap();
        assert_eq!(perm, vec![0, -1, 1]);
        assert_eq!(lp.num_rows(), 2);
        assert!((lp.col(0).get(0) - 1.0).abs() < 1e-12);
        assert!((lp.col(0).get(1) - 3.0).abs() < 1e-12);
        assert_eq!(lp.col(0).size(), 2);
    }

    #[test]
    fn test_input_errors() {
        let mut lp = LpModel::new();
        lp.add_row(0.0, &[], 1.0).unwrap();
        assert!(matches!(
            lp.add_col(0.0, 2.0, &[], 1.0),
            Err(ModelError::BoundReversal { .. })
        ));
        assert!(matches!(
            lp.add_col(0.0, 0.0, &[(0, 1.0), (0, 2.0)], 1.0),
            Err(ModelError::DuplicateIndex { .. })
        ));
        assert!(matches!(
            lp.add_col(0.0, 0.0, &[(5, 1.0)], 1.0),
            Err(ModelError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_csc_round_trip() {
        let mut lp = LpModel::new();
        lp.add_row(1.0, &[], 2.0).unwrap();
        lp.add_row(0.0, &[], 5.0).unwrap();
        lp.add_col(1.0, 0.0, &[(0, 1.0), (1, -1.0)], 3.0).unwrap();
        lp.add_col(-2.0, -1.0, &[(1, 4.0)], 1.0).unwrap();

        let a = lp.to_csc();
        let obj: Vec<f64> = (0..2).map(|j| lp.obj(j)).collect();
        let lo: Vec<f64> = (0..2).map(|j| lp.lower(j)).collect();
        let up: Vec<f64> = (0..2).map(|j| lp.upper(j)).collect();
        let lhs: Vec<f64> = (0..2).map(|r| lp.lhs(r)).collect();
        let rhs: Vec<f64> = (0..2).map(|r| lp.rhs(r)).collect();

        let lp2 = LpModel::from_csc(&a, &obj, &lo, &up, &lhs, &rhs, Sense::Minimize).unwrap();
        assert_eq!(lp2.num_cols(), 2);
        assert_eq!(lp2.num_rows(), 2);
        assert_eq!(lp2.nnz(), 3);
        for j in 0..2 {
            assert_eq!(lp2.obj(j), lp.obj(j));
            assert_eq!(lp2.lower(j), lp.lower(j));
            assert_eq!(lp2.upper(j), lp.upper(j));
        }
        assert!((lp2.col(0).get(1) + 1.0).abs() < 1e-12);
        assert!((lp2.row(1).get(1) - 4.0).abs() < 1e-12);
    }
}
