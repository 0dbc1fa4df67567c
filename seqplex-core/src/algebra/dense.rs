//! Dense real vector.

use std::ops::{AddAssign, Index, IndexMut, MulAssign, SubAssign};

use super::sparse::SvView;
use super::ssvec::SsVector;

/// Fixed-dimension dense vector of reals.
///
/// Supports in-place addition and subtraction, scalar scaling, dot
/// products, and `mult_add` with a sparse vector that visits only the
/// sparse entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DVector {
    val: Vec<f64>,
}

impl DVector {
    pub fn new(dim: usize) -> Self {
        Self { val: vec![0.0; dim] }
    }

    pub fn from_slice(v: &[f64]) -> Self {
        Self { val: v.to_vec() }
    }

    pub fn dim(&self) -> usize {
        self.val.len()
    }

    /// Grow or truncate to `dim`, preserving the prefix. New entries are
    /// zero.
    pub fn re_dim(&mut self, dim: usize) {
        self.val.resize(dim, 0.0);
    }

    /// Set all entries to zero.
    pub fn clear(&mut self) {
        self.val.fill(0.0);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.val
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.val
    }

    /// `self += alpha * sv`, visiting only the nonzeros of `sv`.
    pub fn mult_add(&mut self, alpha: f64, sv: SvView<'_>) {
        for nz in sv.iter() {
            self.val[nz.idx] += alpha * nz.val;
        }
    }

    /// `self += alpha * sv` over the support of a semi-sparse vector.
    pub fn mult_add_ss(&mut self, alpha: f64, sv: &SsVector) {
        for &i in sv.indices() {
            self.val[i] += alpha * sv.value(i);
        }
    }

    pub fn dot(&self, other: &DVector) -> f64 {
        debug_assert_eq!(self.dim(), other.dim());
        self.val
            .iter()
            .zip(other.val.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Squared Euclidean norm.
    pub fn length2(&self) -> f64 {
        self.val.iter().map(|v| v * v).sum()
    }

    /// Infinity norm.
    pub fn max_abs(&self) -> f64 {
        self.val.iter().map(|v| v.abs()).fold(0.0_f64, f64::max)
    }
}

impl Index<usize> for DVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.val[i]
    }
}

impl IndexMut<usize> for DVector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.val[i]
    }
}

impl AddAssign<&DVector> for DVector {
    fn add_assign(&mut self, rhs: &DVector) {
        debug_assert_eq!(self.dim(), rhs.dim());
        for (a, b) in self.val.iter_mut().zip(rhs.val.iter()) {
            *a += b;
        }
    }
}

impl SubAssign<&DVector> for DVector {
    fn sub_assign(&mut self, rhs: &DVector) {
        debug_assert_eq!(self.dim(), rhs.dim());
        for (a, b) in self.val.iter_mut().zip(rhs.val.iter()) {
            *a -= b;
        }
    }
}

impl MulAssign<f64> for DVector {
    fn mul_assign(&mut self, s: f64) {
        for a in self.val.iter_mut() {
            *a *= s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::SVector;

    #[test]
    fn test_re_dim_preserves_prefix() {
        let mut v = DVector::from_slice(&[1.0, 2.0, 3.0]);
        v.re_dim(5);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0, 0.0, 0.0]);
        v.re_dim(2);
        assert_eq!(v.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_ops() {
        let mut a = DVector::from_slice(&[1.0, 2.0]);
        let b = DVector::from_slice(&[3.0, -1.0]);
        a += &b;
        assert_eq!(a.as_slice(), &[4.0, 1.0]);
        a -= &b;
        assert_eq!(a.as_slice(), &[1.0, 2.0]);
        a *= 2.0;
        assert_eq!(a.as_slice(), &[2.0, 4.0]);
        assert!((a.dot(&b) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mult_add_sparse() {
        let mut v = DVector::new(4);
        let mut s = SVector::with_capacity(2);
        s.add(1, 2.0);
        s.add(3, -1.0);
        v.mult_add(3.0, s.view());
        assert_eq!(v.as_slice(), &[0.0, 6.0, 0.0, -3.0]);
    }
}
