//! Dense vector with a pending scalar-times-sparse update.

use super::dense::DVector;
use super::idxset::IdxSet;
use super::ssvec::SsVector;

/// The pivot carrier: a dense vector `x`, a scalar `alpha`, and a
/// semi-sparse direction `delta`.
///
/// The logical value is `x + alpha * delta`, but the addition is
/// deferred: the ratio test reads `x` pre-update to select a step size,
/// the same step and direction then form the committed update, and the
/// pricer consults `delta` for its weight maintenance.
#[derive(Debug, Clone)]
pub struct UpdateVector {
    vec: DVector,
    val: f64,
    delta: SsVector,
}

impl UpdateVector {
    pub fn new(dim: usize, eps: f64) -> Self {
        Self {
            vec: DVector::new(dim),
            val: 0.0,
            delta: SsVector::new(dim, eps),
        }
    }

    pub fn dim(&self) -> usize {
        self.vec.dim()
    }

    /// The update multiplier `alpha`.
    pub fn value(&self) -> f64 {
        self.val
    }

    pub fn set_value(&mut self, v: f64) {
        self.val = v;
    }

    /// The update direction `delta`.
    pub fn delta(&self) -> &SsVector {
        &self.delta
    }

    pub fn delta_mut(&mut self) -> &mut SsVector {
        &mut self.delta
    }

    /// Nonzero indices of `delta`.
    pub fn idx(&self) -> &IdxSet {
        self.delta.indices()
    }

    /// The dense state `x`.
    pub fn vec(&self) -> &DVector {
        &self.vec
    }

    pub fn vec_mut(&mut self) -> &mut DVector {
        &mut self.vec
    }

    pub fn values(&self) -> &[f64] {
        self.vec.as_slice()
    }

    /// Fold the pending update into `x`: `x += alpha * delta`, touching
    /// only indices in `delta`'s support.
    pub fn apply(&mut self) {
        if self.val != 0.0 {
            self.vec.mult_add_ss(self.val, &self.delta);
        }
    }

    /// Reset `alpha` to zero and clear `delta`'s support.
    pub fn clear_update(&mut self) {
        self.val = 0.0;
        self.delta.clear();
    }

    /// Clear the dense state and the pending update.
    pub fn clear(&mut self) {
        self.vec.clear();
        self.clear_update();
    }

    /// Resize both the dense state and the direction.
    pub fn re_dim(&mut self, dim: usize) {
        self.vec.re_dim(dim);
        self.delta.re_dim(dim);
    }
}

impl std::ops::Index<usize> for UpdateVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.vec[i]
    }
}

impl std::ops::IndexMut<usize> for UpdateVector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.vec[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::SVector;

    #[test]
    fn test_deferred_apply() {
        let mut uv = UpdateVector::new(4, 1e-12);
        uv.vec_mut().as_mut_slice().copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let dir = SVector::from_entries(&[(0, 2.0), (3, -1.0)]);
        uv.delta_mut().assign(1.0, dir.view());
        uv.set_value(0.5);

        // x unchanged until apply
        assert_eq!(uv.values(), &[1.0, 1.0, 1.0, 1.0]);
        uv.apply();
        assert_eq!(uv.values(), &[2.0, 1.0, 1.0, 0.5]);

        uv.clear_update();
        assert_eq!(uv.value(), 0.0);
        assert_eq!(uv.delta().size(), 0);
        // dense state survives clear_update
        assert_eq!(uv.values(), &[2.0, 1.0, 1.0, 0.5]);

        uv.clear();
        assert_eq!(uv.values(), &[0.0; 4]);
    }

    #[test]
    fn test_re_dim_propagates() {
        let mut uv = UpdateVector::new(2, 1e-12);
        uv.re_dim(5);
        assert_eq!(uv.dim(), 5);
        assert_eq!(uv.delta().dim(), 5);
    }
}
