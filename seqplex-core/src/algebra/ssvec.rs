//! Semi-sparse vector: dense values plus a nonzero index set.

use super::idxset::IdxSet;
use super::sparse::SvView;

/// A dense vector paired with a set of indices covering its nonzeros.
///
/// Invariant: every index *outside* the set holds a value below the zero
/// tolerance. The set may be a superset of the true nonzeros. Mutations
/// that cannot maintain the invariant cheaply mark the vector unsynced;
/// [`setup`](SsVector::setup) rescans and rebuilds the set before the
/// next sparse-aware use.
#[derive(Debug, Clone)]
pub struct SsVector {
    val: Vec<f64>,
    idx: IdxSet,
    is_setup: bool,
    eps: f64,
}

impl SsVector {
    pub fn new(dim: usize, eps: f64) -> Self {
        Self {
            val: vec![0.0; dim],
            idx: IdxSet::new(dim),
            is_setup: true,
            eps,
        }
    }

    pub fn dim(&self) -> usize {
        self.val.len()
    }

    pub fn epsilon(&self) -> f64 {
        self.eps
    }

    pub fn re_dim(&mut self, dim: usize) {
        self.val.resize(dim, 0.0);
        self.idx.re_max(dim);
    }

    /// Whether the index set currently covers the nonzeros.
    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    /// Mark the index set stale after a dense mutation.
    pub fn unsync(&mut self) {
        self.is_setup = false;
    }

    /// Rebuild the index set by scanning the dense values against the
    /// zero tolerance.
    pub fn setup(&mut self) {
        self.idx.clear();
        for (i, &v) in self.val.iter().enumerate() {
            if v.abs() >= self.eps {
                self.idx.add(i);
            }
        }
        self.is_setup = true;
    }

    /// Number of indices in the set. Requires a synced vector.
    pub fn size(&self) -> usize {
        debug_assert!(self.is_setup);
        self.idx.size()
    }

    pub fn indices(&self) -> &IdxSet {
        debug_assert!(self.is_setup);
        &self.idx
    }

    pub fn value(&self, i: usize) -> f64 {
        self.val[i]
    }

    pub fn values(&self) -> &[f64] {
        &self.val
    }

    /// Set entry `i`, maintaining the index set.
    pub fn set(&mut self, i: usize, v: f64) {
        self.val[i] = v;
        if self.is_setup {
            if v.abs() >= self.eps {
                self.idx.add(i);
            } else {
                self.idx.remove(i);
                self.val[i] = 0.0;
            }
        }
    }

    /// Add `v` to entry `i`, maintaining the index set.
    pub fn add(&mut self, i: usize, v: f64) {
        let nv = self.val[i] + v;
        self.set(i, nv);
    }

    /// Raw mutable access to the dense values. Callers must `unsync` (or
    /// maintain the set themselves) after writing.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.val
    }

    /// `self = alpha * sv` in one pass, populating the index set.
    pub fn assign(&mut self, alpha: f64, sv: SvView<'_>) {
        self.clear();
        for nz in sv.iter() {
            let v = alpha * nz.val;
            if v.abs() >= self.eps {
                self.val[nz.idx] = v;
                self.idx.add(nz.idx);
            }
        }
        self.is_setup = true;
    }

    /// Copy from a dense slice, then rescan.
    pub fn assign_dense(&mut self, dense: &[f64]) {
        debug_assert_eq!(dense.len(), self.val.len());
        self.val.copy_from_slice(dense);
        self.setup();
    }

    /// Zero the vector. Touches only the support when synced.
    pub fn clear(&mut self) {
        if self.is_setup {
            for k in 0..self.idx.size() {
                self.val[self.idx.index(k)] = 0.0;
            }
            self.idx.clear();
        } else {
            self.val.fill(0.0);
            self.idx.clear();
            self.is_setup = true;
        }
    }

    /// Squared Euclidean norm over the support.
    pub fn length2(&self) -> f64 {
        debug_assert!(self.is_setup);
        self.idx
            .iter()
            .map(|&i| self.val[i] * self.val[i])
            .sum()
    }

    pub fn max_abs(&self) -> f64 {
        debug_assert!(self.is_setup);
        self.idx
            .iter()
            .map(|&i| self.val[i].abs())
            .fold(0.0_f64, f64::max)
    }

    /// Iterate over (index, value) pairs of the support.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        debug_assert!(self.is_setup);
        self.idx.iter().map(move |&i| (i, self.val[i]))
    }

    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        debug_assert!(self.is_setup);
        self.idx.iter().map(|&i| self.val[i] * dense[i]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::SVector;

    #[test]
    fn test_assign_and_clear() {
        let mut ss = SsVector::new(6, 1e-12);
        let s = SVector::from_entries(&[(1, 2.0), (4, -3.0)]);
        ss.assign(2.0, s.view());
        assert_eq!(ss.size(), 2);
        assert!((ss.value(1) - 4.0).abs() < 1e-12);
        assert!((ss.value(4) + 6.0).abs() < 1e-12);
        assert!((ss.length2() - 52.0).abs() < 1e-12);

        ss.clear();
        assert_eq!(ss.size(), 0);
        assert_eq!(ss.value(1), 0.0);
    }

    #[test]
    fn test_unsync_setup() {
        let mut ss = SsVector::new(4, 1e-12);
        ss.values_mut()[2] = 5.0;
        ss.values_mut()[3] = 1e-15;
        ss.unsync();
        assert!(!ss.is_setup());
        ss.setup();
        assert!(ss.is_setup());
        assert_eq!(ss.size(), 1);
        assert!(ss.indices().contains(2));
    }

    #[test]
    fn test_set_maintains_index_set() {
        let mut ss = SsVector::new(4, 1e-12);
        ss.set(1, 3.0);
        assert!(ss.indices().contains(1));
        ss.set(1, 0.0);
        assert!(!ss.indices().contains(1));
        ss.add(2, 1.5);
        ss.add(2, -1.5);
        assert!(!ss.indices().contains(2));
    }
}
