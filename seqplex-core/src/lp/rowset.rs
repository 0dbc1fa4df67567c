//! Row set: sparse rows with left/right hand sides in lockstep.

use crate::algebra::{DVector, Key, SvSet, SvView};

/// The rows of an LP: the row-wise mirror of the constraint matrix plus
/// the activity bounds `lhs <= a_r x <= rhs` per row.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    vecs: SvSet,
    left: DVector,
    right: DVector,
}

impl RowSet {
    pub fn new() -> Self {
        Self {
            vecs: SvSet::new(),
            ..Default::default()
        }
    }

    pub fn num(&self) -> usize {
        self.vecs.num()
    }

    pub fn nnz(&self) -> usize {
        self.vecs.nnz()
    }

    pub fn add(&mut self, lhs: f64, row: SvView<'_>, rhs: f64) -> Key {
        let key = self.vecs.add(row);
        let n = self.num();
        self.left.re_dim(n);
        self.right.re_dim(n);
        self.left[n - 1] = lhs;
        self.right[n - 1] = rhs;
        key
    }

    pub fn create(&mut self, nnz: usize, lhs: f64, rhs: f64) -> Key {
        let key = self.vecs.create(nnz);
        let n = self.num();
        self.left.re_dim(n);
        self.right.re_dim(n);
        self.left[n - 1] = lhs;
        self.right[n - 1] = rhs;
        key
    }

    pub fn remove(&mut self, i: usize) {
        let last = self.num() - 1;
        self.vecs.remove(i);
        if i != last {
            self.left[i] = self.left[last];
            self.right[i] = self.right[last];
        }
        self.left.re_dim(last);
        self.right.re_dim(last);
    }

    pub fn remove_set(&mut self, nums: &[usize], perm: &mut [i32]) {
        let old = self.num();
        self.vecs.remove_set(nums, perm);
        for i in 0..old {
            let p = perm[i];
            if p >= 0 && p as usize != i {
                let p = p as usize;
                self.left[p] = self.left[i];
                self.right[p] = self.right[i];
            }
        }
        let n = self.num();
        self.left.re_dim(n);
        self.right.re_dim(n);
    }

    pub fn clear(&mut self) {
        self.vecs.clear();
        self.left.re_dim(0);
        self.right.re_dim(0);
    }

    pub fn row(&self, i: usize) -> SvView<'_> {
        self.vecs.view(i)
    }

    pub fn lhs(&self, i: usize) -> f64 {
        self.left[i]
    }

    pub fn rhs(&self, i: usize) -> f64 {
        self.right[i]
    }

    pub fn set_lhs(&mut self, i: usize, v: f64) {
        self.left[i] = v;
    }

    pub fn set_rhs(&mut self, i: usize, v: f64) {
        self.right[i] = v;
    }

    pub fn key(&self, i: usize) -> Key {
        self.vecs.key(i)
    }

    pub fn vecs_mut(&mut self) -> &mut SvSet {
        &mut self.vecs
    }
}
