//! Column set: sparse columns with objective and bounds in lockstep.

use crate::algebra::{DVector, Key, SvSet, SvView};

/// The structural columns of an LP: one sparse vector per column in an
/// arena, plus objective coefficient and lower/upper bound arrays kept
/// in lockstep with the vector set.
#[derive(Debug, Clone, Default)]
pub struct ColSet {
    vecs: SvSet,
    low: DVector,
    up: DVector,
    object: DVector,
}

impl ColSet {
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

    /// Append a column. Returns its stable key.
    pub fn add(&mut self, obj: f64, lower: f64, col: SvView<'_>, upper: f64) -> Key {
        let key = self.vecs.add(col);
        let n = self.num();
        self.low.re_dim(n);
        self.up.re_dim(n);
        self.object.re_dim(n);
        self.low[n - 1] = lower;
        self.up[n - 1] = upper;
        self.object[n - 1] = obj;
        key
    }

    /// Create a column in place with room for `nnz` entries.
    pub fn create(&mut self, nnz: usize, obj: f64, lower: f64, upper: f64) -> Key {
        let key = self.vecs.create(nnz);
        let n = self.num();
        self.low.re_dim(n);
        self.up.re_dim(n);
        self.object.re_dim(n);
        self.low[n - 1] = lower;
        self.up[n - 1] = upper;
        self.object[n - 1] = obj;
        key
    }

    /// Remove column `i`; the last column takes its place.
    pub fn remove(&mut self, i: usize) {
        let last = self.num() - 1;
        self.vecs.remove(i);
        if i != last {
            self.low[i] = self.low[last];
            self.up[i] = self.up[last];
            self.object[i] = self.object[last];
        }
        self.low.re_dim(last);
        self.up.re_dim(last);
        self.object.re_dim(last);
    }

    /// Remove the columns in `nums`; `perm[old] = new | -1` on return.
    pub fn remove_set(&mut self, nums: &[usize], perm: &mut [i32]) {
        let old = self.num();
        self.vecs.remove_set(nums, perm);
        for i in 0..old {
            let p = perm[i];
            if p >= 0 && p as usize != i {
                let p = p as usize;
                self.low[p] = self.low[i];
                self.up[p] = self.up[i];
                self.object[p] = self.object[i];
            }
        }
        let n = self.num();
        self.low.re_dim(n);
        self.up.re_dim(n);
        self.object.re_dim(n);
    }

    pub fn clear(&mut self) {
        self.vecs.clear();
        self.low.re_dim(0);
        self.up.re_dim(0);
        self.object.re_dim(0);
    }

    pub fn col(&self, i: usize) -> SvView<'_> {
        self.vecs.view(i)
    }

    pub fn lower(&self, i: usize) -> f64 {
        self.low[i]
    }

    pub fn upper(&self, i: usize) -> f64 {
        self.up[i]
    }

    pub fn obj(&self, i: usize) -> f64 {
        self.object[i]
    }

    pub fn set_lower(&mut self, i: usize, v: f64) {
        self.low[i] = v;
    }

    pub fn set_upper(&mut self, i: usize, v: f64) {
        self.up[i] = v;
    }

    pub fn set_obj(&mut self, i: usize, v: f64) {
        self.object[i] = v;
    }

    pub fn key(&self, i: usize) -> Key {
        self.vecs.key(i)
    }

    pub fn slot_of(&self, key: Key) -> usize {
        self.vecs.slot_of(key)
    }

    pub fn vecs_mut(&mut self) -> &mut SvSet {
        &mut self.vecs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::SVector;

    #[test]
    fn test_lockstep_arrays() {
        let mut cs = ColSet::new();
        let c = SVector::from_entries(&[(0, 1.0)]);
        cs.add(2.0, 0.0, c.view(), 5.0);
        cs.add(-1.0, -1.0, c.view(), 1.0);
        assert_eq!(cs.num(), 2);
        assert_eq!(cs.obj(1), -1.0);
        assert_eq!(cs.lower(1), -1.0);
        assert_eq!(cs.upper(0), 5.0);

        cs.remove(0);
        assert_eq!(cs.num(), 1);
        assert_eq!(cs.obj(0), -1.0);
        assert_eq!(cs.upper(0), 1.0);
    }

    #[test]
    fn test_remove_set_migrates_bounds() {
        let mut cs = ColSet::new();
        let c = SVector::from_entries(&[(0, 1.0)]);
        for i in 0..4 {
            cs.add(i as f64, -(i as f64), c.view(), 10.0 + i as f64);
        }
        let mut perm = vec![0i32; 4];
        cs.remove_set(&[0, 2], &mut perm);
        assert_eq!(cs.num(), 2);
        assert_eq!(cs.obj(0), 1.0);
        assert_eq!(cs.obj(1), 3.0);
        assert_eq!(cs.lower(1), -3.0);
    }
}
