//! Devex pricing.

use crate::algebra::DVector;

use super::{migrate_removed, migrate_removed_set, PriceCtx, Pricer, SimplexType, VarId};

/// Devex reference-weight pricer.
///
/// Maintains two nonnegative weight vectors: `penalty` over the
/// structural side and `co_penalty` over the row/basis side. Candidates
/// are scored by `test^2 / weight` and the weights are updated
/// multiplicatively after every pivot, approximating steepest-edge
/// weights at a fraction of the cost.
///
/// When any weight leaves the `(reset_lo, reset_hi]` corridor after an
/// update, the whole reference frame is reset to the initial weights.
/// The lower bound of 1 is surprising next to initial weights of 2 but
/// is kept as in the original scheme; both bounds are tunable.
#[derive(Debug, Clone)]
pub struct DevexPricer {
    penalty: DVector,
    co_penalty: DVector,
    last: f64,
    ty: SimplexType,
    epsilon: f64,
    pub reset_lo: f64,
    pub reset_hi: f64,
}

impl Default for DevexPricer {
    fn default() -> Self {
        Self::new()
    }
}

impl DevexPricer {
    pub fn new() -> Self {
        Self {
            penalty: DVector::new(0),
            co_penalty: DVector::new(0),
            last: 1.0,
            ty: SimplexType::Enter,
            epsilon: 1e-6,
            reset_lo: 1.0,
            reset_hi: 1e6,
        }
    }

    fn init_weight(&self) -> f64 {
        match self.ty {
            SimplexType::Enter => 2.0,
            SimplexType::Leave => 1.0,
        }
    }

    /// The weight of the last selected candidate.
    pub fn last_weight(&self) -> f64 {
        self.last
    }

    fn best_in<'a, I>(tests: &[f64], weights: &DVector, eps: f64, candidates: I) -> (f64, Option<usize>)
    where
        I: Iterator<Item = &'a usize>,
    {
        let mut bst_x = 0.0_f64;
        let mut bst_i = None;
        for &i in candidates {
            let t = tests[i];
            if t < -eps {
                let x = t * t / weights[i];
                if x > bst_x {
                    bst_x = x;
                    bst_i = Some(i);
                }
            }
        }
        (bst_x, bst_i)
    }
}

impl Pricer for DevexPricer {
    fn name(&self) -> &'static str {
        "Devex"
    }

    fn load(&mut self, dim: usize, co_dim: usize) {
        self.penalty.re_dim(0);
        self.co_penalty.re_dim(0);
        self.added_vecs(co_dim);
        self.added_co_vecs(dim);
    }

    fn set_representation(&mut self, _rep: crate::settings::Representation) {
        // Weight vectors are re-dimensioned through `load`; a pure
        // representation flip keeps the reference frame.
    }

    fn set_type(&mut self, ty: SimplexType) {
        self.ty = ty;
        match ty {
            SimplexType::Enter => {
                for i in 0..self.penalty.dim() {
                    self.penalty[i] = 2.0;
                }
                for i in 0..self.co_penalty.dim() {
                    self.co_penalty[i] = 2.0;
                }
            }
            SimplexType::Leave => {
                for i in 0..self.co_penalty.dim() {
                    self.co_penalty[i] = 1.0;
                }
            }
        }
    }

    fn set_epsilon(&mut self, eps: f64) {
        self.epsilon = eps;
    }

    fn added_vecs(&mut self, n: usize) {
        let old = self.penalty.dim();
        let init = self.init_weight();
        self.penalty.re_dim(old + n);
        // Only the new suffix is initialized; pre-existing weights are
        // preserved on growth.
        for i in old..old + n {
            self.penalty[i] = init;
        }
    }

    fn added_co_vecs(&mut self, n: usize) {
        let old = self.co_penalty.dim();
        let init = self.init_weight();
        self.co_penalty.re_dim(old + n);
        for i in old..old + n {
            self.co_penalty[i] = init;
        }
    }

    fn removed_vec(&mut self, i: usize) {
        migrate_removed(&mut self.penalty, i);
    }

    fn removed_co_vec(&mut self, i: usize) {
        migrate_removed(&mut self.co_penalty, i);
    }

    fn removed_vecs(&mut self, perm: &[i32]) {
        migrate_removed_set(&mut self.penalty, perm);
    }

    fn removed_co_vecs(&mut self, perm: &[i32]) {
        migrate_removed_set(&mut self.co_penalty, perm);
    }

    fn select_leave(&mut self, ctx: &PriceCtx<'_>) -> Option<usize> {
        let eps = self.epsilon.max(ctx.epsilon);
        let full: Vec<usize>;
        let candidates: &[usize] = match ctx.leave_candidates {
            Some(c) => c,
            None => {
                full = (0..ctx.f_test.len()).collect();
                &full
            }
        };
        let (_, best) = Self::best_in(ctx.f_test, &self.co_penalty, eps, candidates.iter());
        if let Some(i) = best {
            self.last = self.co_penalty[i];
        }
        best
    }

    fn select_enter(&mut self, ctx: &PriceCtx<'_>) -> Option<VarId> {
        let eps = self.epsilon.max(ctx.epsilon);
        let (full_cols, full_rows): (Vec<usize>, Vec<usize>);
        let (cols, rows): (&[usize], &[usize]) = match ctx.enter_candidates {
            Some((c, r)) => (c, r),
            None => {
                full_cols = (0..ctx.test.len()).collect();
                full_rows = (0..ctx.co_test.len()).collect();
                (&full_cols, &full_rows)
            }
        };
        let (_, best_co) = Self::best_in(ctx.co_test, &self.co_penalty, eps, rows.iter());
        let (_, best_str) = Self::best_in(ctx.test, &self.penalty, eps, cols.iter());

        // The structural-side winner is preferred when it exists.
        if let Some(j) = best_str {
            self.last = self.penalty[j];
            return Some(VarId::Col(j));
        }
        if let Some(r) = best_co {
            self.last = self.co_penalty[r];
            return Some(VarId::Row(r));
        }
        None
    }

    fn entered(&mut self, _id: VarId, n: usize, ctx: &PriceCtx<'_>) {
        if n >= self.co_penalty.dim() {
            return;
        }
        let rho_n = ctx.f_vec.delta().value(n);
        debug_assert!(rho_n != 0.0);
        let xi_p = self.last / (rho_n * rho_n);

        let co_delta = ctx.co_p_vec.delta();
        for &i in co_delta.indices() {
            let v = co_delta.value(i);
            self.co_penalty[i] += xi_p * v * v;
            if self.co_penalty[i] <= self.reset_lo || self.co_penalty[i] > self.reset_hi {
                self.set_type(SimplexType::Enter);
                return;
            }
        }
        let p_delta = ctx.p_vec.delta();
        for &i in p_delta.indices() {
            let v = p_delta.value(i);
            self.penalty[i] += xi_p * v * v;
            if self.penalty[i] <= self.reset_lo || self.penalty[i] > self.reset_hi {
                self.set_type(SimplexType::Enter);
                return;
            }
        }
    }

    fn left(&mut self, n: usize, _id: VarId, ctx: &PriceCtx<'_>) {
        let rho = ctx.f_vec.delta();
        let rho_n = rho.value(n);
        debug_assert!(rho_n != 0.0);
        let rhov_1 = 1.0 / rho_n;
        let beta_q = ctx.co_p_vec.delta().length2() * rhov_1 * rhov_1;

        for &j in rho.indices() {
            let x = rho.value(j);
            self.co_penalty[j] += x * x * beta_q;
        }
        self.co_penalty[n] = beta_q;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::UpdateVector;

    fn ctx<'a>(
        f_test: &'a [f64],
        test: &'a [f64],
        co_test: &'a [f64],
        f_vec: &'a UpdateVector,
        co_p_vec: &'a UpdateVector,
        p_vec: &'a UpdateVector,
    ) -> PriceCtx<'a> {
        PriceCtx {
            epsilon: 1e-9,
            f_test,
            test,
            co_test,
            f_vec,
            co_p_vec,
            p_vec,
            leave_candidates: None,
            enter_candidates: None,
        }
    }

    #[test]
    fn test_initial_weights() {
        let mut pr = DevexPricer::new();
        pr.load(3, 2);
        pr.set_type(SimplexType::Enter);
        assert_eq!(pr.penalty.as_slice(), &[2.0, 2.0]);
        assert_eq!(pr.co_penalty.as_slice(), &[2.0, 2.0, 2.0]);
        pr.set_type(SimplexType::Leave);
        assert_eq!(pr.co_penalty.as_slice(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_added_preserves_prefix() {
        let mut pr = DevexPricer::new();
        pr.load(2, 2);
        pr.set_type(SimplexType::Enter);
        pr.penalty[0] = 5.0;
        pr.added_vecs(2);
        assert_eq!(pr.penalty.as_slice(), &[5.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_select_leave_scores_by_weight() {
        let mut pr = DevexPricer::new();
        pr.load(3, 0);
        pr.set_type(SimplexType::Leave);
        pr.co_penalty[0] = 1.0;
        pr.co_penalty[1] = 100.0;
        pr.co_penalty[2] = 1.0;

        let fv = UpdateVector::new(3, 1e-16);
        let cv = UpdateVector::new(3, 1e-16);
        let pv = UpdateVector::new(0, 1e-16);
        // position 1 has the largest violation but a huge weight
        let f_test = [-1.0, -2.0, -0.5];
        let c = ctx(&f_test, &[], &[], &fv, &cv, &pv);
        assert_eq!(pr.select_leave(&c), Some(0));
        assert_eq!(pr.last_weight(), 1.0);
    }

    #[test]
    fn test_select_enter_prefers_structural() {
        let mut pr = DevexPricer::new();
        pr.load(2, 2);
        pr.set_type(SimplexType::Enter);

        let fv = UpdateVector::new(2, 1e-16);
        let cv = UpdateVector::new(2, 1e-16);
        let pv = UpdateVector::new(2, 1e-16);
        let test = [0.0, -1.0];
        let co_test = [-50.0, 0.0];
        let c = ctx(&[], &test, &co_test, &fv, &cv, &pv);
        // the row side has the far better score, but a structural
        // candidate exists and wins
        assert_eq!(pr.select_enter(&c), Some(VarId::Col(1)));

        let test_clean = [0.0, 0.0];
        let c = ctx(&[], &test_clean, &co_test, &fv, &cv, &pv);
        assert_eq!(pr.select_enter(&c), Some(VarId::Row(0)));

        let co_clean = [0.0, 0.0];
        let c = ctx(&[], &test_clean, &co_clean, &fv, &cv, &pv);
        assert_eq!(pr.select_enter(&c), None);
    }

    #[test]
    fn test_left_updates_co_penalty() {
        let mut pr = DevexPricer::new();
        pr.load(3, 0);
        pr.set_type(SimplexType::Leave);

        let mut fv = UpdateVector::new(3, 1e-16);
        // delta = [2, 0, 1], pivot at n = 0
        fv.delta_mut().set(0, 2.0);
        fv.delta_mut().set(2, 1.0);
        let mut cv = UpdateVector::new(3, 1e-16);
        cv.delta_mut().set(1, 2.0); // |coP delta|^2 = 4
        let pv = UpdateVector::new(0, 1e-16);
        let c = ctx(&[], &[], &[], &fv, &cv, &pv);

        pr.left(0, VarId::Row(0), &c);
        // beta = 4 / 2^2 = 1
        assert!((pr.co_penalty[2] - (1.0 + 1.0 * 1.0)).abs() < 1e-12);
        assert!((pr.co_penalty[0] - 1.0).abs() < 1e-12); // overwritten with beta
        assert!((pr.co_penalty[1] - 1.0).abs() < 1e-12); // not in delta support
    }

    #[test]
    fn test_weight_reset_on_extreme_update() {
        let mut pr = DevexPricer::new();
        pr.load(2, 1);
        pr.set_type(SimplexType::Enter);
        pr.last = 1e9; // force an explosive update

        let mut fv = UpdateVector::new(2, 1e-16);
        fv.delta_mut().set(0, 1.0);
        let mut cv = UpdateVector::new(2, 1e-16);
        cv.delta_mut().set(0, 1.0);
        let pv = UpdateVector::new(1, 1e-16);
        let c = ctx(&[], &[], &[], &fv, &cv, &pv);

        pr.entered(VarId::Col(0), 0, &c);
        // reset puts every weight back at the Enter initial value
        assert_eq!(pr.co_penalty.as_slice(), &[2.0, 2.0]);
        assert_eq!(pr.penalty.as_slice(), &[2.0]);
    }
}
