//! Dantzig pricing: pick the most violated candidate.

use super::{PriceCtx, Pricer, SimplexType, VarId};

/// Textbook most-negative-test pricer. Carries no per-variable state,
/// so all structural-change callbacks are trivial.
#[derive(Debug, Clone, Default)]
pub struct DantzigPricer {
    epsilon: f64,
}

impl DantzigPricer {
    pub fn new() -> Self {
        Self { epsilon: 1e-6 }
    }

    fn most_negative<'a, I>(tests: &[f64], eps: f64, candidates: I) -> (f64, Option<usize>)
    where
        I: Iterator<Item = &'a usize>,
    {
        let mut best = -eps;
        let mut best_i = None;
        for &i in candidates {
            if tests[i] < best {
                best = tests[i];
                best_i = Some(i);
            }
        }
        (best, best_i)
    }
}

impl Pricer for DantzigPricer {
    fn name(&self) -> &'static str {
        "Dantzig"
    }

    fn load(&mut self, _dim: usize, _co_dim: usize) {}

    fn set_representation(&mut self, _rep: crate::settings::Representation) {}

    fn set_type(&mut self, _ty: SimplexType) {}

    fn set_epsilon(&mut self, eps: f64) {
        self.epsilon = eps;
    }

    fn added_vecs(&mut self, _n: usize) {}

    fn added_co_vecs(&mut self, _n: usize) {}

    fn removed_vec(&mut self, _i: usize) {}

    fn removed_co_vec(&mut self, _i: usize) {}

    fn removed_vecs(&mut self, _perm: &[i32]) {}

    fn removed_co_vecs(&mut self, _perm: &[i32]) {}

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
        Self::most_negative(ctx.f_test, eps, candidates.iter()).1
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
        let (best_c, col) = Self::most_negative(ctx.test, eps, cols.iter());
        let (best_r, row) = Self::most_negative(ctx.co_test, eps, rows.iter());
        match (col, row) {
            (Some(j), Some(r)) => {
                if best_c <= best_r {
                    Some(VarId::Col(j))
                } else {
                    Some(VarId::Row(r))
                }
            }
            (Some(j), None) => Some(VarId::Col(j)),
            (None, Some(r)) => Some(VarId::Row(r)),
            (None, None) => None,
        }
    }

    fn entered(&mut self, _id: VarId, _n: usize, _ctx: &PriceCtx<'_>) {}

    fn left(&mut self, _n: usize, _id: VarId, _ctx: &PriceCtx<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::UpdateVector;

    #[test]
    fn test_most_violated_wins() {
        let mut pr = DantzigPricer::new();
        pr.set_epsilon(1e-9);

        let fv = UpdateVector::new(0, 1e-16);
        let cv = UpdateVector::new(0, 1e-16);
        let pv = UpdateVector::new(0, 1e-16);
        let test = [-1.0, -3.0];
        let co_test = [-2.0, 0.0];
        let ctx = PriceCtx {
            epsilon: 1e-9,
            f_test: &[],
            test: &test,
            co_test: &co_test,
            f_vec: &fv,
            co_p_vec: &cv,
            p_vec: &pv,
            leave_candidates: None,
            enter_candidates: None,
        };
        assert_eq!(pr.select_enter(&ctx), Some(VarId::Col(1)));

        let f_test = [0.0, -0.5, -0.2];
        let ctx = PriceCtx {
            epsilon: 1e-9,
            f_test: &f_test,
            test: &[],
            co_test: &[],
            f_vec: &fv,
            co_p_vec: &cv,
            p_vec: &pv,
            leave_candidates: None,
            enter_candidates: None,
        };
        assert_eq!(pr.select_leave(&ctx), Some(1));
    }
}
