//! Bound-flipping ratio test (long-step dual).

use super::{
    dual_candidates, EnterCtx, EnterResult, LeaveCtx, LeaveResult, RatioTester,
    TextbookRatioTester,
};

/// Long-step dual ratio test.
///
/// Candidates are sorted by ratio; while the leaving variable's residual
/// infeasibility survives flipping the cheapest boxed candidate to its
/// opposite bound, the candidate is flipped instead of entered and the
/// dual step extends past its breakpoint. The first candidate that
/// cannot be flipped (or whose flip would overshoot the residual)
/// enters. The primal side is the textbook test.
#[derive(Debug, Clone, Default)]
pub struct BoundFlippingRatioTester {
    primal: TextbookRatioTester,
}

impl BoundFlippingRatioTester {
    pub fn new() -> Self {
        Self {
            primal: TextbookRatioTester::new(),
        }
    }
}

impl RatioTester for BoundFlippingRatioTester {
    fn name(&self) -> &'static str {
        "BoundFlipping"
    }

    fn select_leave(&mut self, ctx: &EnterCtx<'_>) -> EnterResult {
        self.primal.select_leave(ctx)
    }

    fn select_enter(&mut self, ctx: &LeaveCtx<'_>) -> LeaveResult {
        let mut cands = dual_candidates(ctx);
        if cands.is_empty() {
            return LeaveResult::NoCandidate;
        }
        cands.sort_by(|a, b| {
            a.ratio
                .partial_cmp(&b.ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.weight
                        .partial_cmp(&a.weight)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        let mut residual = ctx.infeas;
        let mut flips = Vec::new();
        for (k, c) in cands.iter().enumerate() {
            let is_last = k + 1 == cands.len();
            if c.flippable && !is_last {
                // Flipping this candidate absorbs |w| * range of the
                // leaving variable's infeasibility.
                let absorbed = c.weight * c.range;
                if residual - absorbed > ctx.eps_zero {
                    residual -= absorbed;
                    flips.push(c.id);
                    continue;
                }
            }
            return LeaveResult::Entering {
                entering: c.id,
                flips,
            };
        }
        unreachable!("last candidate always enters");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::SsVector;
    use crate::basis::VarStatus;
    use crate::pricer::VarId;

    const INF: f64 = 1e100;

    fn ctx<'a>(
        alpha_cols: &'a SsVector,
        d_cols: &'a [f64],
        status: &'a [VarStatus],
        lb: &'a [f64],
        ub: &'a [f64],
        alpha_rows: &'a SsVector,
        infeas: f64,
    ) -> LeaveCtx<'a> {
        LeaveCtx {
            alpha_cols,
            alpha_rows,
            d_cols,
            d_rows: &[],
            status,
            lb,
            ub,
            n: d_cols.len(),
            sign: 1.0,
            infeas,
            eps_zero: 1e-12,
            eps_pivot: 1e-10,
            opt_tol: 1e-9,
            infinity: INF,
            allow_col_flips: true,
            allow_row_flips: false,
        }
    }

    #[test]
    fn test_flips_extend_the_step() {
        // Candidate 0: ratio 1, boxed with range 1, |w| = 1 -> absorbs 1.
        // Candidate 1: ratio 2. With infeasibility 3, candidate 0 flips
        // and candidate 1 enters.
        let mut alpha = SsVector::new(2, 1e-16);
        alpha.set(0, 1.0);
        alpha.set(1, 1.0);
        let d = [1.0, 2.0];
        let status = [VarStatus::OnLower, VarStatus::OnLower];
        let lb = [0.0, 0.0];
        let ub = [1.0, INF];
        let arows = SsVector::new(0, 1e-16);

        let mut t = BoundFlippingRatioTester::new();
        let res = t.select_enter(&ctx(&alpha, &d, &status, &lb, &ub, &arows, 3.0));
        assert_eq!(
            res,
            LeaveResult::Entering {
                entering: VarId::Col(1),
                flips: vec![VarId::Col(0)]
            }
        );
    }

    #[test]
    fn test_no_flip_when_residual_would_vanish() {
        // Flipping would absorb the whole infeasibility: enter instead.
        let mut alpha = SsVector::new(2, 1e-16);
        alpha.set(0, 1.0);
        alpha.set(1, 1.0);
        let d = [1.0, 2.0];
        let status = [VarStatus::OnLower, VarStatus::OnLower];
        let lb = [0.0, 0.0];
        let ub = [10.0, INF];
        let arows = SsVector::new(0, 1e-16);

        let mut t = BoundFlippingRatioTester::new();
        let res = t.select_enter(&ctx(&alpha, &d, &status, &lb, &ub, &arows, 3.0));
        assert_eq!(
            res,
            LeaveResult::Entering {
                entering: VarId::Col(0),
                flips: vec![]
            }
        );
    }

    #[test]
    fn test_unboxed_candidates_never_flip() {
        let mut alpha = SsVector::new(2, 1e-16);
        alpha.set(0, 1.0);
        alpha.set(1, 1.0);
        let d = [1.0, 2.0];
        let status = [VarStatus::OnLower, VarStatus::OnLower];
        let lb = [0.0, 0.0];
        let ub = [INF, INF]; // nothing boxed
        let arows = SsVector::new(0, 1e-16);

        let mut t = BoundFlippingRatioTester::new();
        let res = t.select_enter(&ctx(&alpha, &d, &status, &lb, &ub, &arows, 100.0));
        assert_eq!(
            res,
            LeaveResult::Entering {
                entering: VarId::Col(0),
                flips: vec![]
            }
        );
    }
}
