//! Textbook ratio test with a two-pass stabilization.

use super::{dual_candidates, EnterCtx, EnterResult, LeaveCtx, LeaveResult, RatioTester};

/// Single-step ratio test.
///
/// The primal side runs two passes: the first relaxes every bound by the
/// feasibility tolerance to find the admissible step, the second picks
/// the largest pivot among the blocking candidates within that step.
/// The dual side picks the minimum ratio with the same largest-pivot
/// tie-break and never flips bounds.
#[derive(Debug, Clone, Default)]
pub struct TextbookRatioTester;

impl TextbookRatioTester {
    pub fn new() -> Self {
        Self
    }
}

impl RatioTester for TextbookRatioTester {
    fn name(&self) -> &'static str {
        "Textbook"
    }

    fn select_leave(&mut self, ctx: &EnterCtx<'_>) -> EnterResult {
        // Pass 1: admissible step with bounds relaxed by feas_tol.
        let mut theta_max = ctx.max_step;
        for (i, r) in ctx.rate.iter_nonzero() {
            if r.abs() < ctx.eps_zero {
                continue;
            }
            let x = ctx.values[i];
            let t = if r > 0.0 {
                if ctx.ub[i] >= ctx.infinity {
                    continue;
                }
                (ctx.ub[i] - x + ctx.feas_tol) / r
            } else {
                if ctx.lb[i] <= -ctx.infinity {
                    continue;
                }
                (ctx.lb[i] - x - ctx.feas_tol) / r
            };
            if t < theta_max {
                theta_max = t;
            }
        }

        if theta_max >= ctx.infinity {
            return EnterResult::Unbounded;
        }

        // Pass 2: among candidates blocking within theta_max, prefer the
        // largest pivot magnitude.
        let mut best: Option<(usize, f64, f64)> = None; // (pos, strict step, |pivot|)
        for (i, r) in ctx.rate.iter_nonzero() {
            if r.abs() < ctx.eps_zero {
                continue;
            }
            let x = ctx.values[i];
            let t = if r > 0.0 {
                if ctx.ub[i] >= ctx.infinity {
                    continue;
                }
                (ctx.ub[i] - x) / r
            } else {
                if ctx.lb[i] <= -ctx.infinity {
                    continue;
                }
                (ctx.lb[i] - x) / r
            };
            if t <= theta_max {
                let better = match best {
                    None => true,
                    Some((_, _, bw)) => r.abs() > bw,
                };
                if better {
                    best = Some((i, t.max(0.0), r.abs()));
                }
            }
        }

        match best {
            Some((pos, step, _)) => EnterResult::Blocked { pos, step },
            None => {
                // Only the entering variable's own bound blocks.
                if ctx.max_step >= ctx.infinity {
                    EnterResult::Unbounded
                } else {
                    EnterResult::BoundFlip {
                        step: ctx.max_step,
                    }
                }
            }
        }
    }

    fn select_enter(&mut self, ctx: &LeaveCtx<'_>) -> LeaveResult {
        let cands = dual_candidates(ctx);
        if cands.is_empty() {
            return LeaveResult::NoCandidate;
        }
        let theta = cands.iter().map(|c| c.ratio).fold(f64::INFINITY, f64::min);
        // Largest pivot within tolerance of the minimum ratio.
        let mut best = &cands[0];
        for c in &cands {
            let near = c.ratio <= theta + ctx.opt_tol;
            if near && (best.ratio > theta + ctx.opt_tol || c.weight > best.weight) {
                best = c;
            }
        }
        LeaveResult::Entering {
            entering: best.id,
            flips: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::SsVector;
    use crate::basis::VarStatus;
    use crate::pricer::VarId;

    const INF: f64 = 1e100;

    fn enter_ctx<'a>(
        rate: &'a SsVector,
        values: &'a [f64],
        lb: &'a [f64],
        ub: &'a [f64],
        max_step: f64,
    ) -> EnterCtx<'a> {
        EnterCtx {
            rate,
            values,
            lb,
            ub,
            max_step,
            eps_zero: 1e-12,
            eps_pivot: 1e-10,
            feas_tol: 1e-9,
            infinity: INF,
        }
    }

    #[test]
    fn test_blocking_bound() {
        let mut rate = SsVector::new(3, 1e-16);
        rate.set(0, -1.0); // x0 decreases toward lb 0
        rate.set(2, 1.0); // x2 increases toward ub 10
        let values = [3.0, 5.0, 8.0];
        let lb = [0.0, 0.0, 0.0];
        let ub = [INF, INF, 10.0];

        let mut t = TextbookRatioTester::new();
        let res = t.select_leave(&enter_ctx(&rate, &values, &lb, &ub, INF));
        // x2 blocks at step 2, x0 at step 3
        assert_eq!(res, EnterResult::Blocked { pos: 2, step: 2.0 });
    }

    #[test]
    fn test_unbounded_direction() {
        let mut rate = SsVector::new(2, 1e-16);
        rate.set(0, 1.0);
        let values = [1.0, 0.0];
        let lb = [0.0, 0.0];
        let ub = [INF, INF];

        let mut t = TextbookRatioTester::new();
        let res = t.select_leave(&enter_ctx(&rate, &values, &lb, &ub, INF));
        assert_eq!(res, EnterResult::Unbounded);
    }

    #[test]
    fn test_entering_bound_flip() {
        let mut rate = SsVector::new(1, 1e-16);
        rate.set(0, 1.0);
        let values = [0.0];
        let lb = [0.0];
        let ub = [100.0];

        let mut t = TextbookRatioTester::new();
        // entering range 5 blocks before the basic bound at 100
        let res = t.select_leave(&enter_ctx(&rate, &values, &lb, &ub, 5.0));
        assert_eq!(res, EnterResult::BoundFlip { step: 5.0 });
    }

    #[test]
    fn test_pivot_preference_on_ties() {
        // Two rows block at the same step; the larger pivot wins.
        let mut rate = SsVector::new(2, 1e-16);
        rate.set(0, -0.5);
        rate.set(1, -2.0);
        let values = [1.0, 4.0];
        let lb = [0.0, 0.0];
        let ub = [INF, INF];

        let mut t = TextbookRatioTester::new();
        let res = t.select_leave(&enter_ctx(&rate, &values, &lb, &ub, INF));
        assert_eq!(res, EnterResult::Blocked { pos: 1, step: 2.0 });
    }

    #[test]
    fn test_dual_min_ratio() {
        let mut alpha_cols = SsVector::new(2, 1e-16);
        alpha_cols.set(0, 1.0);
        alpha_cols.set(1, 2.0);
        let alpha_rows = SsVector::new(1, 1e-16);
        let d_cols = [3.0, 2.0];
        let d_rows = [0.0];
        let status = [
            VarStatus::OnLower,
            VarStatus::OnLower,
            VarStatus::Basic,
        ];
        let lb = [0.0, 0.0, 0.0];
        let ub = [INF, INF, INF];

        let ctx = LeaveCtx {
            alpha_cols: &alpha_cols,
            alpha_rows: &alpha_rows,
            d_cols: &d_cols,
            d_rows: &d_rows,
            status: &status,
            lb: &lb,
            ub: &ub,
            n: 2,
            sign: 1.0,
            infeas: 1.0,
            eps_zero: 1e-12,
            eps_pivot: 1e-10,
            opt_tol: 1e-9,
            infinity: INF,
            allow_col_flips: false,
            allow_row_flips: false,
        };
        let mut t = TextbookRatioTester::new();
        // ratios: col0 = 3, col1 = 1 -> col1 enters
        assert_eq!(
            t.select_enter(&ctx),
            LeaveResult::Entering {
                entering: VarId::Col(1),
                flips: vec![]
            }
        );
    }

    #[test]
    fn test_dual_no_candidate() {
        let mut alpha_cols = SsVector::new(1, 1e-16);
        alpha_cols.set(0, -1.0); // wrong sign for an OnLower candidate
        let alpha_rows = SsVector::new(0, 1e-16);
        let d_cols = [1.0];
        let status = [VarStatus::OnLower];
        let lb = [0.0];
        let ub = [INF];

        let ctx = LeaveCtx {
            alpha_cols: &alpha_cols,
            alpha_rows: &alpha_rows,
            d_cols: &d_cols,
            d_rows: &[],
            status: &status,
            lb: &lb,
            ub: &ub,
            n: 1,
            sign: 1.0,
            infeas: 1.0,
            eps_zero: 1e-12,
            eps_pivot: 1e-10,
            opt_tol: 1e-9,
            infinity: INF,
            allow_col_flips: false,
            allow_row_flips: false,
        };
        let mut t = TextbookRatioTester::new();
        assert_eq!(t.select_enter(&ctx), LeaveResult::NoCandidate);
    }
}
