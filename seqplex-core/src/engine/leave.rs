//! The leaving iteration kernel (primal-infeasibility driven).

use std::time::Instant;

use crate::algebra::SsVector;
use crate::basis::VarStatus;
use crate::factor::UpdateVerdict;
use crate::pricer::{Pricer, SimplexType, VarId};
use crate::ratio::{LeaveCtx, LeaveResult};
use crate::status::Status;

use super::{Engine, Phase, MAX_TINY_PIVOT_ROUNDS};

/// Outcome of one attempted leaving step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    Pivoted,
    /// The violation was absorbed entirely by bound flips.
    FlippedOnly,
    Infeasible,
    Stale,
}

impl Engine {
    /// Recompute the primal feasibility test per basis position.
    pub(crate) fn compute_f_test(&mut self) {
        let tol = self.settings.feas_tol;
        let inf = self.settings.infinity;
        self.cand_leave.clear();
        for p in 0..self.m {
            let v = self.basis.var_at(p);
            let x = self.f_vec[p];
            let dlo = if self.lb[v] <= -inf {
                f64::INFINITY
            } else {
                x - self.lb[v]
            };
            let dup = if self.ub[v] >= inf {
                f64::INFINITY
            } else {
                self.ub[v] - x
            };
            let t = dlo.min(dup);
            self.f_test[p] = if t.is_finite() { t } else { 0.0 };
            if self.f_test[p] < -tol {
                self.cand_leave.push(p);
            }
        }
    }

    /// Fill the test arrays with raw reduced costs for the dual ratio
    /// test.
    fn compute_raw_reduced_costs(&mut self) {
        for j in 0..self.n {
            self.test[j] = self.cost_of(j) - self.p_vec[j];
        }
        for r in 0..self.m {
            self.co_test[r] = self.co_p_vec[r];
        }
    }

    /// Run leaving iterations until primal feasibility, a verdict, or a
    /// limit.
    pub(crate) fn leave_loop(&mut self, t0: &Instant) -> Phase {
        let mut pricer = self.take_pricer();
        pricer.set_type(SimplexType::Leave);
        let phase = loop {
            if let Some(ph) = self.hit_limit(t0) {
                break ph;
            }
            if !self.progress_checkpoint() {
                break Phase::Terminal;
            }
            self.f_vec.clear_update();
            self.co_p_vec.clear_update();
            self.p_vec.clear_update();
            self.compute_f_test();

            let selected = pricer.select_leave(&self.price_ctx());
            let p = match selected {
                Some(p) => p,
                None => {
                    if self.factor_mut().updates() > 0 {
                        if !self.refactor_and_recompute() {
                            break Phase::Terminal;
                        }
                        self.compute_f_test();
                        match pricer.select_leave(&self.price_ctx()) {
                            Some(p) => p,
                            None => break Phase::Done,
                        }
                    } else {
                        break Phase::Done;
                    }
                }
            };

            match self.leave_iterate(p, pricer.as_mut()) {
                StepOutcome::Pivoted | StepOutcome::FlippedOnly => {
                    self.count_iteration();
                }
                StepOutcome::Infeasible => {
                    self.status = Status::Infeasible;
                    break Phase::Terminal;
                }
                StepOutcome::Stale => {
                    if self.factor_mut().updates() > 0 {
                        if !self.refactor_and_recompute() {
                            break Phase::Terminal;
                        }
                    } else {
                        self.tiny_pivot_rounds += 1;
                        if self.tiny_pivot_rounds >= MAX_TINY_PIVOT_ROUNDS {
                            self.status = Status::Singular;
                            break Phase::Terminal;
                        }
                        // The stalled pivot involves the leaving
                        // variable and the nonbasic candidates of its
                        // pivot row.
                        let mut vars: Vec<usize> =
                            self.p_vec.delta().indices().iter().copied().collect();
                        for &r in self.alpha_rows.indices() {
                            vars.push(self.n + r);
                        }
                        vars.push(self.basis.var_at(p));
                        self.perturb_stalled(&vars);
                        self.compute_fvec();
                    }
                }
            }
        };
        self.put_pricer(pricer);
        phase
    }

    /// One leaving step with the basic variable at position `p`.
    fn leave_iterate(&mut self, p: usize, pricer: &mut dyn Pricer) -> StepOutcome {
        let eps = self.settings.epsilon_zero;
        let inf = self.settings.infinity;
        let w = self.basis.var_at(p);
        let x_p = self.f_vec[p];

        // Which bound is violated decides the direction of repair.
        let below = self.lb[w] > -inf && x_p < self.lb[w];
        let (sigma, target) = if below {
            (1.0, self.lb[w])
        } else {
            (-1.0, self.ub[w])
        };
        let mut infeas = (target - x_p).abs();

        // rho = B^-T e_p, the row of the inverse behind the pivot row.
        let mut rho = std::mem::replace(&mut self.rhs_work, SsVector::new(0, eps));
        rho.clear();
        rho.set(p, 1.0);
        self.factor_mut().solve_left(&mut rho);

        self.co_p_vec.delta_mut().clear();
        for (r, val) in rho.iter_nonzero() {
            self.co_p_vec.delta_mut().set(r, val);
        }

        // Pivot row: alpha over structural columns and logicals.
        self.p_vec.delta_mut().clear();
        for (r, yr) in rho.iter_nonzero() {
            for nz in self.wlp.row(r).iter() {
                self.p_vec.delta_mut().add(nz.idx, yr * nz.val);
            }
        }
        self.alpha_rows.clear();
        for (r, yr) in rho.iter_nonzero() {
            self.alpha_rows.set(r, -yr);
        }

        self.compute_raw_reduced_costs();

        let mut ratio = self.take_ratio();
        let result = {
            let ctx = LeaveCtx {
                alpha_cols: self.p_vec.delta(),
                alpha_rows: &self.alpha_rows,
                d_cols: &self.test,
                d_rows: &self.co_test,
                status: self.basis.statuses(),
                lb: &self.lb,
                ub: &self.ub,
                n: self.n,
                sign: -sigma,
                infeas,
                eps_zero: self.settings.epsilon_zero,
                eps_pivot: self.settings.epsilon_pivot,
                opt_tol: self.settings.opt_tol,
                infinity: inf,
                allow_col_flips: true,
                allow_row_flips: self.settings.row_bound_flips,
            };
            ratio.select_enter(&ctx)
        };
        self.put_ratio(ratio);

        let outcome = match result {
            LeaveResult::NoCandidate => {
                // Farkas certificate: the violated row combination
                // scaled toward the impossible side.
                let mut farkas = vec![0.0; self.m];
                for (r, val) in rho.iter_nonzero() {
                    farkas[r] = -sigma * val;
                }
                self.work_farkas = Some(farkas);
                StepOutcome::Infeasible
            }
            LeaveResult::Entering { entering, flips } => {
                if !flips.is_empty() {
                    self.apply_bound_flips(&flips);
                    let x_p = self.f_vec[p];
                    infeas = (target - x_p).abs();
                    if infeas <= self.settings.feas_tol {
                        rho.clear();
                        self.rhs_work = rho;
                        return StepOutcome::FlippedOnly;
                    }
                }
                let vq = self.var_of(entering);

                let mut delta = std::mem::replace(&mut self.delta_work, SsVector::new(0, eps));
                delta.clear();
                self.scatter_col(vq, 1.0, &mut delta);
                self.factor_mut().solve_right(&mut delta);
                let pivot = delta.value(p);

                let out = if pivot.abs() < self.settings.epsilon_pivot {
                    StepOutcome::Stale
                } else {
                    self.commit_leave(p, w, vq, sigma, infeas, pivot, &delta, pricer);
                    StepOutcome::Pivoted
                };
                delta.clear();
                self.delta_work = delta;
                out
            }
        };

        rho.clear();
        self.rhs_work = rho;
        outcome
    }

    /// Move the listed nonbasic variables to their opposite bounds and
    /// fold the combined column effect into the basic solution.
    fn apply_bound_flips(&mut self, flips: &[VarId]) {
        // rhs_work is occupied by rho in the caller.
        let mut comb = SsVector::new(self.m, self.settings.epsilon_zero);
        let comb = &mut comb;

        for &id in flips {
            let v = self.var_of(id);
            let (from, to) = match self.basis.status(v) {
                VarStatus::OnLower => (self.lb[v], self.ub[v]),
                VarStatus::OnUpper => (self.ub[v], self.lb[v]),
                _ => continue,
            };
            let shift = to - from;
            if shift == 0.0 {
                continue;
            }
            let flipped = match self.basis.status(v) {
                VarStatus::OnLower => VarStatus::OnUpper,
                _ => VarStatus::OnLower,
            };
            self.basis.set_status(v, flipped);
            self.scatter_col(v, shift, comb);
        }

        self.factor_mut().solve_right(comb);
        for (i, xi) in comb.iter_nonzero() {
            self.f_vec.vec_mut()[i] -= xi;
        }
        comb.clear();
    }

    #[allow(clippy::too_many_arguments)]
    fn commit_leave(
        &mut self,
        p: usize,
        w: usize,
        vq: usize,
        sigma: f64,
        infeas: f64,
        pivot: f64,
        delta: &SsVector,
        pricer: &mut dyn Pricer,
    ) {
        // Entering direction making the leaving value move toward its
        // violated bound.
        let dir = if sigma * pivot > 0.0 { -1.0 } else { 1.0 };
        let t = infeas / pivot.abs();

        self.f_vec.delta_mut().clear();
        for (i, val) in delta.iter_nonzero() {
            self.f_vec.delta_mut().set(i, -dir * val);
        }
        let enter_val = if self.basis.status(vq) == VarStatus::Zero {
            dir * t
        } else {
            self.nonbasic_value(vq) + dir * t
        };
        self.f_vec.set_value(t);
        self.f_vec.apply();

        let leave_status = if self.lb[w] == self.ub[w] && self.lb[w] > -self.settings.infinity {
            VarStatus::Fixed
        } else if sigma > 0.0 {
            VarStatus::OnLower
        } else {
            VarStatus::OnUpper
        };

        // Dual step zeroing the entering reduced cost; the pivot row
        // entry of the entering column equals the solve-right pivot.
        let d_q = self.reduced_cost(vq);
        let theta = d_q / pivot;
        self.co_p_vec.set_value(theta);
        self.co_p_vec.apply();
        self.p_vec.set_value(theta);
        self.p_vec.apply();

        self.basis.swap(p, vq, leave_status);
        self.f_vec.vec_mut()[p] = enter_val;

        // Notify after the swap and update are committed, while the
        // update-vector deltas still describe this pivot; only then act
        // on a demanded refactorization.
        let verdict = self.factor_mut().update(p, vq, delta, pivot);
        pricer.left(p, self.id_of(w), &self.price_ctx());
        if verdict == UpdateVerdict::NeedsRefactor {
            if self.refactorize() {
                self.recompute_all();
            } else {
                self.status = Status::Singular;
                return;
            }
        }
        self.tiny_pivot_rounds = 0;
    }
}
