//! The entering iteration kernel (reduced-cost driven).

use std::time::Instant;

use crate::algebra::SsVector;
use crate::basis::VarStatus;
use crate::factor::UpdateVerdict;
use crate::pricer::{PriceCtx, Pricer, SimplexType, VarId};
use crate::ratio::{EnterCtx, EnterResult};
use crate::settings::{HyperPricing, Polishing};
use crate::status::Status;

use super::{Engine, Phase, MAX_TINY_PIVOT_ROUNDS};

/// Outcome of one attempted entering step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Pivoted,
    Flipped,
    Unbounded,
    /// Pivot below tolerance; the factor is suspect.
    Stale,
    /// Rejected by a polish gate; nothing was committed.
    Skipped,
}

/// Constraints a polish pass puts on a pivot before it may commit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PolishGate {
    /// Largest admissible step (polish pivots must not move the
    /// objective).
    pub cap: f64,
    /// Required kind of the leaving variable: `true` = logical.
    pub leave_logical: bool,
}

impl Engine {
    pub(crate) fn var_of(&self, id: VarId) -> usize {
        match id {
            VarId::Col(j) => j,
            VarId::Row(r) => self.n + r,
        }
    }

    pub(crate) fn id_of(&self, v: usize) -> VarId {
        if v < self.n {
            VarId::Col(v)
        } else {
            VarId::Row(v - self.n)
        }
    }

    pub(crate) fn reduced_cost(&self, v: usize) -> f64 {
        if v < self.n {
            self.cost_of(v) - self.p_vec[v]
        } else {
            self.co_p_vec[v - self.n]
        }
    }

    /// Recompute the entering test arrays and candidate lists.
    pub(crate) fn compute_enter_tests(&mut self) {
        let tol = self.settings.opt_tol;
        self.cand_cols.clear();
        self.cand_rows.clear();
        for j in 0..self.n {
            self.test[j] = self.enter_test_of(j);
            if self.test[j] < -tol {
                self.cand_cols.push(j);
            }
        }
        for r in 0..self.m {
            self.co_test[r] = self.enter_test_of(self.n + r);
            if self.co_test[r] < -tol {
                self.cand_rows.push(r);
            }
        }
    }

    fn enter_test_of(&self, v: usize) -> f64 {
        match self.basis.status(v) {
            VarStatus::Basic | VarStatus::Fixed | VarStatus::Undefined => 0.0,
            VarStatus::OnLower => self.reduced_cost(v),
            VarStatus::OnUpper => -self.reduced_cost(v),
            VarStatus::Zero => -self.reduced_cost(v).abs(),
        }
    }

    pub(crate) fn has_enter_violation(&self) -> bool {
        !self.cand_cols.is_empty() || !self.cand_rows.is_empty()
    }

    fn sparse_pricing(&self, violated: usize, dim: usize) -> bool {
        match self.settings.hyper_pricing {
            HyperPricing::Off => false,
            HyperPricing::On => true,
            HyperPricing::Auto => {
                (violated as f64) < self.settings.sparsity_threshold * dim.max(1) as f64
            }
        }
    }

    pub(crate) fn price_ctx(&self) -> PriceCtx<'_> {
        let sparse = self.sparse_pricing(
            self.cand_cols.len() + self.cand_rows.len(),
            self.total_vars(),
        );
        PriceCtx {
            epsilon: self.settings.opt_tol,
            f_test: &self.f_test,
            test: &self.test,
            co_test: &self.co_test,
            f_vec: &self.f_vec,
            co_p_vec: &self.co_p_vec,
            p_vec: &self.p_vec,
            leave_candidates: if self.sparse_pricing(self.cand_leave.len(), self.m) {
                Some(&self.cand_leave)
            } else {
                None
            },
            enter_candidates: if sparse {
                Some((&self.cand_cols, &self.cand_rows))
            } else {
                None
            },
        }
    }

    fn clear_updates(&mut self) {
        self.f_vec.clear_update();
        self.co_p_vec.clear_update();
        self.p_vec.clear_update();
    }

    pub(crate) fn refactor_and_recompute(&mut self) -> bool {
        if !self.refactorize() {
            self.status = Status::Singular;
            return false;
        }
        self.recompute_all();
        true
    }

    /// Run entering iterations until dual feasibility, a verdict, or a
    /// limit.
    pub(crate) fn enter_loop(&mut self, t0: &Instant) -> Phase {
        let mut pricer = self.take_pricer();
        pricer.set_type(SimplexType::Enter);
        let phase = loop {
            if let Some(ph) = self.hit_limit(t0) {
                break ph;
            }
            if !self.progress_checkpoint() {
                break Phase::Terminal;
            }
            self.clear_updates();
            self.compute_enter_tests();

            let selected = pricer.select_enter(&self.price_ctx());
            let q = match selected {
                Some(q) => q,
                None => {
                    // The pricer may have been working on stale data:
                    // repeat the check on a fresh factorization.
                    if self.factor_mut().updates() > 0 {
                        if !self.refactor_and_recompute() {
                            break Phase::Terminal;
                        }
                        self.compute_enter_tests();
                        match pricer.select_enter(&self.price_ctx()) {
                            Some(q) => q,
                            None => break Phase::Done,
                        }
                    } else {
                        break Phase::Done;
                    }
                }
            };

            match self.enter_iterate(q, pricer.as_mut(), None) {
                StepOutcome::Pivoted | StepOutcome::Flipped => {
                    self.count_iteration();
                }
                StepOutcome::Unbounded => {
                    self.status = Status::Unbounded;
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
                        // The stalled pivot involves the entering
                        // candidate and the basic variables along its
                        // direction.
                        let mut vars: Vec<usize> = self
                            .f_vec
                            .delta()
                            .indices()
                            .iter()
                            .map(|&i| self.basis.var_at(i))
                            .collect();
                        vars.push(self.var_of(q));
                        self.perturb_stalled(&vars);
                        self.compute_fvec();
                    }
                }
                StepOutcome::Skipped => unreachable!("no polish gate installed"),
            }
        };
        self.put_pricer(pricer);
        phase
    }

    /// One entering step with candidate `q`. Commits the pivot (or
    /// bound flip) unless the direction is unbounded, the pivot is too
    /// small, or a polish gate rejects it.
    pub(crate) fn enter_iterate(
        &mut self,
        q: VarId,
        pricer: &mut dyn Pricer,
        polish: Option<PolishGate>,
    ) -> StepOutcome {
        let eps = self.settings.epsilon_zero;
        let v = self.var_of(q);
        let st = self.basis.status(v);
        let d = self.reduced_cost(v);
        let sigma = match st {
            VarStatus::OnLower => 1.0,
            VarStatus::OnUpper => -1.0,
            VarStatus::Zero => {
                if d < 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            _ => return StepOutcome::Skipped,
        };

        // delta = B^-1 a_q over basis positions.
        let mut delta = std::mem::replace(&mut self.delta_work, SsVector::new(0, eps));
        delta.clear();
        self.scatter_col(v, 1.0, &mut delta);
        self.factor_mut().solve_right(&mut delta);

        // The applied direction of the basic solution per unit step.
        self.f_vec.delta_mut().clear();
        for (i, val) in delta.iter_nonzero() {
            self.f_vec.delta_mut().set(i, -sigma * val);
        }
        self.refresh_pos_bounds();

        let inf = self.settings.infinity;
        let max_step = if st == VarStatus::Zero {
            inf
        } else {
            let range = self.ub[v] - self.lb[v];
            if range >= inf {
                inf
            } else {
                range
            }
        };

        let mut ratio = self.take_ratio();
        let result = {
            let ctx = EnterCtx {
                rate: self.f_vec.delta(),
                values: self.f_vec.values(),
                lb: &self.lb_pos,
                ub: &self.ub_pos,
                max_step,
                eps_zero: self.settings.epsilon_zero,
                eps_pivot: self.settings.epsilon_pivot,
                feas_tol: self.settings.feas_tol,
                infinity: inf,
            };
            ratio.select_leave(&ctx)
        };
        self.put_ratio(ratio);

        let outcome = match result {
            EnterResult::Unbounded => {
                if polish.is_some() {
                    StepOutcome::Skipped
                } else {
                    let mut ray = vec![0.0; self.n];
                    if v < self.n {
                        ray[v] = sigma;
                    }
                    for p in 0..self.m {
                        let bv = self.basis.var_at(p);
                        if bv < self.n {
                            ray[bv] = -sigma * delta.value(p);
                        }
                    }
                    self.work_ray = Some(ray);
                    StepOutcome::Unbounded
                }
            }
            EnterResult::BoundFlip { step } => {
                if polish.is_some() {
                    StepOutcome::Skipped
                } else {
                    self.f_vec.set_value(step);
                    self.f_vec.apply();
                    let flipped = match st {
                        VarStatus::OnLower => VarStatus::OnUpper,
                        _ => VarStatus::OnLower,
                    };
                    self.basis.set_status(v, flipped);
                    StepOutcome::Flipped
                }
            }
            EnterResult::Blocked { pos, step } => {
                let pivot = delta.value(pos);
                if pivot.abs() < self.settings.epsilon_pivot {
                    StepOutcome::Stale
                } else if let Some(gate) = polish {
                    let leave_var = self.basis.var_at(pos);
                    let leave_is_logical = leave_var >= self.n;
                    if step > gate.cap || leave_is_logical != gate.leave_logical {
                        StepOutcome::Skipped
                    } else {
                        self.commit_enter(q, v, st, sigma, pos, step, pivot, &delta, pricer);
                        StepOutcome::Pivoted
                    }
                } else {
                    self.commit_enter(q, v, st, sigma, pos, step, pivot, &delta, pricer);
                    StepOutcome::Pivoted
                }
            }
        };

        delta.clear();
        self.delta_work = delta;
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn commit_enter(
        &mut self,
        q: VarId,
        v: usize,
        st: VarStatus,
        sigma: f64,
        pos: usize,
        step: f64,
        pivot: f64,
        delta: &SsVector,
        pricer: &mut dyn Pricer,
    ) {
        let eps = self.settings.epsilon_zero;
        let enter_val = if st == VarStatus::Zero {
            sigma * step
        } else {
            self.nonbasic_value(v) + sigma * step
        };

        // Primal update.
        self.f_vec.set_value(step);
        self.f_vec.apply();

        // Leaving status from the direction it was pushed.
        let leave_var = self.basis.var_at(pos);
        let rate_p = self.f_vec.delta().value(pos);
        let leave_status = if self.lb[leave_var] == self.ub[leave_var]
            && self.lb[leave_var] > -self.settings.infinity
        {
            VarStatus::Fixed
        } else if rate_p > 0.0 {
            VarStatus::OnUpper
        } else {
            VarStatus::OnLower
        };

        // Dual update: y += theta * rho with rho = B^-T e_pos and
        // theta chosen to zero the entering reduced cost.
        let d_q = self.reduced_cost(v);
        let theta = d_q / pivot;
        let mut rho = std::mem::replace(&mut self.rhs_work, SsVector::new(0, eps));
        rho.clear();
        rho.set(pos, 1.0);
        self.factor_mut().solve_left(&mut rho);

        self.co_p_vec.delta_mut().clear();
        for (r, val) in rho.iter_nonzero() {
            self.co_p_vec.delta_mut().set(r, val);
        }
        self.co_p_vec.set_value(theta);
        self.co_p_vec.apply();

        self.p_vec.delta_mut().clear();
        for (r, yr) in rho.iter_nonzero() {
            for nz in self.wlp.row(r).iter() {
                self.p_vec.delta_mut().add(nz.idx, yr * nz.val);
            }
        }
        self.p_vec.set_value(theta);
        self.p_vec.apply();

        rho.clear();
        self.rhs_work = rho;

        // Basis swap and the entering value.
        self.basis.swap(pos, v, leave_status);
        self.f_vec.vec_mut()[pos] = enter_val;

        // Notify after the swap and update are committed, while the
        // update-vector deltas still describe this pivot; only then act
        // on a demanded refactorization.
        let verdict = self.factor_mut().update(pos, v, delta, pivot);
        pricer.entered(q, pos, &self.price_ctx());
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

    /// Degenerate post-optimality pivots steering the basis composition
    /// per the solution-polishing mode.
    pub(crate) fn polish(&mut self, t0: &Instant) {
        let want_logical_enter = matches!(
            self.settings.solution_polishing,
            Polishing::Integrality
        );
        let gate = PolishGate {
            cap: self.settings.feas_tol,
            leave_logical: !want_logical_enter,
        };
        let tol = self.settings.opt_tol;

        let mut pricer = self.take_pricer();
        let mut budget = (self.total_vars()).min(100);
        'outer: while budget > 0 {
            if self.hit_limit(t0).is_some() {
                break;
            }
            self.clear_updates();
            self.compute_enter_tests();

            let candidates: Vec<VarId> = (0..self.total_vars())
                .filter(|&v| {
                    let is_logical = v >= self.n;
                    is_logical == want_logical_enter
                        && !self.basis.is_basic(v)
                        && !matches!(
                            self.basis.status(v),
                            VarStatus::Fixed | VarStatus::Undefined
                        )
                        && self.reduced_cost(v).abs() <= tol
                })
                .map(|v| self.id_of(v))
                .collect();

            for q in candidates {
                if budget == 0 {
                    break 'outer;
                }
                match self.enter_iterate(q, pricer.as_mut(), Some(gate)) {
                    StepOutcome::Pivoted => {
                        self.count_iteration();
                        budget -= 1;
                        continue 'outer;
                    }
                    _ => continue,
                }
            }
            break;
        }
        self.put_pricer(pricer);
    }
}
