//! The revised-simplex iteration engine.
//!
//! The engine always iterates on an internal *work model* in the
//! computational form `min c^T x, lhs <= Ax <= rhs, lo <= x <= up`
//! (maximization is folded into the costs). Under the column
//! representation the work model is the loaded LP itself; under the row
//! representation it is the explicit dual built by [`dualize`], which
//! makes the basis dimension the number of structural columns. The two
//! iteration kernels live in [`enter`] and [`leave`]; either may run in
//! either representation, which yields the four classic mode pairings.
//!
//! The driver is composite: whenever reduced-cost infeasibility is
//! present it runs the entering kernel under bound shifting, then
//! removes the shifts and lets the leaving kernel restore primal
//! feasibility, which it can always do from a dual-feasible state.

pub mod diag;
pub mod dualize;
pub mod enter;
pub mod leave;
pub mod progress;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::algebra::{SVector, SsVector, UpdateVector};
use crate::basis::{Basis, BasisError, VarStatus};
use crate::factor::lu::LuConfig;
use crate::factor::{FactorBackend, FactorError, SparseLu};
use crate::lp::{LpModel, ModelError, Sense};
use crate::pricer::{DantzigPricer, DevexPricer, Pricer};
use crate::ratio::{BoundFlippingRatioTester, RatioTester, TextbookRatioTester};
use crate::settings::{Algorithm, Polishing, PricerType, RatioTesterType, Representation, Settings};
use crate::status::Status;

use diag::DiagnosticsConfig;
use dualize::DualMap;
use progress::{PerturbSequence, ProgressAction, ProgressMonitor};

/// Configuration and input failures; everything else is a [`Status`].
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("no pricer loaded")]
    NoPricer,

    #[error("no ratio tester loaded")]
    NoRatioTester,

    #[error("no linear solver loaded")]
    NoSolver,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Basis(#[from] BasisError),
}

/// Cooperative interrupt source, polled at iteration boundaries.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// Shared atomic flag (the safe Rust surface).
    Flag(Arc<AtomicBool>),
    /// Borrowed C `volatile bool*`; the caller guarantees it stays
    /// valid for the duration of the solve.
    Raw(*const bool),
}

impl Interrupt {
    fn is_set(&self) -> bool {
        match self {
            Interrupt::Flag(f) => f.load(Ordering::Relaxed),
            Interrupt::Raw(p) => {
                if p.is_null() {
                    false
                } else {
                    unsafe { p.read_volatile() }
                }
            }
        }
    }
}

/// Outcome of one kernel phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// No candidate left; the phase's feasibility goal holds.
    Done,
    /// A terminal status was set (verdict or abort).
    Terminal,
    /// The interrupt flag fired; state is consistent and resumable.
    Interrupted,
}

/// The revised-simplex solver state machine.
pub struct Engine {
    lp: LpModel,
    wlp: LpModel,
    dual_map: Option<DualMap>,
    rep: Representation,
    rep_override: Option<Representation>,
    sense_factor: f64,
    cost: Vec<f64>,
    pub(crate) n: usize,
    pub(crate) m: usize,

    pricer: Option<Box<dyn Pricer>>,
    ratio: Option<Box<dyn RatioTester>>,
    factor: Option<Box<dyn FactorBackend>>,

    pub(crate) settings: Settings,

    pub(crate) basis: Basis,
    pub(crate) lb: Vec<f64>,
    pub(crate) ub: Vec<f64>,
    pub(crate) f_vec: UpdateVector,
    pub(crate) co_p_vec: UpdateVector,
    pub(crate) p_vec: UpdateVector,
    pub(crate) f_test: Vec<f64>,
    pub(crate) test: Vec<f64>,
    pub(crate) co_test: Vec<f64>,
    pub(crate) lb_pos: Vec<f64>,
    pub(crate) ub_pos: Vec<f64>,
    pub(crate) delta_work: SsVector,
    pub(crate) rhs_work: SsVector,
    pub(crate) alpha_rows: SsVector,
    pub(crate) cand_leave: Vec<usize>,
    pub(crate) cand_cols: Vec<usize>,
    pub(crate) cand_rows: Vec<usize>,

    bounds_modified: bool,
    perturb: PerturbSequence,
    monitor: ProgressMonitor,
    diag: DiagnosticsConfig,

    status: Status,
    iterations: usize,
    pub(crate) tiny_pivot_rounds: usize,
    solve_time: f64,
    dirty: bool,

    pub(crate) work_ray: Option<Vec<f64>>,
    pub(crate) work_farkas: Option<Vec<f64>>,

    sol_primal: Vec<f64>,
    sol_duals: Vec<f64>,
    sol_redcost: Vec<f64>,
    sol_slacks: Vec<f64>,
    primal_ray: Option<Vec<f64>>,
    dual_farkas: Option<Vec<f64>>,
    obj_val: f64,

    interrupt: Option<Interrupt>,
}

const MAX_CLEANUP_ROUNDS: usize = 5;
const MAX_TINY_PIVOT_ROUNDS: usize = 3;

impl Engine {
    pub fn new(settings: Settings) -> Self {
        let eps = settings.epsilon_zero;
        Self {
            lp: LpModel::new(),
            wlp: LpModel::new(),
            dual_map: None,
            rep: Representation::Column,
            rep_override: None,
            sense_factor: 1.0,
            cost: Vec::new(),
            n: 0,
            m: 0,
            pricer: None,
            ratio: None,
            factor: None,
            settings,
            basis: Basis::new(),
            lb: Vec::new(),
            ub: Vec::new(),
            f_vec: UpdateVector::new(0, eps),
            co_p_vec: UpdateVector::new(0, eps),
            p_vec: UpdateVector::new(0, eps),
            f_test: Vec::new(),
            test: Vec::new(),
            co_test: Vec::new(),
            lb_pos: Vec::new(),
            ub_pos: Vec::new(),
            delta_work: SsVector::new(0, eps),
            rhs_work: SsVector::new(0, eps),
            alpha_rows: SsVector::new(0, eps),
            cand_leave: Vec::new(),
            cand_cols: Vec::new(),
            cand_rows: Vec::new(),
            bounds_modified: false,
            perturb: PerturbSequence::new(0x9e3779b97f4a7c15),
            monitor: ProgressMonitor::default(),
            diag: DiagnosticsConfig::from_env(),
            status: Status::NoProblem,
            iterations: 0,
            tiny_pivot_rounds: 0,
            solve_time: 0.0,
            dirty: true,
            work_ray: None,
            work_farkas: None,
            sol_primal: Vec::new(),
            sol_duals: Vec::new(),
            sol_redcost: Vec::new(),
            sol_slacks: Vec::new(),
            primal_ray: None,
            dual_farkas: None,
            obj_val: 0.0,
            interrupt: None,
        }
    }

    /// Install the default components implied by the settings for any
    /// slot the caller has not filled explicitly.
    pub fn wire_defaults(&mut self) {
        if self.pricer.is_none() {
            self.pricer = Some(match self.settings.pricer {
                PricerType::Dantzig => Box::new(DantzigPricer::new()) as Box<dyn Pricer>,
                PricerType::Devex | PricerType::Auto => Box::new(DevexPricer::new()),
            });
        }
        if self.ratio.is_none() {
            self.ratio = Some(match self.settings.ratio_tester {
                RatioTesterType::Textbook => {
                    Box::new(TextbookRatioTester::new()) as Box<dyn RatioTester>
                }
                RatioTesterType::BoundFlipping | RatioTesterType::Auto => {
                    Box::new(BoundFlippingRatioTester::new())
                }
            });
        }
        if self.factor.is_none() {
            let cfg = LuConfig {
                min_markowitz: self.settings.min_markowitz,
                epsilon_pivot: self.settings.epsilon_pivot,
                epsilon_zero: self.settings.epsilon_zero.max(1e-14),
                max_updates: self.settings.factor_update_max,
                update_fill: self.settings.refac_update_fill,
            };
            self.factor = Some(Box::new(SparseLu::new(cfg)));
        }
    }

    pub fn set_pricer(&mut self, pricer: Option<Box<dyn Pricer>>) {
        self.pricer = pricer;
        self.dirty = true;
    }

    pub fn set_ratio_tester(&mut self, ratio: Option<Box<dyn RatioTester>>) {
        self.ratio = ratio;
        self.dirty = true;
    }

    pub fn set_factor(&mut self, factor: Option<Box<dyn FactorBackend>>) {
        self.factor = factor;
        self.dirty = true;
    }

    pub fn set_interrupt(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.interrupt = flag.map(Interrupt::Flag);
    }

    /// Install an arbitrary interrupt source (FFI plumbing).
    pub fn set_interrupt_handle(&mut self, handle: Option<Interrupt>) {
        self.interrupt = handle;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        self.dirty = true;
        &mut self.settings
    }

    /// The loaded problem.
    pub fn model(&self) -> &LpModel {
        &self.lp
    }

    /// Mutable access to the loaded problem for bound/objective/side
    /// changes. The factor handle is invalidated; the basis survives.
    pub fn model_mut(&mut self) -> &mut LpModel {
        self.dirty = true;
        if self.status.is_terminal() {
            self.status = if self.basis.is_defined() {
                Status::Regular
            } else {
                Status::Unknown
            };
        }
        &mut self.lp
    }

    /// Signal a structural change (columns/rows added or removed): the
    /// basis is reset to undefined and the work model rebuilt at the
    /// next solve.
    pub fn invalidate_basis(&mut self) {
        self.basis = Basis::new();
        self.dirty = true;
        self.status = if self.lp.num_cols() + self.lp.num_rows() > 0 {
            Status::Unknown
        } else {
            Status::NoProblem
        };
    }

    /// Load a problem, replacing any previous one.
    pub fn load(&mut self, lp: LpModel) {
        self.lp = lp;
        self.rep_override = None;
        self.invalidate_basis();
        self.iterations = 0;
        self.solve_time = 0.0;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Seconds spent inside `solve` since the last `load`.
    pub fn solving_time(&self) -> f64 {
        self.solve_time
    }

    pub fn objective_value(&self) -> f64 {
        self.obj_val
    }

    pub fn primal(&self) -> &[f64] {
        &self.sol_primal
    }

    pub fn duals(&self) -> &[f64] {
        &self.sol_duals
    }

    pub fn reduced_costs(&self) -> &[f64] {
        &self.sol_redcost
    }

    pub fn slacks(&self) -> &[f64] {
        &self.sol_slacks
    }

    pub fn primal_ray(&self) -> Option<&[f64]> {
        self.primal_ray.as_deref()
    }

    pub fn dual_farkas(&self) -> Option<&[f64]> {
        self.dual_farkas.as_deref()
    }

    pub fn has_primal_ray(&self) -> bool {
        self.primal_ray.is_some()
    }

    pub fn has_dual_farkas(&self) -> bool {
        self.dual_farkas.is_some()
    }

    /// Basis status of an original column.
    pub fn col_status(&self, j: usize) -> VarStatus {
        match self.rep {
            Representation::Row => self.value_status(
                self.sol_primal.get(j).copied().unwrap_or(0.0),
                self.lp.lower(j),
                self.lp.upper(j),
            ),
            _ => {
                if self.basis.is_defined() {
                    self.basis.status(j)
                } else {
                    VarStatus::Undefined
                }
            }
        }
    }

    /// Basis status of an original row's logical variable.
    pub fn row_status(&self, r: usize) -> VarStatus {
        match self.rep {
            Representation::Row => self.value_status(
                self.sol_slacks.get(r).copied().unwrap_or(0.0),
                self.lp.lhs(r),
                self.lp.rhs(r),
            ),
            _ => {
                if self.basis.is_defined() {
                    self.basis.status(self.n + r)
                } else {
                    VarStatus::Undefined
                }
            }
        }
    }

    /// Classify a value against its bounds; used for the row
    /// representation where the column-space basis is not materialized.
    fn value_status(&self, v: f64, lo: f64, up: f64) -> VarStatus {
        let inf = self.settings.infinity;
        let tol = self.settings.feas_tol;
        if lo > -inf && up < inf && lo == up {
            VarStatus::Fixed
        } else if lo > -inf && (v - lo).abs() <= tol {
            VarStatus::OnLower
        } else if up < inf && (v - up).abs() <= tol {
            VarStatus::OnUpper
        } else if lo <= -inf && up >= inf && v.abs() <= tol {
            VarStatus::Zero
        } else {
            VarStatus::Basic
        }
    }

    /// Write the basis file for the loaded problem.
    pub fn write_basis(&self, path: &std::path::Path) -> Result<(), BasisError> {
        let mut statuses = Vec::with_capacity(self.lp.num_cols() + self.lp.num_rows());
        for j in 0..self.lp.num_cols() {
            statuses.push(self.col_status(j));
        }
        for r in 0..self.lp.num_rows() {
            statuses.push(self.row_status(r));
        }
        let mut b = Basis::new();
        b.reset(self.lp.num_cols(), self.lp.num_rows());
        b.set_all_statuses(&statuses);
        b.write_file(path)
    }

    /// Read a warm basis for the loaded problem. Effective under the
    /// column representation; the row representation works in a
    /// different basis space and cold-starts instead.
    pub fn read_basis(&mut self, path: &std::path::Path) -> Result<(), BasisError> {
        let mut b = Basis::new();
        b.read_file(path, self.lp.num_cols(), self.lp.num_rows())?;
        if !matches!(self.effective_rep(), Representation::Row) {
            self.basis = b;
            self.status = Status::Regular;
            self.dirty = true;
        }
        Ok(())
    }

    /// The representation the next solve will use.
    pub fn effective_rep(&self) -> Representation {
        if let Some(rep) = self.rep_override {
            return rep;
        }
        match self.settings.representation {
            Representation::Auto => {
                let rows = self.lp.num_rows() as f64;
                let cols = self.lp.num_cols() as f64;
                if rows > self.settings.representation_switch * cols.max(1.0) {
                    Representation::Row
                } else {
                    Representation::Column
                }
            }
            r => r,
        }
    }

    // ------------------------------------------------------------------
    // Work-model plumbing shared by the kernels
    // ------------------------------------------------------------------

    pub(crate) fn total_vars(&self) -> usize {
        self.n + self.m
    }

    pub(crate) fn cost_of(&self, v: usize) -> f64 {
        if v < self.n {
            self.cost[v]
        } else {
            0.0
        }
    }

    /// Value of a nonbasic variable, pinned to the bound its status
    /// names.
    pub(crate) fn nonbasic_value(&self, v: usize) -> f64 {
        match self.basis.status(v) {
            VarStatus::OnLower | VarStatus::Fixed => self.lb[v],
            VarStatus::OnUpper => self.ub[v],
            VarStatus::Zero => 0.0,
            VarStatus::Basic | VarStatus::Undefined => 0.0,
        }
    }

    /// Add `scale` times the column of variable `v` into `acc`.
    pub(crate) fn scatter_col(&self, v: usize, scale: f64, acc: &mut SsVector) {
        if v < self.n {
            for nz in self.wlp.col(v).iter() {
                acc.add(nz.idx, scale * nz.val);
            }
        } else {
            acc.add(v - self.n, -scale);
        }
    }

    fn col_as_svector(&self, v: usize) -> SVector {
        if v < self.n {
            let view = self.wlp.col(v);
            let mut sv = SVector::with_capacity(view.size());
            for nz in view.iter() {
                sv.add(nz.idx, nz.val);
            }
            sv
        } else {
            SVector::from_entries(&[(v - self.n, -1.0)])
        }
    }

    /// Factorize the current basis, patching singular positions with
    /// logical variables for a bounded number of repair rounds.
    pub(crate) fn refactorize(&mut self) -> bool {
        let mut factor = self.factor.take().expect("factor checked at solve entry");
        let mut ok = false;
        for _repair in 0..=self.m.min(32) {
            let cols: Vec<SVector> = (0..self.m)
                .map(|p| self.col_as_svector(self.basis.var_at(p)))
                .collect();
            match factor.load(self.m, &cols, self.basis.basic_vars()) {
                Ok(()) => {
                    ok = true;
                    break;
                }
                Err(FactorError::Singular { .. }) => {
                    let (rows, positions) = factor.singular_rows_positions();
                    let pairs: Vec<(usize, usize)> = rows
                        .iter()
                        .copied()
                        .zip(positions.iter().copied())
                        .collect();
                    let mut patched = false;
                    for (row, pos) in pairs {
                        let logical = self.n + row;
                        if !self.basis.is_basic(logical) {
                            let out = self.basis.var_at(pos);
                            let st = self.exit_status(out);
                            self.basis.swap(pos, logical, st);
                            patched = true;
                        }
                    }
                    if !patched {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        self.factor = Some(factor);
        ok
    }

    /// Nonbasic status for a variable forced out of the basis.
    pub(crate) fn exit_status(&self, v: usize) -> VarStatus {
        let inf = self.settings.infinity;
        let lo = self.lb[v];
        let up = self.ub[v];
        if lo > -inf && up < inf && lo == up {
            VarStatus::Fixed
        } else if lo > -inf {
            VarStatus::OnLower
        } else if up < inf {
            VarStatus::OnUpper
        } else {
            VarStatus::Zero
        }
    }

    /// Recompute duals, reduced-cost aggregates, and the basic solution
    /// from the current factorization.
    pub(crate) fn recompute_all(&mut self) {
        self.compute_duals();
        self.compute_pvec();
        self.compute_fvec();
    }

    fn compute_duals(&mut self) {
        let eps = self.settings.epsilon_zero;
        let mut rhs = std::mem::replace(&mut self.rhs_work, SsVector::new(0, eps));
        if rhs.dim() != self.m {
            rhs = SsVector::new(self.m, eps);
        }
        rhs.clear();
        for p in 0..self.m {
            let c = self.cost_of(self.basis.var_at(p));
            if c != 0.0 {
                rhs.set(p, c);
            }
        }
        let factor = self.factor.as_mut().expect("factor");
        factor.solve_left(&mut rhs);
        self.co_p_vec.clear_update();
        self.co_p_vec
            .vec_mut()
            .as_mut_slice()
            .copy_from_slice(rhs.values());
        rhs.clear();
        self.rhs_work = rhs;
    }

    fn compute_pvec(&mut self) {
        self.p_vec.clear_update();
        self.p_vec.vec_mut().clear();
        let eps = self.settings.epsilon_zero;
        for r in 0..self.m {
            let yr = self.co_p_vec[r];
            if yr.abs() < eps {
                continue;
            }
            for nz in self.wlp.row(r).iter() {
                self.p_vec.vec_mut()[nz.idx] += yr * nz.val;
            }
        }
    }

    pub(crate) fn compute_fvec(&mut self) {
        let eps = self.settings.epsilon_zero;
        let mut rhs = std::mem::replace(&mut self.rhs_work, SsVector::new(0, eps));
        if rhs.dim() != self.m {
            rhs = SsVector::new(self.m, eps);
        }
        rhs.clear();
        for v in 0..self.total_vars() {
            if self.basis.is_basic(v) {
                continue;
            }
            let x = self.nonbasic_value(v);
            if x != 0.0 {
                self.scatter_col(v, -x, &mut rhs);
            }
        }
        let factor = self.factor.as_mut().expect("factor");
        factor.solve_right(&mut rhs);
        self.f_vec.clear_update();
        self.f_vec
            .vec_mut()
            .as_mut_slice()
            .copy_from_slice(rhs.values());
        rhs.clear();
        self.rhs_work = rhs;
    }

    /// Refresh the per-position bound arrays of the basic variables.
    pub(crate) fn refresh_pos_bounds(&mut self) {
        for p in 0..self.m {
            let v = self.basis.var_at(p);
            self.lb_pos[p] = self.lb[v];
            self.ub_pos[p] = self.ub[v];
        }
    }

    /// Internal objective of the work model.
    pub(crate) fn internal_objective(&self) -> f64 {
        let mut obj = 0.0;
        for j in 0..self.n {
            let x = match self.basis.pos_of(j) {
                Some(p) => self.f_vec[p],
                None => self.nonbasic_value(j),
            };
            obj += self.cost[j] * x;
        }
        obj
    }

    /// Objective of the loaded problem implied by the current iterate.
    pub(crate) fn original_objective(&self) -> f64 {
        let internal = self.internal_objective();
        let base = match self.rep {
            Representation::Row => -internal,
            _ => self.sense_factor * internal,
        };
        base + self.lp.obj_offset()
    }

    // ------------------------------------------------------------------
    // Bound shifting, restoration, perturbation
    // ------------------------------------------------------------------

    fn rebuild_bounds(&mut self) {
        self.lb.clear();
        self.ub.clear();
        for j in 0..self.n {
            self.lb.push(self.wlp.lower(j));
            self.ub.push(self.wlp.upper(j));
        }
        for r in 0..self.m {
            self.lb.push(self.wlp.lhs(r));
            self.ub.push(self.wlp.rhs(r));
        }
        self.bounds_modified = false;
    }

    /// Relax the bounds of basic variables to cover the current basic
    /// solution, making the entering kernel start primal feasible.
    pub(crate) fn shift_bounds_to_current(&mut self) {
        let tol = self.settings.feas_tol;
        for p in 0..self.m {
            let v = self.basis.var_at(p);
            let x = self.f_vec[p];
            if x < self.lb[v] - tol {
                self.lb[v] = x;
                self.bounds_modified = true;
            }
            if x > self.ub[v] + tol {
                self.ub[v] = x;
                self.bounds_modified = true;
            }
        }
    }

    /// Undo shifts and perturbations; callers recompute the basic
    /// solution afterwards because nonbasic pinned values move back.
    pub(crate) fn restore_bounds(&mut self) -> bool {
        if !self.bounds_modified {
            return false;
        }
        self.rebuild_bounds();
        true
    }

    /// Deterministic anti-degeneracy perturbation. With `vars: None`
    /// the entire problem is perturbed; with `Some(vars)` only the
    /// bounds of the listed variables, which the callers restrict to
    /// those tied to the stalled pivot.
    pub(crate) fn perturb_bounds(&mut self, vars: Option<&[usize]>) {
        let mag = self.settings.feas_tol * 0.1;
        let inf = self.settings.infinity;
        match vars {
            None => {
                for v in 0..self.total_vars() {
                    self.perturb_var(v, mag, inf);
                }
            }
            Some(list) => {
                for &v in list {
                    self.perturb_var(v, mag, inf);
                }
            }
        }
    }

    /// Relax the active bound(s) of one variable outward: the bound a
    /// nonbasic variable sits on, or both finite bounds of a basic
    /// variable so it stops blocking the ratio test at zero slack.
    fn perturb_var(&mut self, v: usize, mag: f64, inf: f64) {
        if self.basis.is_basic(v) {
            if self.lb[v] > -inf {
                self.lb[v] -= mag * self.perturb.next();
                self.bounds_modified = true;
            }
            if self.ub[v] < inf {
                self.ub[v] += mag * self.perturb.next();
                self.bounds_modified = true;
            }
            return;
        }
        match self.basis.status(v) {
            VarStatus::OnLower if self.lb[v] > -inf => {
                self.lb[v] -= mag * self.perturb.next();
                self.bounds_modified = true;
            }
            VarStatus::OnUpper if self.ub[v] < inf => {
                self.ub[v] += mag * self.perturb.next();
                self.bounds_modified = true;
            }
            _ => {}
        }
    }

    /// Perturbation entry point after a stalled pivot: the whole
    /// problem when `FULLPERTURBATION` is set, otherwise only the
    /// bounds relevant to that pivot.
    pub(crate) fn perturb_stalled(&mut self, vars: &[usize]) {
        if self.settings.full_perturbation {
            self.perturb_bounds(None);
        } else {
            self.perturb_bounds(Some(vars));
        }
    }

    /// Basic variables sitting at a bound within the feasibility
    /// tolerance, the ones behind degenerate pivots; scope of the
    /// cycling perturbation when the whole problem is not perturbed.
    pub(crate) fn degenerate_basics(&self) -> Vec<usize> {
        let tol = self.settings.feas_tol;
        let inf = self.settings.infinity;
        let mut vars = Vec::new();
        for p in 0..self.m {
            let v = self.basis.var_at(p);
            let x = self.f_vec[p];
            let at_lo = self.lb[v] > -inf && (x - self.lb[v]).abs() <= tol;
            let at_up = self.ub[v] < inf && (self.ub[v] - x).abs() <= tol;
            if at_lo || at_up {
                vars.push(v);
            }
        }
        vars
    }

    // ------------------------------------------------------------------
    // Progress and limits
    // ------------------------------------------------------------------

    /// Maximum residual of `A x - s = 0` at the current iterate.
    pub(crate) fn basic_residual(&mut self) -> f64 {
        let eps = self.settings.epsilon_zero;
        let mut acc = std::mem::replace(&mut self.rhs_work, SsVector::new(0, eps));
        if acc.dim() != self.m {
            acc = SsVector::new(self.m, eps);
        }
        acc.clear();
        for v in 0..self.total_vars() {
            let x = match self.basis.pos_of(v) {
                Some(p) => self.f_vec[p],
                None => self.nonbasic_value(v),
            };
            if x != 0.0 {
                self.scatter_col(v, x, &mut acc);
            }
        }
        let res = acc.max_abs();
        acc.clear();
        self.rhs_work = acc;
        res
    }

    /// Periodic checkpoint: display line, residual-triggered refactor,
    /// and cycling detection. Returns `false` when the run must abort.
    pub(crate) fn progress_checkpoint(&mut self) -> bool {
        if self.iterations == 0 || self.iterations % self.settings.display_freq != 0 {
            return true;
        }
        let obj = self.original_objective();
        if self.settings.verbose || self.diag.should_log(self.iterations) {
            let factor = self.factor.as_ref().expect("factor");
            eprintln!(
                "iter {:7}  obj {:+.10e}  factor nnz {:6}  updates {:3}",
                self.iterations,
                obj,
                factor.nonzeros(),
                factor.updates(),
            );
        }

        let stale = {
            let basis_nnz: usize = (0..self.m)
                .map(|p| {
                    let v = self.basis.var_at(p);
                    if v < self.n {
                        self.wlp.col(v).size()
                    } else {
                        1
                    }
                })
                .sum();
            let factor = self.factor.as_ref().expect("factor");
            let mem_grown = factor.nonzeros() as f64
                > self.settings.refac_mem_factor * factor.base_nonzeros().max(1) as f64;
            let fill_grown = factor.nonzeros() as f64
                > self.settings.refac_basis_nnz * basis_nnz.max(1) as f64;
            let ill_conditioned = factor.condition_estimate() > 1e14;
            factor.updates() > 0 && (mem_grown || fill_grown || ill_conditioned)
        };
        if stale || self.basic_residual() > self.settings.feas_tol {
            if !self.refactorize() {
                self.status = Status::Singular;
                return false;
            }
            self.recompute_all();
        }

        match self.monitor.checkpoint(self.basis.signature(), obj) {
            ProgressAction::Continue => true,
            ProgressAction::Perturb => {
                let degenerate = self.degenerate_basics();
                self.perturb_stalled(&degenerate);
                self.compute_fvec();
                true
            }
            ProgressAction::Abort => {
                self.status = Status::AbortCycling;
                false
            }
        }
    }

    /// Check interrupt and resource limits at an iteration boundary.
    pub(crate) fn hit_limit(&mut self, t0: &Instant) -> Option<Phase> {
        if self.interrupted() {
            return Some(Phase::Interrupted);
        }
        if self.settings.iter_limit >= 0 && self.iterations as i64 >= self.settings.iter_limit {
            self.status = Status::AbortIter;
            return Some(Phase::Terminal);
        }
        if !self.settings.is_infinite(self.settings.time_limit)
            && t0.elapsed().as_secs_f64() > self.settings.time_limit
        {
            self.status = Status::AbortTime;
            return Some(Phase::Terminal);
        }
        let lower_active = !self.settings.is_infinite(self.settings.obj_limit_lower);
        let upper_active = !self.settings.is_infinite(self.settings.obj_limit_upper);
        if lower_active || upper_active {
            let obj = self.original_objective();
            if (lower_active && obj < self.settings.obj_limit_lower)
                || (upper_active && obj > self.settings.obj_limit_upper)
            {
                self.status = Status::AbortValue;
                return Some(Phase::Terminal);
            }
        }
        None
    }

    pub(crate) fn interrupted(&self) -> bool {
        self.interrupt.as_ref().map(Interrupt::is_set).unwrap_or(false)
    }

    pub(crate) fn count_iteration(&mut self) {
        self.iterations += 1;
    }

    // ------------------------------------------------------------------
    // Component hand-off (split borrows around the trait objects)
    // ------------------------------------------------------------------

    pub(crate) fn take_pricer(&mut self) -> Box<dyn Pricer> {
        self.pricer.take().expect("pricer checked at solve entry")
    }

    pub(crate) fn put_pricer(&mut self, p: Box<dyn Pricer>) {
        self.pricer = Some(p);
    }

    pub(crate) fn take_ratio(&mut self) -> Box<dyn RatioTester> {
        self.ratio.take().expect("ratio tester checked at solve entry")
    }

    pub(crate) fn put_ratio(&mut self, r: Box<dyn RatioTester>) {
        self.ratio = Some(r);
    }

    pub(crate) fn factor_mut(&mut self) -> &mut dyn FactorBackend {
        self.factor.as_mut().expect("factor").as_mut()
    }

    /// Notify the pricer of structural growth/removal on the original
    /// model (column side).
    pub fn pricer_added_cols(&mut self, count: usize) {
        if let Some(p) = self.pricer.as_mut() {
            p.added_vecs(count);
        }
    }

    pub fn pricer_added_rows(&mut self, count: usize) {
        if let Some(p) = self.pricer.as_mut() {
            p.added_co_vecs(count);
        }
    }

    pub fn pricer_removed_col(&mut self, i: usize) {
        if let Some(p) = self.pricer.as_mut() {
            p.removed_vec(i);
        }
    }

    pub fn pricer_removed_row(&mut self, i: usize) {
        if let Some(p) = self.pricer.as_mut() {
            p.removed_co_vec(i);
        }
    }

    pub fn pricer_removed_cols(&mut self, perm: &[i32]) {
        if let Some(p) = self.pricer.as_mut() {
            p.removed_vecs(perm);
        }
    }

    pub fn pricer_removed_rows(&mut self, perm: &[i32]) {
        if let Some(p) = self.pricer.as_mut() {
            p.removed_co_vecs(perm);
        }
    }

    // ------------------------------------------------------------------
    // Driver
    // ------------------------------------------------------------------

    /// Run the simplex until a verdict, an abort, or an interrupt.
    pub fn solve(&mut self) -> Result<Status, SolverError> {
        let t0 = Instant::now();
        let result = self.solve_inner(&t0);
        self.solve_time += t0.elapsed().as_secs_f64();
        result
    }

    fn solve_inner(&mut self, t0: &Instant) -> Result<Status, SolverError> {
        if self.lp.num_cols() == 0 && self.lp.num_rows() == 0 {
            self.status = Status::NoProblem;
            return Ok(self.status);
        }
        if self.pricer.is_none() {
            self.status = Status::NoPricer;
            return Err(SolverError::NoPricer);
        }
        if self.ratio.is_none() {
            self.status = Status::NoRatioTester;
            return Err(SolverError::NoRatioTester);
        }
        if self.factor.is_none() {
            self.status = Status::NoSolver;
            return Err(SolverError::NoSolver);
        }
        if let Err(e) = self.lp.validate() {
            self.status = Status::Error;
            return Err(SolverError::Model(e));
        }

        // Optimizing an already-optimal, unchanged model performs no
        // iterations.
        if !self.dirty && self.status.is_terminal() {
            return Ok(self.status);
        }

        if !self.prepare() {
            return Ok(self.status);
        }
        self.status = Status::Running;
        self.work_ray = None;
        self.work_farkas = None;
        self.primal_ray = None;
        self.dual_farkas = None;
        self.monitor.reset();
        self.tiny_pivot_rounds = 0;

        // Column/Primal and Row/Dual run the entering kernel first; the
        // other two pairings lead with the leaving kernel and only fall
        // back to entering when the start is dual infeasible.
        let prefer_enter = match (self.rep, self.settings.algorithm) {
            (Representation::Row, Algorithm::Dual) => true,
            (Representation::Row, Algorithm::Primal) => false,
            (_, Algorithm::Primal) => true,
            (_, Algorithm::Dual) => false,
        };

        let mut rounds = 0;
        loop {
            rounds += 1;

            self.compute_enter_tests();
            if self.has_enter_violation() || prefer_enter {
                self.shift_bounds_to_current();
                self.refresh_pos_bounds();
                match self.enter_loop(t0) {
                    Phase::Terminal => break,
                    Phase::Interrupted => return Ok(self.status),
                    Phase::Done => {}
                }
                if self.restore_bounds() {
                    self.compute_fvec();
                }
            }

            match self.leave_loop(t0) {
                Phase::Terminal => break,
                Phase::Interrupted => return Ok(self.status),
                Phase::Done => {}
            }

            // Remove any shifts or perturbations still in effect before
            // judging optimality.
            if self.restore_bounds() {
                self.compute_fvec();
            }

            // Verify the verdict against a fresh factorization.
            if !self.refactorize() {
                self.status = Status::Singular;
                break;
            }
            self.recompute_all();
            self.compute_enter_tests();
            self.compute_f_test();
            let dual_ok = !self.has_enter_violation();
            let primal_ok = self.cand_leave.is_empty();
            if dual_ok && primal_ok {
                self.status = Status::Optimal;
                if !matches!(self.settings.solution_polishing, Polishing::Off) {
                    self.polish(t0);
                }
                break;
            }
            if rounds >= MAX_CLEANUP_ROUNDS {
                self.status = Status::OptimalUnscaledViolations;
                break;
            }
        }

        self.finalize_verdict(t0);
        self.extract_solution();
        self.dirty = false;
        Ok(self.status)
    }

    /// Resolve representation, build the work model, size the state, and
    /// produce an initial factorized basis. Returns `false` when the
    /// basis cannot be factorized at all.
    fn prepare(&mut self) -> bool {
        self.rep = self.effective_rep();
        self.sense_factor = match self.lp.sense() {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };
        let base_cost: Vec<f64> = (0..self.lp.num_cols())
            .map(|j| self.sense_factor * self.lp.obj(j))
            .collect();

        let keep_basis = match self.rep {
            Representation::Row => {
                let (work, map) =
                    dualize::build_dual(&self.lp, &base_cost, self.settings.infinity);
                self.cost = (0..work.num_cols()).map(|j| work.obj(j)).collect();
                self.wlp = work;
                self.dual_map = Some(map);
                false
            }
            _ => {
                self.wlp = self.lp.clone();
                self.dual_map = None;
                self.cost = base_cost;
                self.basis.is_defined()
                    && self.basis.num_cols() == self.wlp.num_cols()
                    && self.basis.dim() == self.wlp.num_rows()
            }
        };

        self.n = self.wlp.num_cols();
        self.m = self.wlp.num_rows();
        let eps = self.settings.epsilon_zero;
        self.f_vec = UpdateVector::new(self.m, eps);
        self.co_p_vec = UpdateVector::new(self.m, eps);
        self.p_vec = UpdateVector::new(self.n, eps);
        self.f_test = vec![0.0; self.m];
        self.test = vec![0.0; self.n];
        self.co_test = vec![0.0; self.m];
        self.lb_pos = vec![0.0; self.m];
        self.ub_pos = vec![0.0; self.m];
        self.delta_work = SsVector::new(self.m, eps);
        self.rhs_work = SsVector::new(self.m, eps);
        self.alpha_rows = SsVector::new(self.m, eps);

        self.rebuild_bounds();
        if !keep_basis {
            self.basis.install_slack(&self.wlp, &self.cost, self.settings.infinity);
        } else {
            // A warm basis may carry unknown nonbasic statuses; pin them
            // to a bound before the first factorization.
            for v in 0..self.total_vars() {
                if self.basis.status(v) == VarStatus::Undefined && !self.basis.is_basic(v) {
                    let st = self.exit_status(v);
                    self.basis.set_status(v, st);
                }
            }
        }

        let mut pricer = self.take_pricer();
        pricer.set_representation(self.rep);
        pricer.load(self.m, self.n);
        pricer.set_epsilon(self.settings.opt_tol);
        self.put_pricer(pricer);

        if !self.refactorize() {
            self.status = Status::Singular;
            return false;
        }
        self.recompute_all();
        true
    }

    /// Map kernel-level verdicts on the work model back to the loaded
    /// problem, including the row-representation swap of certificates.
    fn finalize_verdict(&mut self, _t0: &Instant) {
        match (self.rep, self.status) {
            (Representation::Row, Status::Unbounded) => {
                // The dual work model is unbounded: the original is
                // infeasible, the work ray is the Farkas certificate.
                if let Some(ray) = self.work_ray.take() {
                    let map = self.dual_map.as_ref().expect("dual map");
                    self.dual_farkas = Some(map.recover_farkas(&ray));
                }
                self.status = Status::Infeasible;
            }
            (Representation::Row, Status::Infeasible) => {
                // The dual work model is infeasible: the original is
                // unbounded or infeasible. Its Farkas certificate maps
                // to a candidate primal ray.
                let candidate = self.work_farkas.take().map(|f| {
                    let map = self.dual_map.as_ref().expect("dual map");
                    map.recover_ray(&f)
                });
                match candidate {
                    Some(ray) if self.verify_primal_ray(&ray) => {
                        self.primal_ray = Some(ray);
                        self.status = Status::Unbounded;
                    }
                    _ => {
                        if self.settings.ensure_ray && self.rep_override.is_none() {
                            // Certifying re-solve in the column space.
                            self.rep_override = Some(Representation::Column);
                            self.basis = Basis::new();
                            self.dirty = true;
                            let t0 = Instant::now();
                            let _ = self.solve_inner(&t0);
                        } else {
                            self.status = Status::InfOrUnbd;
                        }
                    }
                }
            }
            (_, Status::Unbounded) => {
                if let Some(ray) = self.work_ray.take() {
                    self.primal_ray = Some(ray);
                }
            }
            (_, Status::Infeasible) => {
                if let Some(farkas) = self.work_farkas.take() {
                    self.dual_farkas = Some(farkas);
                }
            }
            _ => {}
        }
    }

    /// Check a candidate ray of the loaded problem: recession direction
    /// with strictly improving objective.
    fn verify_primal_ray(&self, ray: &[f64]) -> bool {
        let inf = self.settings.infinity;
        let tol = self.settings.feas_tol;
        let norm = ray.iter().map(|v| v.abs()).fold(0.0_f64, f64::max);
        if norm <= tol {
            return false;
        }
        let mut improve = 0.0;
        for j in 0..self.lp.num_cols() {
            improve += self.sense_factor * self.lp.obj(j) * ray[j];
            if self.lp.lower(j) > -inf && ray[j] < -tol * norm {
                return false;
            }
            if self.lp.upper(j) < inf && ray[j] > tol * norm {
                return false;
            }
        }
        if improve >= -self.settings.opt_tol * norm {
            return false;
        }
        for r in 0..self.lp.num_rows() {
            let a_ray: f64 = self.lp.row(r).iter().map(|nz| nz.val * ray[nz.idx]).sum();
            if self.lp.lhs(r) > -inf && a_ray < -tol * norm {
                return false;
            }
            if self.lp.rhs(r) < inf && a_ray > tol * norm {
                return false;
            }
        }
        true
    }

    /// Materialize the solution accessors in original-problem space.
    fn extract_solution(&mut self) {
        let nn = self.lp.num_cols();
        let mm = self.lp.num_rows();
        self.sol_primal = vec![0.0; nn];
        self.sol_duals = vec![0.0; mm];
        self.sol_redcost = vec![0.0; nn];
        self.sol_slacks = vec![0.0; mm];

        if self.m == 0 && self.n == 0 {
            self.obj_val = self.lp.obj_offset();
            return;
        }

        // Work-model primal and dual iterates.
        let mut work_x = vec![0.0; self.n];
        for (j, x) in work_x.iter_mut().enumerate() {
            *x = match self.basis.pos_of(j) {
                Some(p) => self.f_vec[p],
                None => self.nonbasic_value(j),
            };
        }
        let work_y: Vec<f64> = (0..self.m).map(|r| self.co_p_vec[r]).collect();

        match self.rep {
            Representation::Row => {
                let map = self.dual_map.as_ref().expect("dual map").clone();
                let primal = map.recover_primal(&work_y);
                self.sol_primal.copy_from_slice(&primal);
                let duals = map.recover_duals(&work_x);
                let redcost = map.recover_redcost(&work_x);
                for r in 0..mm {
                    self.sol_duals[r] = self.sense_factor * duals[r];
                }
                for j in 0..nn {
                    self.sol_redcost[j] = self.sense_factor * redcost[j];
                }
            }
            _ => {
                self.sol_primal.copy_from_slice(&work_x[..nn]);
                for r in 0..mm {
                    self.sol_duals[r] = self.sense_factor * work_y[r];
                }
                for j in 0..nn {
                    let d = self.cost[j] - self.p_vec[j];
                    self.sol_redcost[j] = self.sense_factor * d;
                }
            }
        }

        // Row activities from the original matrix.
        for r in 0..mm {
            self.sol_slacks[r] = self
                .lp
                .row(r)
                .iter()
                .map(|nz| nz.val * self.sol_primal[nz.idx])
                .sum();
        }

        self.obj_val = (0..nn)
            .map(|j| self.lp.obj(j) * self.sol_primal[j])
            .sum::<f64>()
            + self.lp.obj_offset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INF: f64 = 1e100;

    /// min x + y  s.t.  x + y >= 1,  x, y in [0, 10], solved so the
    /// working bounds and basis are populated.
    fn solved_engine() -> Engine {
        let mut lp = LpModel::new();
        lp.add_row(1.0, &[], INF).unwrap();
        lp.add_col(1.0, 0.0, &[(0, 1.0)], 10.0).unwrap();
        lp.add_col(1.0, 0.0, &[(0, 1.0)], 10.0).unwrap();
        let mut e = Engine::new(Settings::default());
        e.wire_defaults();
        e.load(lp);
        assert_eq!(e.solve().unwrap(), Status::Optimal);
        e
    }

    fn perturbed_vars(e: &Engine, lb0: &[f64], ub0: &[f64]) -> Vec<usize> {
        (0..e.total_vars())
            .filter(|&v| e.lb[v] != lb0[v] || e.ub[v] != ub0[v])
            .collect()
    }

    #[test]
    fn test_single_pivot_perturbation_stays_local() {
        let mut e = solved_engine();
        let lb0 = e.lb.clone();
        let ub0 = e.ub.clone();

        // Default mode: only the bounds tied to the stalled pivot move.
        e.settings.full_perturbation = false;
        e.perturb_stalled(&[1]);
        assert_eq!(perturbed_vars(&e, &lb0, &ub0), vec![1]);
        assert!(e.restore_bounds());

        // FULLPERTURBATION: the whole problem is perturbed, including
        // bounds the stalled pivot never touched.
        e.settings.full_perturbation = true;
        e.perturb_stalled(&[1]);
        let full = perturbed_vars(&e, &lb0, &ub0);
        assert!(full.len() > 1, "full perturbation touched only {:?}", full);
        assert!(full.contains(&1));
    }

    #[test]
    fn test_degenerate_basics_scope() {
        let e = solved_engine();
        // At the optimum of the covering LP one variable is basic at
        // value 1, strictly inside [0, 10]: no degenerate basic.
        assert!(e.degenerate_basics().is_empty());
    }
}
