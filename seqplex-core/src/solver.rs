//! High-level solver facade.
//!
//! [`Solver`] owns an [`Engine`] with default components wired from the
//! settings, and exposes the model-editing, parameter, solve, and query
//! surface the C interface builds on. The engine remains available for
//! callers that want to install their own pricer, ratio tester, or
//! factorization backend.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::basis::{BasisError, VarStatus};
use crate::engine::{Engine, SolverError};
use crate::lp::{LpModel, ModelError, Sense};
use crate::settings::{BoolParam, IntParam, RealParam, Settings, SettingsError};
use crate::status::Status;

/// Snapshot of a finished run, as returned by [`solve`](crate::solve).
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub status: Status,
    pub obj_val: f64,
    pub primal: Vec<f64>,
    pub duals: Vec<f64>,
    pub reduced_costs: Vec<f64>,
    pub slacks: Vec<f64>,
    pub primal_ray: Option<Vec<f64>>,
    pub dual_farkas: Option<Vec<f64>>,
    pub iterations: usize,
    pub solve_time: f64,
}

/// A sequential revised-simplex LP solver instance.
pub struct Solver {
    engine: Engine,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let mut engine = Engine::new(settings);
        engine.wire_defaults();
        Self { engine }
    }

    /// The underlying engine, for component injection and inspection.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    pub fn settings(&self) -> &Settings {
        self.engine.settings()
    }

    pub fn set_bool_param(&mut self, p: BoolParam, v: bool) {
        self.engine.settings_mut().set_bool_param(p, v);
    }

    pub fn bool_param(&self, p: BoolParam) -> bool {
        self.engine.settings().bool_param(p)
    }

    pub fn set_int_param(&mut self, p: IntParam, v: i64) -> Result<(), SettingsError> {
        self.engine.settings_mut().set_int_param(p, v)
    }

    pub fn int_param(&self, p: IntParam) -> i64 {
        self.engine.settings().int_param(p)
    }

    pub fn set_real_param(&mut self, p: RealParam, v: f64) -> Result<(), SettingsError> {
        self.engine.settings_mut().set_real_param(p, v)?;
        // The objective offset lives on the model; the settings entry
        // mirrors it for the parameter and settings-file surfaces.
        if p == RealParam::ObjOffset {
            self.engine.model_mut().set_obj_offset(v);
        }
        Ok(())
    }

    pub fn real_param(&self, p: RealParam) -> f64 {
        if p == RealParam::ObjOffset {
            return self.engine.model().obj_offset();
        }
        self.engine.settings().real_param(p)
    }

    pub fn read_settings_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SettingsError> {
        self.engine.settings_mut().read_file(path)?;
        let offset = self.engine.settings().obj_offset;
        self.engine.model_mut().set_obj_offset(offset);
        Ok(())
    }

    pub fn write_settings_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        self.engine.settings().write_file(path)
    }

    // ------------------------------------------------------------------
    // Model editing
    // ------------------------------------------------------------------

    pub fn load(&mut self, lp: LpModel) {
        let offset = lp.obj_offset();
        self.engine.load(lp);
        let _ = self
            .engine
            .settings_mut()
            .set_real_param(RealParam::ObjOffset, offset);
    }

    pub fn clear(&mut self) {
        self.load(LpModel::new());
    }

    pub fn model(&self) -> &LpModel {
        self.engine.model()
    }

    pub fn num_rows(&self) -> usize {
        self.engine.model().num_rows()
    }

    pub fn num_cols(&self) -> usize {
        self.engine.model().num_cols()
    }

    /// Append a column. Structural changes reset the basis to undefined;
    /// the pricer migrates its per-variable state.
    pub fn add_col(
        &mut self,
        obj: f64,
        lower: f64,
        entries: &[(usize, f64)],
        upper: f64,
    ) -> Result<usize, ModelError> {
        let j = self.engine.model_mut().add_col(obj, lower, entries, upper)?;
        self.engine.pricer_added_cols(1);
        self.engine.invalidate_basis();
        Ok(j)
    }

    pub fn add_row(
        &mut self,
        lhs: f64,
        entries: &[(usize, f64)],
        rhs: f64,
    ) -> Result<usize, ModelError> {
        let r = self.engine.model_mut().add_row(lhs, entries, rhs)?;
        self.engine.pricer_added_rows(1);
        self.engine.invalidate_basis();
        Ok(r)
    }

    pub fn remove_col(&mut self, j: usize) -> Result<(), ModelError> {
        self.engine.model_mut().remove_col(j)?;
        self.engine.pricer_removed_col(j);
        self.engine.invalidate_basis();
        Ok(())
    }

    pub fn remove_row(&mut self, r: usize) -> Result<(), ModelError> {
        self.engine.model_mut().remove_row(r)?;
        self.engine.pricer_removed_row(r);
        self.engine.invalidate_basis();
        Ok(())
    }

    /// Remove a set of columns; returns `perm[old] = new | -1`.
    pub fn remove_cols(&mut self, nums: &[usize]) -> Result<Vec<i32>, ModelError> {
        let perm = self.engine.model_mut().remove_cols(nums)?;
        self.engine.pricer_removed_cols(&perm);
        self.engine.invalidate_basis();
        Ok(perm)
    }

    /// Remove a set of rows; returns `perm[old] = new | -1`.
    pub fn remove_rows(&mut self, nums: &[usize]) -> Result<Vec<i32>, ModelError> {
        let perm = self.engine.model_mut().remove_rows(nums)?;
        self.engine.pricer_removed_rows(&perm);
        self.engine.invalidate_basis();
        Ok(perm)
    }

    pub fn change_obj(&mut self, j: usize, v: f64) -> Result<(), ModelError> {
        self.engine.model_mut().change_obj(j, v)
    }

    pub fn change_obj_all(&mut self, obj: &[f64]) -> Result<(), ModelError> {
        for (j, &v) in obj.iter().enumerate() {
            self.engine.model_mut().change_obj(j, v)?;
        }
        Ok(())
    }

    pub fn change_bounds(&mut self, j: usize, lo: f64, up: f64) -> Result<(), ModelError> {
        self.engine.model_mut().change_bounds(j, lo, up)
    }

    pub fn change_bounds_all(&mut self, lo: &[f64], up: &[f64]) -> Result<(), ModelError> {
        for j in 0..lo.len().min(up.len()) {
            self.engine.model_mut().change_bounds(j, lo[j], up[j])?;
        }
        Ok(())
    }

    pub fn change_lower(&mut self, j: usize, lo: f64) -> Result<(), ModelError> {
        self.engine.model_mut().change_lower(j, lo)
    }

    pub fn change_upper(&mut self, j: usize, up: f64) -> Result<(), ModelError> {
        self.engine.model_mut().change_upper(j, up)
    }

    pub fn change_lhs(&mut self, r: usize, lhs: f64) -> Result<(), ModelError> {
        self.engine.model_mut().change_lhs(r, lhs)
    }

    pub fn change_rhs(&mut self, r: usize, rhs: f64) -> Result<(), ModelError> {
        self.engine.model_mut().change_rhs(r, rhs)
    }

    pub fn change_range(&mut self, r: usize, lhs: f64, rhs: f64) -> Result<(), ModelError> {
        self.engine.model_mut().change_range(r, lhs, rhs)
    }

    pub fn change_lhs_all(&mut self, lhs: &[f64]) -> Result<(), ModelError> {
        for (r, &v) in lhs.iter().enumerate() {
            self.engine.model_mut().change_lhs(r, v)?;
        }
        Ok(())
    }

    pub fn change_rhs_all(&mut self, rhs: &[f64]) -> Result<(), ModelError> {
        for (r, &v) in rhs.iter().enumerate() {
            self.engine.model_mut().change_rhs(r, v)?;
        }
        Ok(())
    }

    pub fn change_sense(&mut self, sense: Sense) {
        self.engine.model_mut().set_sense(sense);
    }

    pub fn change_obj_offset(&mut self, offset: f64) {
        self.engine.model_mut().set_obj_offset(offset);
        let _ = self
            .engine
            .settings_mut()
            .set_real_param(RealParam::ObjOffset, offset);
    }

    // ------------------------------------------------------------------
    // Solving and queries
    // ------------------------------------------------------------------

    /// Install (or clear) the cooperative interrupt flag, polled at
    /// iteration boundaries.
    pub fn set_interrupt(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.engine.set_interrupt(flag);
    }

    pub fn optimize(&mut self) -> Result<Status, SolverError> {
        self.engine.solve()
    }

    pub fn status(&self) -> Status {
        self.engine.status()
    }

    pub fn objective_value(&self) -> f64 {
        self.engine.objective_value()
    }

    pub fn primal(&self) -> &[f64] {
        self.engine.primal()
    }

    pub fn duals(&self) -> &[f64] {
        self.engine.duals()
    }

    pub fn reduced_costs(&self) -> &[f64] {
        self.engine.reduced_costs()
    }

    pub fn slacks(&self) -> &[f64] {
        self.engine.slacks()
    }

    pub fn primal_ray(&self) -> Option<&[f64]> {
        self.engine.primal_ray()
    }

    pub fn dual_farkas(&self) -> Option<&[f64]> {
        self.engine.dual_farkas()
    }

    pub fn has_primal_ray(&self) -> bool {
        self.engine.has_primal_ray()
    }

    pub fn has_dual_farkas(&self) -> bool {
        self.engine.has_dual_farkas()
    }

    pub fn iterations(&self) -> usize {
        self.engine.iterations()
    }

    pub fn solving_time(&self) -> f64 {
        self.engine.solving_time()
    }

    /// Whether the stored primal solution satisfies all bounds and row
    /// sides within the feasibility tolerance.
    pub fn is_primal_feasible(&self) -> bool {
        if !self.status().has_solution() {
            return false;
        }
        let lp = self.engine.model();
        let s = self.engine.settings();
        let x = self.engine.primal();
        let act = self.engine.slacks();
        let inf = s.infinity;
        let tol = s.feas_tol;
        for j in 0..lp.num_cols() {
            if lp.lower(j) > -inf && x[j] < lp.lower(j) - tol {
                return false;
            }
            if lp.upper(j) < inf && x[j] > lp.upper(j) + tol {
                return false;
            }
        }
        for r in 0..lp.num_rows() {
            if lp.lhs(r) > -inf && act[r] < lp.lhs(r) - tol {
                return false;
            }
            if lp.rhs(r) < inf && act[r] > lp.rhs(r) + tol {
                return false;
            }
        }
        true
    }

    /// Whether the stored reduced costs match the basis statuses within
    /// the optimality tolerance.
    pub fn is_dual_feasible(&self) -> bool {
        if !self.status().has_solution() {
            return false;
        }
        let lp = self.engine.model();
        let s = self.engine.settings();
        let sign = match lp.sense() {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };
        for j in 0..lp.num_cols() {
            let d = sign * self.engine.reduced_costs()[j];
            match self.engine.col_status(j) {
                VarStatus::OnLower if d < -s.opt_tol => return false,
                VarStatus::OnUpper if d > s.opt_tol => return false,
                VarStatus::Zero | VarStatus::Basic if d.abs() > s.opt_tol => return false,
                _ => {}
            }
        }
        true
    }

    pub fn col_status(&self, j: usize) -> VarStatus {
        self.engine.col_status(j)
    }

    pub fn row_status(&self, r: usize) -> VarStatus {
        self.engine.row_status(r)
    }

    pub fn write_basis_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BasisError> {
        self.engine.write_basis(path.as_ref())
    }

    pub fn read_basis_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), BasisError> {
        self.engine.read_basis(path.as_ref())
    }

    /// Collect the result accessors into one snapshot.
    pub fn result(&self) -> SolveResult {
        SolveResult {
            status: self.status(),
            obj_val: self.objective_value(),
            primal: self.primal().to_vec(),
            duals: self.duals().to_vec(),
            reduced_costs: self.reduced_costs().to_vec(),
            slacks: self.slacks().to_vec(),
            primal_ray: self.primal_ray().map(|r| r.to_vec()),
            dual_farkas: self.dual_farkas().map(|f| f.to_vec()),
            iterations: self.iterations(),
            solve_time: self.solving_time(),
        }
    }
}
