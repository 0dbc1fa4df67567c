//! Ratio tests: step-size selection along a pivot direction.

pub mod boundflip;
pub mod textbook;

use crate::algebra::SsVector;
use crate::basis::VarStatus;
use crate::pricer::VarId;

pub use boundflip::BoundFlippingRatioTester;
pub use textbook::TextbookRatioTester;

/// Context of the primal (entering) ratio test: find the maximum step of
/// the entering variable that keeps every basic value within its bounds.
pub struct EnterCtx<'a> {
    /// Rate of change of each basic value per unit entering step,
    /// indexed by basis position.
    pub rate: &'a SsVector,
    /// Current basic values by position.
    pub values: &'a [f64],
    /// Bounds of the variable at each basis position.
    pub lb: &'a [f64],
    pub ub: &'a [f64],
    /// The entering variable's own bound-to-bound range.
    pub max_step: f64,
    pub eps_zero: f64,
    pub eps_pivot: f64,
    pub feas_tol: f64,
    pub infinity: f64,
}

/// Outcome of the primal ratio test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnterResult {
    /// The basic variable at `pos` blocks after `step`.
    Blocked { pos: usize, step: f64 },
    /// The entering variable reaches its opposite bound first; no basis
    /// change.
    BoundFlip { step: f64 },
    /// No bound blocks the improving direction.
    Unbounded,
}

/// Context of the dual (leaving) ratio test: given the pivot row of the
/// leaving variable, find the entering candidate that preserves dual
/// feasibility, possibly extending the step through bound flips.
pub struct LeaveCtx<'a> {
    /// Pivot row over structural columns: `a_j^T rho`.
    pub alpha_cols: &'a SsVector,
    /// Pivot row over logical variables.
    pub alpha_rows: &'a SsVector,
    /// Reduced costs of the structural columns.
    pub d_cols: &'a [f64],
    /// Reduced costs of the logical variables.
    pub d_rows: &'a [f64],
    /// Status per variable (columns then logicals).
    pub status: &'a [VarStatus],
    /// Working bounds per variable (columns then logicals).
    pub lb: &'a [f64],
    pub ub: &'a [f64],
    /// Number of structural columns.
    pub n: usize,
    /// Orientation: `w_j = sign * alpha_j` is the rate at which a unit
    /// of dual step tightens candidate `j`'s reduced cost.
    pub sign: f64,
    /// Primal infeasibility of the leaving variable (positive).
    pub infeas: f64,
    pub eps_zero: f64,
    pub eps_pivot: f64,
    pub opt_tol: f64,
    pub infinity: f64,
    /// Bound flips admitted on the structural side.
    pub allow_col_flips: bool,
    /// Bound flips admitted on the row side.
    pub allow_row_flips: bool,
}

/// Outcome of the dual ratio test.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveResult {
    /// `entering` enters after the listed nonbasic variables flip to
    /// their opposite bounds.
    Entering { entering: VarId, flips: Vec<VarId> },
    /// No candidate can absorb the dual step: proof of infeasibility.
    NoCandidate,
}

/// Pluggable step-size selection.
///
/// `select_leave` runs in the entering kernel (it determines which basic
/// variable leaves); `select_enter` runs in the leaving kernel. The
/// naming follows the kernels' selection duty, dual to the pricer's.
pub trait RatioTester {
    fn name(&self) -> &'static str;

    fn select_leave(&mut self, ctx: &EnterCtx<'_>) -> EnterResult;

    fn select_enter(&mut self, ctx: &LeaveCtx<'_>) -> LeaveResult;
}

/// One dual-side candidate: eligible entering variable with its ratio.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DualCandidate {
    pub id: VarId,
    pub ratio: f64,
    pub weight: f64,
    pub flippable: bool,
    pub range: f64,
}

/// Collect the eligible dual candidates of `ctx`, unsorted.
pub(crate) fn dual_candidates(ctx: &LeaveCtx<'_>) -> Vec<DualCandidate> {
    let mut out = Vec::new();
    let mut consider = |id: VarId, alpha: f64, d: f64, var: usize, flips_allowed: bool| {
        let st = ctx.status[var];
        let w = ctx.sign * alpha;
        if w.abs() < ctx.eps_zero {
            return;
        }
        let eligible = match st {
            VarStatus::OnLower => w > ctx.eps_zero,
            VarStatus::OnUpper => w < -ctx.eps_zero,
            VarStatus::Zero => true,
            VarStatus::Basic | VarStatus::Fixed | VarStatus::Undefined => false,
        };
        if !eligible {
            return;
        }
        // Ratio at which this candidate's reduced cost reaches zero.
        let ratio = (d / w).max(0.0);
        let lo = ctx.lb[var];
        let up = ctx.ub[var];
        let flippable =
            flips_allowed && st != VarStatus::Zero && lo > -ctx.infinity && up < ctx.infinity;
        out.push(DualCandidate {
            id,
            ratio,
            weight: w.abs(),
            flippable,
            range: up - lo,
        });
    };

    for (j, alpha) in ctx.alpha_cols.iter_nonzero() {
        consider(VarId::Col(j), alpha, ctx.d_cols[j], j, ctx.allow_col_flips);
    }
    for (r, alpha) in ctx.alpha_rows.iter_nonzero() {
        consider(
            VarId::Row(r),
            alpha,
            ctx.d_rows[r],
            ctx.n + r,
            ctx.allow_row_flips,
        );
    }
    out
}
