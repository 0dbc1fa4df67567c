//! Pricing: selection of the pivot candidate at each iteration.
//!
//! A pricer is bound to the engine through the capability interface
//! below: it never holds a reference back into the engine, all data it
//! may consult arrives as borrowed views in a [`PriceCtx`].

pub mod dantzig;
pub mod devex;

use crate::algebra::UpdateVector;
use crate::settings::Representation;

pub use dantzig::DantzigPricer;
pub use devex::DevexPricer;

/// Which iteration kernel is running.
///
/// `Enter` picks an entering nonbasic variable by reduced-cost
/// infeasibility; `Leave` picks a leaving basic variable by primal
/// infeasibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplexType {
    Enter,
    Leave,
}

/// Identifier of a pivot candidate: a structural column or a row's
/// logical variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarId {
    Col(usize),
    Row(usize),
}

/// Borrowed views of the engine state a pricer may consult.
///
/// Test conventions: every entry is nonnegative for feasible candidates
/// and negative for infeasible ones, so "most infeasible" means most
/// negative. `f_test` is indexed by basis position, `test` by structural
/// column, `co_test` by row.
pub struct PriceCtx<'a> {
    /// Selection tolerance (the dual feasibility tolerance for `Enter`,
    /// the primal one for `Leave`).
    pub epsilon: f64,
    /// Primal feasibility test of the basic solution, by basis position.
    pub f_test: &'a [f64],
    /// Reduced-cost test of the structural nonbasic variables.
    pub test: &'a [f64],
    /// Reduced-cost test of the logical (row) nonbasic variables.
    pub co_test: &'a [f64],
    /// Basic solution update vector; its delta is the last pivot column
    /// image `B^-1 a_q`.
    pub f_vec: &'a UpdateVector,
    /// Dual multiplier update vector; its delta is the last `B^-T e_p`.
    pub co_p_vec: &'a UpdateVector,
    /// Structural reduced-cost update vector; its delta is `A^T rho`.
    pub p_vec: &'a UpdateVector,
    /// When sparse pricing is active: the positions with `f_test < 0`.
    pub leave_candidates: Option<&'a [usize]>,
    /// When sparse pricing is active: the violated structural columns
    /// and rows for entering selection.
    pub enter_candidates: Option<(&'a [usize], &'a [usize])>,
}

/// Candidate selection and pivot-weight maintenance.
///
/// The engine guarantees: exactly one `select_*` call per iteration,
/// followed by exactly one `entered`/`left` notification if and only if
/// the pivot was committed, and no structural callbacks during an
/// iteration.
pub trait Pricer {
    fn name(&self) -> &'static str;

    /// Bind to an engine of the given dimensions (`dim` basis positions
    /// and rows, `co_dim` structural columns).
    fn load(&mut self, dim: usize, co_dim: usize);

    /// Reconfigure for a representation change. Dimensions arrive
    /// through `load`; implementations may reset internal weights.
    fn set_representation(&mut self, rep: Representation);

    /// Reconfigure for the entering or leaving kernel. May reset
    /// internal weights.
    fn set_type(&mut self, ty: SimplexType);

    /// Selection tolerance.
    fn set_epsilon(&mut self, eps: f64);

    /// `n` structural variables were appended.
    fn added_vecs(&mut self, n: usize);

    /// `n` rows were appended.
    fn added_co_vecs(&mut self, n: usize);

    /// Structural variable `i` was removed (the last one took its slot).
    fn removed_vec(&mut self, i: usize);

    /// Row `i` was removed (the last one took its slot).
    fn removed_co_vec(&mut self, i: usize);

    /// A batch of structural variables was removed; `perm[old] = new`
    /// or `-1`.
    fn removed_vecs(&mut self, perm: &[i32]);

    /// A batch of rows was removed; `perm[old] = new` or `-1`.
    fn removed_co_vecs(&mut self, perm: &[i32]);

    /// Pick a primal-infeasible basis position, or `None` if none
    /// violates the tolerance.
    fn select_leave(&mut self, ctx: &PriceCtx<'_>) -> Option<usize>;

    /// Pick an entering variable, or `None` if no reduced cost violates
    /// the tolerance.
    fn select_enter(&mut self, ctx: &PriceCtx<'_>) -> Option<VarId>;

    /// Posted after a committed entering pivot: `id` entered the basis
    /// at position `n`. Implementations may ignore `id`; it is carried
    /// for signature uniformity across pricers.
    fn entered(&mut self, id: VarId, n: usize, ctx: &PriceCtx<'_>);

    /// Posted after a committed leaving pivot: the variable at position
    /// `n` left the basis, `id` names it.
    fn left(&mut self, n: usize, id: VarId, ctx: &PriceCtx<'_>);
}

/// Swap-with-tail migration of one per-variable weight slot.
pub(crate) fn migrate_removed(weights: &mut crate::algebra::DVector, i: usize) {
    let last = weights.dim() - 1;
    if i != last {
        weights[i] = weights[last];
    }
    weights.re_dim(last);
}

/// Batch migration of per-variable weights under a removal permutation.
pub(crate) fn migrate_removed_set(weights: &mut crate::algebra::DVector, perm: &[i32]) {
    let mut kept = 0usize;
    for (old, &p) in perm.iter().enumerate() {
        if p >= 0 {
            weights[p as usize] = weights[old];
            kept += 1;
        }
    }
    weights.re_dim(kept);
}
