//! Basis factorization backend.
//!
//! The engine talks to the factorization through [`FactorBackend`]; the
//! default implementation is the in-repo sparse LU with product-form
//! updates in [`lu`].

pub mod lu;

use thiserror::Error;

use crate::algebra::{SVector, SsVector};

pub use lu::SparseLu;

#[derive(Debug, Error)]
pub enum FactorError {
    #[error("singular basis: {unpivoted} rows left unpivoted after stage {stage}")]
    Singular { stage: usize, unpivoted: usize },

    #[error("dimension mismatch: factor dim {dim}, got {got} columns")]
    Dimension { dim: usize, got: usize },
}

/// Outcome of a rank-1 factor update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateVerdict {
    /// Update absorbed; the factor remains usable.
    Ok,
    /// Update rejected or quality degraded; refactorize before the next
    /// solve.
    NeedsRefactor,
}

/// A factorization of the basis matrix `B`.
///
/// `B` is `dim x dim`; its columns are indexed by *basis position*, its
/// rows by constraint row. Right solves map a row-space vector to a
/// position-space vector, left solves the transpose. Both produce
/// semi-sparse results.
pub trait FactorBackend {
    /// Factorize the basis whose columns are `cols` (one sparse column
    /// per basis position, entries indexed by row). `basis` records
    /// which variable sits at each position, for consistency checks.
    fn load(&mut self, dim: usize, cols: &[SVector], basis: &[usize]) -> Result<(), FactorError>;

    /// Factorized dimension.
    fn dim(&self) -> usize;

    /// The basis indices supplied to the last successful `load`.
    fn basis_indices(&self) -> &[usize];

    /// Solve `B x = b` in place: on entry `x` holds `b` (row space), on
    /// return the solution over basis positions, index set rebuilt.
    fn solve_right(&mut self, x: &mut SsVector);

    /// Solve `B^T y = c` in place: on entry `x` holds `c` (position
    /// space), on return the solution over rows, index set rebuilt.
    fn solve_left(&mut self, x: &mut SsVector);

    /// Absorb the basis change at position `pos`: variable `entering`
    /// replaces the old occupant, `delta` is the solve-right image of
    /// its column, and `pivot = delta[pos]`. The reported basis indices
    /// track the change.
    ///
    /// When the verdict is `NeedsRefactor` the update may not have been
    /// absorbed: the caller must refactorize before the next solve.
    fn update(&mut self, pos: usize, entering: usize, delta: &SsVector, pivot: f64)
        -> UpdateVerdict;

    /// Rough condition estimate from the pivot magnitudes.
    fn condition_estimate(&self) -> f64;

    /// Nonzeros currently held (base factors plus updates).
    fn nonzeros(&self) -> usize;

    /// Nonzeros of the base factorization alone.
    fn base_nonzeros(&self) -> usize;

    /// Number of updates absorbed since the last `load`.
    fn updates(&self) -> usize;

    /// After a `Singular` load failure: the rows and basis positions the
    /// elimination could not pivot, so the caller can patch the basis.
    fn singular_rows_positions(&self) -> (&[usize], &[usize]);
}
