//! Seqplex: a sequential revised-simplex linear programming solver.
//!
//! A solver instance accepts an LP in the computational form
//!
//! ```text
//! minimize/maximize  c^T x + offset
//! subject to         lhs <= A x <= rhs
//!                    lo  <=  x  <= up
//! ```
//!
//! and returns a basic optimal solution, a Farkas certificate of primal
//! infeasibility, or a primal ray proving unboundedness.
//!
//! # Architecture
//!
//! - [`algebra`]: dense, sparse, and semi-sparse vectors, the deferred
//!   update vector carrying pivots, and the arena-backed sparse column
//!   set behind the constraint matrix.
//! - [`lp`]: the problem data model with synchronized column-wise and
//!   row-wise matrix storage.
//! - [`basis`]: the basic/nonbasic partition and basis-file I/O.
//! - [`factor`]: the factorization backend trait and the default sparse
//!   LU with product-form updates.
//! - [`pricer`]: candidate selection (Devex and Dantzig).
//! - [`ratio`]: step-size selection (textbook and bound-flipping).
//! - [`engine`]: the iteration state machine running either kernel in
//!   either representation.
//! - [`settings`] / [`status`]: the parameter dictionaries and status
//!   codes.
//!
//! # Example
//!
//! ```
//! use seqplex_core::{Solver, Status};
//!
//! // minimize x1 + x2  s.t.  x1 + x2 >= 1,  x1, x2 >= 0
//! let mut solver = Solver::new();
//! solver.add_row(1.0, &[], 1e100).unwrap();
//! solver.add_col(1.0, 0.0, &[(0, 1.0)], 1e100).unwrap();
//! solver.add_col(1.0, 0.0, &[(0, 1.0)], 1e100).unwrap();
//!
//! let status = solver.optimize().unwrap();
//! assert_eq!(status, Status::Optimal);
//! assert!((solver.objective_value() - 1.0).abs() < 1e-6);
//! ```

pub mod algebra;
pub mod basis;
pub mod engine;
pub mod factor;
pub mod lp;
pub mod pricer;
pub mod ratio;
pub mod settings;
pub mod solver;
pub mod status;

pub use basis::VarStatus;
pub use engine::{Engine, Interrupt, SolverError};
pub use lp::{LpModel, ModelError, Sense};
pub use settings::{
    Algorithm, BoolParam, FactorUpdateType, HyperPricing, IntParam, Polishing, PricerType,
    RatioTesterType, RealParam, Representation, Settings, SettingsError,
};
pub use solver::{SolveResult, Solver};
pub use status::Status;

/// One-shot convenience wrapper: load, optimize, and collect.
pub fn solve(lp: LpModel, settings: &Settings) -> Result<SolveResult, SolverError> {
    let mut solver = Solver::with_settings(settings.clone());
    solver.load(lp);
    solver.optimize()?;
    Ok(solver.result())
}
