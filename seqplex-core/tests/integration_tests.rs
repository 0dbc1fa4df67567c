//! End-to-end solver tests over small literal problems.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use seqplex_core::{
    BoolParam, IntParam, LpModel, RealParam, Sense, Settings, Solver, Status, VarStatus,
};

const INF: f64 = 1e100;

fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() < tol, "{} vs {} (tol {})", a, b, tol);
}

/// min x1 + x2  s.t.  x1 + x2 >= 1,  x >= 0
fn covering_lp() -> Solver {
    let mut s = Solver::new();
    s.add_row(1.0, &[], INF).unwrap();
    s.add_col(1.0, 0.0, &[(0, 1.0)], INF).unwrap();
    s.add_col(1.0, 0.0, &[(0, 1.0)], INF).unwrap();
    s
}

/// The classic production LP: min -3x - 5y
/// s.t. x <= 4, 2y <= 12, 3x + 2y <= 18, x, y >= 0.
/// Optimum at (2, 6) with objective -36.
fn production_lp() -> Solver {
    let mut s = Solver::new();
    s.add_row(-INF, &[], 4.0).unwrap();
    s.add_row(-INF, &[], 12.0).unwrap();
    s.add_row(-INF, &[], 18.0).unwrap();
    s.add_col(-3.0, 0.0, &[(0, 1.0), (2, 3.0)], INF).unwrap();
    s.add_col(-5.0, 0.0, &[(1, 2.0), (2, 2.0)], INF).unwrap();
    s
}

#[test]
fn test_trivial_minimization() {
    let mut s = covering_lp();
    let status = s.optimize().unwrap();
    assert_eq!(status, Status::Optimal);
    assert_close(s.objective_value(), 1.0, 1e-6);

    let x = s.primal();
    assert_close(x[0] + x[1], 1.0, 1e-6);
    assert!(x[0] >= -1e-9 && x[1] >= -1e-9);
    assert!(s.is_primal_feasible());
    assert!(s.is_dual_feasible());
    // covering row is tight, so its dual is 1
    assert_close(s.duals()[0], 1.0, 1e-6);
}

#[test]
fn test_degenerate_lp_terminates() {
    // min x1  s.t.  x1 >= 0,  x1 + x2 >= 0,  x1 - x2 >= 0,  x >= 0
    let mut s = Solver::new();
    s.add_row(0.0, &[], INF).unwrap();
    s.add_row(0.0, &[], INF).unwrap();
    s.add_row(0.0, &[], INF).unwrap();
    s.add_col(1.0, 0.0, &[(0, 1.0), (1, 1.0), (2, 1.0)], INF)
        .unwrap();
    s.add_col(0.0, 0.0, &[(1, 1.0), (2, -1.0)], INF).unwrap();

    let status = s.optimize().unwrap();
    assert_eq!(status, Status::Optimal);
    assert_ne!(status, Status::AbortCycling);
    assert_close(s.objective_value(), 0.0, 1e-6);
}

#[test]
fn test_unbounded_with_ray() {
    // min -x1  s.t.  x1 >= 0
    let mut s = Solver::new();
    s.add_row(0.0, &[], INF).unwrap();
    s.add_col(-1.0, 0.0, &[(0, 1.0)], INF).unwrap();

    let status = s.optimize().unwrap();
    assert_eq!(status, Status::Unbounded);
    assert!(s.has_primal_ray());
    let ray = s.primal_ray().unwrap();
    assert!(ray[0] > 1e-9, "ray should point in +x1, got {:?}", ray);
}

#[test]
fn test_infeasible_with_farkas() {
    // min 0  s.t.  x <= -1,  x >= 0
    let mut s = Solver::new();
    s.add_row(-INF, &[], -1.0).unwrap();
    s.add_col(0.0, 0.0, &[(0, 1.0)], INF).unwrap();

    let status = s.optimize().unwrap();
    assert_eq!(status, Status::Infeasible);
    assert!(s.has_dual_farkas());
    let farkas = s.dual_farkas().unwrap();
    let nonzero = farkas.iter().filter(|v| v.abs() > 1e-9).count();
    assert_eq!(nonzero, 1);
}

#[test]
fn test_iteration_limit() {
    let mut s = production_lp();
    s.set_int_param(IntParam::IterLimit, 1).unwrap();
    let status = s.optimize().unwrap();
    assert_eq!(status, Status::AbortIter);
    assert_eq!(s.iterations(), 1);

    // the partial basis is populated
    let statuses: Vec<VarStatus> = (0..s.num_cols()).map(|j| s.col_status(j)).collect();
    assert!(statuses.iter().any(|st| *st != VarStatus::Undefined));

    // raising the limit resumes to optimality
    s.set_int_param(IntParam::IterLimit, -1).unwrap();
    let status = s.optimize().unwrap();
    assert_eq!(status, Status::Optimal);
    assert_close(s.objective_value(), -36.0, 1e-6);
}

#[test]
fn test_interrupt_and_resume() {
    let mut s = production_lp();
    let flag = Arc::new(AtomicBool::new(true));
    s.set_interrupt(Some(flag.clone()));

    let status = s.optimize().unwrap();
    assert!(
        !status.is_terminal(),
        "interrupt must preserve a resumable status, got {:?}",
        status
    );

    flag.store(false, Ordering::Relaxed);
    let status = s.optimize().unwrap();
    assert_eq!(status, Status::Optimal);
    assert_close(s.objective_value(), -36.0, 1e-6);
    let x = s.primal();
    assert_close(x[0], 2.0, 1e-6);
    assert_close(x[1], 6.0, 1e-6);
}

#[test]
fn test_optimize_twice_is_idempotent() {
    let mut s = production_lp();
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    let iters = s.iterations();
    let obj = s.objective_value();

    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_eq!(s.iterations(), iters, "re-optimize performed iterations");
    assert_close(s.objective_value(), obj, 1e-12);
}

#[test]
fn test_add_remove_col_restores_solution() {
    let mut s = production_lp();
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    let obj = s.objective_value();
    let n = s.num_cols();

    let j = s.add_col(10.0, 0.0, &[(0, 1.0)], 1.0).unwrap();
    assert_eq!(s.num_cols(), n + 1);
    s.remove_col(j).unwrap();
    assert_eq!(s.num_cols(), n);

    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), obj, 1e-6);
}

#[test]
fn test_maximization() {
    // max 3x + 5y with the production constraints: optimum 36
    let mut s = production_lp();
    s.change_obj(0, 3.0).unwrap();
    s.change_obj(1, 5.0).unwrap();
    s.change_sense(Sense::Maximize);

    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), 36.0, 1e-6);
    assert_close(s.primal()[0], 2.0, 1e-6);
    assert_close(s.primal()[1], 6.0, 1e-6);
}

#[test]
fn test_objective_offset() {
    let mut s = covering_lp();
    s.change_obj_offset(10.0);
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), 11.0, 1e-6);
}

#[test]
fn test_obj_offset_parameter_surface() {
    let mut s = covering_lp();
    s.set_real_param(RealParam::ObjOffset, 10.0).unwrap();
    assert_eq!(s.real_param(RealParam::ObjOffset), 10.0);
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), 11.0, 1e-6);

    // the offset travels through the settings file like any real param
    let path = std::env::temp_dir().join("seqplex_it_offset.set");
    s.write_settings_file(&path).unwrap();
    let mut t = covering_lp();
    t.read_settings_file(&path).unwrap();
    assert_eq!(t.real_param(RealParam::ObjOffset), 10.0);
    assert_eq!(t.optimize().unwrap(), Status::Optimal);
    assert_close(t.objective_value(), 11.0, 1e-6);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_boxed_variables() {
    // min -x - y  s.t.  x + y <= 1.5,  x, y in [0, 1]
    let mut s = Solver::new();
    s.add_row(-INF, &[], 1.5).unwrap();
    s.add_col(-1.0, 0.0, &[(0, 1.0)], 1.0).unwrap();
    s.add_col(-1.0, 0.0, &[(0, 1.0)], 1.0).unwrap();

    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), -1.5, 1e-6);
    let x = s.primal();
    assert_close(x[0] + x[1], 1.5, 1e-6);
    assert!(x[0] <= 1.0 + 1e-9 && x[1] <= 1.0 + 1e-9);
}

#[test]
fn test_equality_rows() {
    // min x + 2y  s.t.  x + y = 2,  x - y = 0  ->  x = y = 1
    let mut s = Solver::new();
    s.add_row(2.0, &[], 2.0).unwrap();
    s.add_row(0.0, &[], 0.0).unwrap();
    s.add_col(1.0, -INF, &[(0, 1.0), (1, 1.0)], INF).unwrap();
    s.add_col(2.0, -INF, &[(0, 1.0), (1, -1.0)], INF).unwrap();

    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), 3.0, 1e-6);
    assert_close(s.primal()[0], 1.0, 1e-6);
    assert_close(s.primal()[1], 1.0, 1e-6);
}

#[test]
fn test_primal_algorithm_agrees_with_dual() {
    for alg in [0i64, 1] {
        let mut s = production_lp();
        s.set_int_param(IntParam::Algorithm, alg).unwrap();
        assert_eq!(s.optimize().unwrap(), Status::Optimal, "algorithm {}", alg);
        assert_close(s.objective_value(), -36.0, 1e-6);
    }
}

#[test]
fn test_dantzig_pricer_and_textbook_ratio() {
    let mut s = production_lp();
    s.set_int_param(IntParam::Pricer, 1).unwrap(); // Dantzig
    s.set_int_param(IntParam::RatioTester, 0).unwrap(); // Textbook
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), -36.0, 1e-6);
}

#[test]
fn test_row_representation_optimal() {
    let mut s = covering_lp();
    s.set_int_param(IntParam::Representation, 2).unwrap(); // Row
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), 1.0, 1e-6);
    let x = s.primal();
    assert_close(x[0] + x[1], 1.0, 1e-6);
    assert_close(s.duals()[0], 1.0, 1e-6);
}

#[test]
fn test_row_representation_infeasible() {
    let mut s = Solver::new();
    s.set_int_param(IntParam::Representation, 2).unwrap();
    s.add_row(-INF, &[], -1.0).unwrap();
    s.add_col(0.0, 0.0, &[(0, 1.0)], INF).unwrap();

    let status = s.optimize().unwrap();
    assert_eq!(status, Status::Infeasible);
    assert!(s.has_dual_farkas());
}

#[test]
fn test_row_representation_unbounded() {
    let mut s = Solver::new();
    s.set_int_param(IntParam::Representation, 2).unwrap();
    s.add_row(0.0, &[], INF).unwrap();
    s.add_col(-1.0, 0.0, &[(0, 1.0)], INF).unwrap();

    let status = s.optimize().unwrap();
    assert_eq!(status, Status::Unbounded);
    let ray = s.primal_ray().expect("verified ray");
    assert!(ray[0] > 1e-9);
}

#[test]
fn test_objective_limit_abort() {
    let mut s = production_lp();
    // the optimum is -36; abort once the incumbent falls below -10
    s.set_real_param(RealParam::ObjLimitLower, -10.0).unwrap();
    let status = s.optimize().unwrap();
    assert_eq!(status, Status::AbortValue);
}

#[test]
fn test_basis_file_round_trip_via_solver() {
    // pin the column representation so the basis space is the
    // original's
    let mut s = production_lp();
    s.set_int_param(IntParam::Representation, 1).unwrap();
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    let path = std::env::temp_dir().join("seqplex_it_basis.bas");
    s.write_basis_file(&path).unwrap();

    let mut t = production_lp();
    t.set_int_param(IntParam::Representation, 1).unwrap();
    t.read_basis_file(&path).unwrap();
    for j in 0..s.num_cols() {
        assert_eq!(s.col_status(j), t.col_status(j));
    }
    // warm start converges to the same optimum
    assert_eq!(t.optimize().unwrap(), Status::Optimal);
    assert_close(t.objective_value(), -36.0, 1e-6);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_settings_file_round_trip_via_solver() {
    let mut s = Solver::new();
    s.set_real_param(RealParam::FeasTol, 1e-8).unwrap();
    s.set_int_param(IntParam::IterLimit, 77).unwrap();
    s.set_bool_param(BoolParam::RowBoundFlips, true);

    let path = std::env::temp_dir().join("seqplex_it_settings.set");
    s.write_settings_file(&path).unwrap();

    let mut t = Solver::new();
    t.read_settings_file(&path).unwrap();
    assert_eq!(t.real_param(RealParam::FeasTol), 1e-8);
    assert_eq!(t.int_param(IntParam::IterLimit), 77);
    assert!(t.bool_param(BoolParam::RowBoundFlips));
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_from_csc_matches_incremental_build() {
    let mut lp = LpModel::new();
    lp.add_row(-INF, &[], 4.0).unwrap();
    lp.add_row(-INF, &[], 12.0).unwrap();
    lp.add_row(-INF, &[], 18.0).unwrap();
    lp.add_col(-3.0, 0.0, &[(0, 1.0), (2, 3.0)], INF).unwrap();
    lp.add_col(-5.0, 0.0, &[(1, 2.0), (2, 2.0)], INF).unwrap();

    let a = lp.to_csc();
    let rebuilt = LpModel::from_csc(
        &a,
        &[-3.0, -5.0],
        &[0.0, 0.0],
        &[INF, INF],
        &[-INF, -INF, -INF],
        &[4.0, 12.0, 18.0],
        Sense::Minimize,
    )
    .unwrap();

    let result = seqplex_core::solve(rebuilt, &Settings::default()).unwrap();
    assert_eq!(result.status, Status::Optimal);
    assert_close(result.obj_val, -36.0, 1e-6);
}

#[test]
fn test_no_problem_status() {
    let mut s = Solver::new();
    assert_eq!(s.optimize().unwrap(), Status::NoProblem);
}

#[test]
fn test_input_error_does_not_mutate_state() {
    let mut s = covering_lp();
    assert!(s.add_col(0.0, 2.0, &[], 1.0).is_err());
    assert_eq!(s.num_cols(), 2);
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
}

#[test]
fn test_free_variable_lp() {
    // min x  s.t.  x >= -5 via a row, x free
    let mut s = Solver::new();
    s.add_row(-5.0, &[], INF).unwrap();
    s.add_col(1.0, -INF, &[(0, 1.0)], INF).unwrap();

    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    assert_close(s.objective_value(), -5.0, 1e-6);
    assert_close(s.primal()[0], -5.0, 1e-6);
}

#[test]
fn test_reduced_cost_signs_at_optimum() {
    let mut s = production_lp();
    assert_eq!(s.optimize().unwrap(), Status::Optimal);
    let tol = 1e-6;
    for j in 0..s.num_cols() {
        let d = s.reduced_costs()[j];
        match s.col_status(j) {
            VarStatus::OnLower => assert!(d >= -tol, "col {}: {}", j, d),
            VarStatus::OnUpper => assert!(d <= tol, "col {}: {}", j, d),
            VarStatus::Basic => assert!(d.abs() <= tol, "col {}: {}", j, d),
            _ => {}
        }
    }
}
