//! Simple LP example demonstrating the seqplex solver.
//!
//! Solves:
//!   minimize    2 x1 + 3 x2
//!   subject to  x1 + x2 >= 10
//!               x1 - x2 <= 4
//!               0 <= x1 <= 8, x2 >= 0
//!
//! Optimal solution: x1 = 7, x2 = 3, objective = 23.

use seqplex_core::{Solver, Status};

const INF: f64 = 1e100;

fn main() {
    let mut solver = Solver::new();

    solver.add_row(10.0, &[], INF).expect("row 0");
    solver.add_row(-INF, &[], 4.0).expect("row 1");
    solver
        .add_col(2.0, 0.0, &[(0, 1.0), (1, 1.0)], 8.0)
        .expect("col x1");
    solver
        .add_col(3.0, 0.0, &[(0, 1.0), (1, -1.0)], INF)
        .expect("col x2");

    match solver.optimize() {
        Ok(Status::Optimal) => {
            println!("status     : optimal");
            println!("objective  : {:.6}", solver.objective_value());
            println!("primal     : {:?}", solver.primal());
            println!("duals      : {:?}", solver.duals());
            println!("red. costs : {:?}", solver.reduced_costs());
            println!("iterations : {}", solver.iterations());
            println!("time       : {:.3}s", solver.solving_time());
        }
        Ok(status) => println!("finished with status: {}", status),
        Err(e) => eprintln!("solve failed: {}", e),
    }
}
