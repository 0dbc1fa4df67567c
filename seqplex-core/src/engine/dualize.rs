//! Explicit dualization backing the row representation.
//!
//! The row-oriented solve works on the explicit dual of the loaded LP:
//! the basis dimension becomes the number of structural columns, which
//! is the point of the row representation. For the internal minimize
//! form
//!
//! ```text
//! min c^T x   s.t.  lhs <= A x <= rhs,  lo <= x <= up
//! ```
//!
//! the dual in the same computational form is
//!
//! ```text
//! min -lhs^T y+ + rhs^T y- - lo^T d+ + up^T d-
//! s.t. A^T (y+ - y-) + d+ - d- = c,   y+, y-, d+, d- >= 0
//! ```
//!
//! with a variable omitted (fixed at zero) whenever its objective
//! coefficient would be infinite. Solutions, rays, and certificates map
//! back through [`DualMap`].

use crate::lp::LpModel;

/// Index map from the original problem into the dualized work model.
///
/// Each entry is the work-column index of that dual variable, or `-1`
/// when the variable is fixed at zero because the corresponding bound is
/// infinite.
#[derive(Debug, Clone, Default)]
pub struct DualMap {
    pub n: usize,
    pub m: usize,
    pub yplus: Vec<i32>,
    pub yminus: Vec<i32>,
    pub dplus: Vec<i32>,
    pub dminus: Vec<i32>,
}

/// Build the dual work model for `lp` with internal (minimize) costs
/// `cost`.
pub fn build_dual(lp: &LpModel, cost: &[f64], infinity: f64) -> (LpModel, DualMap) {
    let n = lp.num_cols();
    let m = lp.num_rows();
    let mut work = LpModel::new();
    let mut map = DualMap {
        n,
        m,
        yplus: vec![-1; m],
        yminus: vec![-1; m],
        dplus: vec![-1; n],
        dminus: vec![-1; n],
    };

    // One equality row per original column: A^T y + d = c.
    for j in 0..n {
        work.add_row(cost[j], &[], cost[j]).expect("dual row");
    }

    for r in 0..m {
        let lhs = lp.lhs(r);
        let rhs = lp.rhs(r);
        if lhs > -infinity {
            let entries: Vec<(usize, f64)> =
                lp.row(r).iter().map(|nz| (nz.idx, nz.val)).collect();
            let col = work
                .add_col(-lhs, 0.0, &entries, infinity)
                .expect("dual col y+");
            map.yplus[r] = col as i32;
        }
        if rhs < infinity {
            let entries: Vec<(usize, f64)> =
                lp.row(r).iter().map(|nz| (nz.idx, -nz.val)).collect();
            let col = work
                .add_col(rhs, 0.0, &entries, infinity)
                .expect("dual col y-");
            map.yminus[r] = col as i32;
        }
    }
    for j in 0..n {
        let lo = lp.lower(j);
        let up = lp.upper(j);
        if lo > -infinity {
            let col = work
                .add_col(-lo, 0.0, &[(j, 1.0)], infinity)
                .expect("dual col d+");
            map.dplus[j] = col as i32;
        }
        if up < infinity {
            let col = work
                .add_col(up, 0.0, &[(j, -1.0)], infinity)
                .expect("dual col d-");
            map.dminus[j] = col as i32;
        }
    }

    (work, map)
}

impl DualMap {
    fn at(x: &[f64], idx: i32) -> f64 {
        if idx < 0 {
            0.0
        } else {
            x[idx as usize]
        }
    }

    /// Original row duals `y = y+ - y-` from the work primal solution.
    pub fn recover_duals(&self, work_x: &[f64]) -> Vec<f64> {
        (0..self.m)
            .map(|r| Self::at(work_x, self.yplus[r]) - Self::at(work_x, self.yminus[r]))
            .collect()
    }

    /// Original reduced costs `d = d+ - d-` from the work primal
    /// solution.
    pub fn recover_redcost(&self, work_x: &[f64]) -> Vec<f64> {
        (0..self.n)
            .map(|j| Self::at(work_x, self.dplus[j]) - Self::at(work_x, self.dminus[j]))
            .collect()
    }

    /// Original primal solution from the work row duals.
    pub fn recover_primal(&self, work_duals: &[f64]) -> Vec<f64> {
        work_duals.iter().map(|&y| -y).collect()
    }

    /// Farkas certificate of original infeasibility from a work primal
    /// ray (the dual problem is unbounded along it).
    pub fn recover_farkas(&self, work_ray: &[f64]) -> Vec<f64> {
        self.recover_duals(work_ray)
    }

    /// Candidate primal ray of the original problem from a work Farkas
    /// certificate. The caller must verify it before reporting
    /// `Unbounded`.
    pub fn recover_ray(&self, work_farkas: &[f64]) -> Vec<f64> {
        work_farkas.iter().map(|&y| -y).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INF: f64 = 1e100;

    #[test]
    fn test_dual_of_covering_lp() {
        // min x1 + x2  s.t.  x1 + x2 >= 1,  x >= 0
        let mut lp = LpModel::new();
        lp.add_row(1.0, &[], INF).unwrap();
        lp.add_col(1.0, 0.0, &[(0, 1.0)], INF).unwrap();
        lp.add_col(1.0, 0.0, &[(0, 1.0)], INF).unwrap();

        let (work, map) = build_dual(&lp, &[1.0, 1.0], INF);

        // dual: min -y+  s.t.  y+ + d1 = 1, y+ + d2 = 1, all >= 0
        assert_eq!(work.num_rows(), 2);
        assert_eq!(work.num_cols(), 3); // y+, d1+, d2+
        assert_eq!(map.yplus[0], 0);
        assert_eq!(map.yminus[0], -1); // rhs infinite
        assert_eq!(map.dplus, vec![1, 2]);
        assert_eq!(map.dminus, vec![-1, -1]);

        assert_eq!(work.obj(0), -1.0); // -lhs
        assert_eq!(work.lhs(0), 1.0);
        assert_eq!(work.rhs(0), 1.0);
        assert!((work.col(0).get(0) - 1.0).abs() < 1e-12);
        assert!((work.col(0).get(1) - 1.0).abs() < 1e-12);

        // recovery plumbing
        let work_x = [1.0, 0.0, 0.0];
        assert_eq!(map.recover_duals(&work_x), vec![1.0]);
        assert_eq!(map.recover_redcost(&work_x), vec![0.0, 0.0]);
        assert_eq!(map.recover_primal(&[-0.5, -0.5]), vec![0.5, 0.5]);
    }

    #[test]
    fn test_ranged_row_gets_both_columns() {
        // 1 <= x <= 2 as a row range
        let mut lp = LpModel::new();
        lp.add_row(1.0, &[], 2.0).unwrap();
        lp.add_col(0.0, -INF, &[(0, 1.0)], INF).unwrap();

        let (work, map) = build_dual(&lp, &[0.0], INF);
        assert!(map.yplus[0] >= 0);
        assert!(map.yminus[0] >= 0);
        assert_eq!(map.dplus[0], -1);
        assert_eq!(map.dminus[0], -1);
        assert_eq!(work.num_cols(), 2);
        assert_eq!(work.obj(map.yplus[0] as usize), -1.0);
        assert_eq!(work.obj(map.yminus[0] as usize), 2.0);
    }
}
