//! Sparse LU factorization with threshold-Markowitz pivoting and
//! product-form updates.

use crate::algebra::{SVector, SsVector};

use super::{FactorBackend, FactorError, UpdateVerdict};

/// Tunables of the LU backend.
#[derive(Debug, Clone)]
pub struct LuConfig {
    /// Stability threshold: a pivot candidate must reach this fraction of
    /// the largest magnitude in its column.
    pub min_markowitz: f64,
    /// Minimum acceptable pivot magnitude, for factorization and updates.
    pub epsilon_pivot: f64,
    /// Drop tolerance for computed fill-in.
    pub epsilon_zero: f64,
    /// Updates absorbed before a refactorization is demanded.
    pub max_updates: usize,
    /// Update fill-in budget as a multiple of the base factor nonzeros.
    pub update_fill: f64,
}

impl Default for LuConfig {
    fn default() -> Self {
        Self {
            min_markowitz: 0.01,
            epsilon_pivot: 1e-10,
            epsilon_zero: 1e-14,
            max_updates: 200,
            update_fill: 5.0,
        }
    }
}

/// One elimination stage: pivot row/column, the L column of multipliers
/// (original row indices), and the U row (original column positions).
#[derive(Debug, Clone)]
struct Stage {
    pr: usize,
    pc: usize,
    diag: f64,
    lcol: Vec<(usize, f64)>,
    urow: Vec<(usize, f64)>,
}

/// A product-form update column.
#[derive(Debug, Clone)]
struct Eta {
    pos: usize,
    pivot: f64,
    entries: Vec<(usize, f64)>,
}

/// The default factorization backend: right-looking sparse Gaussian
/// elimination with threshold-Markowitz pivot selection, followed by
/// product-form (eta) updates between refactorizations.
#[derive(Debug, Default)]
pub struct SparseLu {
    cfg: LuConfig,
    dim: usize,
    stages: Vec<Stage>,
    /// Per stage `k`: the U entries in column `pc_k`, as (earlier stage,
    /// value) pairs. Built once after elimination for transposed solves.
    ucols: Vec<Vec<(usize, f64)>>,
    etas: Vec<Eta>,
    basis: Vec<usize>,
    base_nnz: usize,
    eta_nnz: usize,
    sing_rows: Vec<usize>,
    sing_pos: Vec<usize>,
    work: Vec<f64>,
    xbuf: Vec<f64>,
}

impl SparseLu {
    pub fn new(cfg: LuConfig) -> Self {
        Self {
            cfg,
            ..Default::default()
        }
    }

    pub fn config_mut(&mut self) -> &mut LuConfig {
        &mut self.cfg
    }

    /// Apply the base factorization solve `B0 x = work` (row space in,
    /// position space out via `xbuf`).
    fn base_solve_right(&mut self) {
        for st in &self.stages {
            let t = self.work[st.pr];
            if t != 0.0 {
                for &(r, m) in &st.lcol {
                    self.work[r] -= m * t;
                }
            }
        }
        for st in self.stages.iter().rev() {
            let mut v = self.work[st.pr];
            for &(c, u) in &st.urow {
                let xc = self.xbuf[c];
                if xc != 0.0 {
                    v -= u * xc;
                }
            }
            self.xbuf[st.pc] = v / st.diag;
        }
    }

    /// Apply the base transposed solve `B0^T y = work` (position space
    /// in, row space out via `xbuf`).
    fn base_solve_left(&mut self) {
        // U^T w = c, forward over stages; w lives in stage order inside
        // xbuf, addressed through the pivot rows.
        let nstage = self.stages.len();
        let mut w = std::mem::take(&mut self.work);
        let mut z = vec![0.0; nstage];
        for (k, st) in self.stages.iter().enumerate() {
            let mut v = w[st.pc];
            for &(j, u) in &self.ucols[k] {
                let zj = z[j];
                if zj != 0.0 {
                    v -= u * zj;
                }
            }
            z[k] = v / st.diag;
        }
        // L^T y = w: scatter to rows, then replay the eliminations
        // backwards.
        for x in self.xbuf.iter_mut() {
            *x = 0.0;
        }
        for (k, st) in self.stages.iter().enumerate() {
            self.xbuf[st.pr] = z[k];
        }
        for st in self.stages.iter().rev() {
            let mut v = self.xbuf[st.pr];
            for &(r, m) in &st.lcol {
                let yr = self.xbuf[r];
                if yr != 0.0 {
                    v -= m * yr;
                }
            }
            self.xbuf[st.pr] = v;
        }
        w.fill(0.0);
        self.work = w;
    }
}

impl FactorBackend for SparseLu {
    fn load(&mut self, dim: usize, cols: &[SVector], basis: &[usize]) -> Result<(), FactorError> {
        if cols.len() != dim {
            return Err(FactorError::Dimension {
                dim,
                got: cols.len(),
            });
        }
        self.dim = dim;
        self.stages.clear();
        self.ucols.clear();
        self.etas.clear();
        self.eta_nnz = 0;
        self.sing_rows.clear();
        self.sing_pos.clear();
        self.basis = basis.to_vec();
        self.work = vec![0.0; dim];
        self.xbuf = vec![0.0; dim];

        let drop_tol = self.cfg.epsilon_zero;

        // Active matrix, column-wise, entries over unpivoted rows only.
        let mut acols: Vec<Vec<(usize, f64)>> = cols
            .iter()
            .map(|c| c.iter().map(|nz| (nz.idx, nz.val)).collect())
            .collect();
        let mut rows_of: Vec<Vec<usize>> = vec![Vec::new(); dim];
        let mut rc = vec![0usize; dim];
        for (j, col) in acols.iter().enumerate() {
            for &(r, _) in col {
                rows_of[r].push(j);
                rc[r] += 1;
            }
        }
        let mut cc: Vec<usize> = acols.iter().map(|c| c.len()).collect();
        let mut row_piv = vec![false; dim];
        let mut col_piv = vec![false; dim];

        // Scatter scratch with an epoch marker.
        let mut dense = vec![0.0f64; dim];
        let mut mark = vec![0u64; dim];
        let mut epoch = 0u64;

        for _stage in 0..dim {
            // Threshold-Markowitz pivot search over the active matrix.
            let mut best: Option<(usize, usize, f64, usize)> = None; // (pr, pc, val, merit)
            for pc in 0..dim {
                if col_piv[pc] || acols[pc].is_empty() {
                    continue;
                }
                let colmax = acols[pc]
                    .iter()
                    .map(|&(_, v)| v.abs())
                    .fold(0.0_f64, f64::max);
                if colmax < self.cfg.epsilon_pivot {
                    continue;
                }
                let admit = self.cfg.min_markowitz * colmax;
                for &(r, v) in &acols[pc] {
                    if v.abs() < admit || v.abs() < self.cfg.epsilon_pivot {
                        continue;
                    }
                    let merit = (rc[r] - 1) * (cc[pc] - 1);
                    let better = match best {
                        None => true,
                        Some((_, _, bv, bm)) => {
                            merit < bm || (merit == bm && v.abs() > bv.abs())
                        }
                    };
                    if better {
                        best = Some((r, pc, v, merit));
                    }
                }
            }
            let Some((pr, pc, diag, _)) = best else {
                break;
            };

            // Multipliers from the pivot column.
            let pivot_col = std::mem::take(&mut acols[pc]);
            let mut lcol = Vec::with_capacity(pivot_col.len().saturating_sub(1));
            for &(r, v) in &pivot_col {
                if r != pr {
                    lcol.push((r, v / diag));
                    rc[r] -= 1;
                }
            }
            col_piv[pc] = true;
            row_piv[pr] = true;

            // The U row: remove the pivot-row entry from every active
            // column that carries it.
            let mut urow = Vec::new();
            let carriers = std::mem::take(&mut rows_of[pr]);
            for c in carriers {
                if col_piv[c] {
                    continue;
                }
                if let Some(k) = acols[c].iter().position(|&(r, _)| r == pr) {
                    let (_, v) = acols[c].swap_remove(k);
                    cc[c] -= 1;
                    urow.push((c, v));
                }
            }

            // Right-looking elimination, scatter-gather per column.
            let mut pattern: Vec<usize> = Vec::new();
            for &(c, uval) in &urow {
                epoch += 1;
                pattern.clear();
                for &(r, v) in &acols[c] {
                    dense[r] = v;
                    mark[r] = epoch;
                    pattern.push(r);
                }
                for &(r, m) in &lcol {
                    let delta = m * uval;
                    if mark[r] == epoch {
                        dense[r] -= delta;
                    } else {
                        dense[r] = -delta;
                        mark[r] = epoch;
                        pattern.push(r);
                        rows_of[r].push(c);
                    }
                }
                let col = &mut acols[c];
                col.clear();
                for &r in &pattern {
                    let v = dense[r];
                    if v.abs() >= drop_tol {
                        col.push((r, v));
                    }
                }
                cc[c] = col.len();
            }
            // Row counts only steer the Markowitz merit; fill-in and
            // cancellation both move them, so recompute per stage.
            for r in 0..dim {
                if !row_piv[r] {
                    rc[r] = 0;
                }
            }
            for (c, col) in acols.iter().enumerate() {
                if !col_piv[c] {
                    for &(r, _) in col {
                        rc[r] += 1;
                    }
                }
            }

            self.stages.push(Stage {
                pr,
                pc,
                diag,
                lcol,
                urow,
            });
        }

        if self.stages.len() < dim {
            self.sing_rows = (0..dim).filter(|&r| !row_piv[r]).collect();
            self.sing_pos = (0..dim).filter(|&c| !col_piv[c]).collect();
            let stage = self.stages.len();
            self.stages.clear();
            return Err(FactorError::Singular {
                stage,
                unpivoted: self.sing_rows.len(),
            });
        }

        // Transpose map of U for left solves.
        let mut stage_of_col = vec![0usize; dim];
        for (k, st) in self.stages.iter().enumerate() {
            stage_of_col[st.pc] = k;
        }
        self.ucols = vec![Vec::new(); dim];
        for (k, st) in self.stages.iter().enumerate() {
            for &(c, v) in &st.urow {
                self.ucols[stage_of_col[c]].push((k, v));
            }
        }

        self.base_nnz = self
            .stages
            .iter()
            .map(|s| s.lcol.len() + s.urow.len() + 1)
            .sum();
        Ok(())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn basis_indices(&self) -> &[usize] {
        &self.basis
    }

    fn solve_right(&mut self, x: &mut SsVector) {
        debug_assert_eq!(x.dim(), self.dim);
        self.work.copy_from_slice(x.values());
        for v in self.xbuf.iter_mut() {
            *v = 0.0;
        }
        self.base_solve_right();
        self.work.fill(0.0);
        for eta in &self.etas {
            let t = self.xbuf[eta.pos] / eta.pivot;
            if t != 0.0 {
                for &(i, d) in &eta.entries {
                    self.xbuf[i] -= d * t;
                }
            }
            self.xbuf[eta.pos] = t;
        }
        x.assign_dense(&self.xbuf);
    }

    fn solve_left(&mut self, x: &mut SsVector) {
        debug_assert_eq!(x.dim(), self.dim);
        self.work.copy_from_slice(x.values());
        for eta in self.etas.iter().rev() {
            let mut v = self.work[eta.pos];
            for &(i, d) in &eta.entries {
                v -= d * self.work[i];
            }
            self.work[eta.pos] = v / eta.pivot;
        }
        self.base_solve_left();
        x.assign_dense(&self.xbuf);
    }

    fn update(
        &mut self,
        pos: usize,
        entering: usize,
        delta: &SsVector,
        pivot: f64,
    ) -> UpdateVerdict {
        if pivot.abs() < self.cfg.epsilon_pivot {
            return UpdateVerdict::NeedsRefactor;
        }
        self.basis[pos] = entering;
        let mut entries = Vec::with_capacity(delta.size());
        for (i, v) in delta.iter_nonzero() {
            if i != pos && v.abs() >= self.cfg.epsilon_zero {
                entries.push((i, v));
            }
        }
        self.eta_nnz += entries.len() + 1;
        self.etas.push(Eta {
            pos,
            pivot,
            entries,
        });
        let fill_budget = (self.cfg.update_fill * self.base_nnz.max(1) as f64) as usize;
        if self.etas.len() >= self.cfg.max_updates || self.eta_nnz > fill_budget {
            UpdateVerdict::NeedsRefactor
        } else {
            UpdateVerdict::Ok
        }
    }

    fn condition_estimate(&self) -> f64 {
        let mut dmax = 0.0_f64;
        let mut dmin = f64::INFINITY;
        for st in &self.stages {
            let d = st.diag.abs();
            dmax = dmax.max(d);
            dmin = dmin.min(d);
        }
        if dmin <= 0.0 || !dmin.is_finite() {
            f64::INFINITY
        } else {
            dmax / dmin
        }
    }

    fn nonzeros(&self) -> usize {
        self.base_nnz + self.eta_nnz
    }

    fn base_nonzeros(&self) -> usize {
        self.base_nnz
    }

    fn updates(&self) -> usize {
        self.etas.len()
    }

    fn singular_rows_positions(&self) -> (&[usize], &[usize]) {
        (&self.sing_rows, &self.sing_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(entries: &[(usize, f64)]) -> SVector {
        SVector::from_entries(entries)
    }

    fn solve_r(lu: &mut SparseLu, b: &[f64]) -> Vec<f64> {
        let mut x = SsVector::new(b.len(), 1e-16);
        x.assign_dense(b);
        lu.solve_right(&mut x);
        x.values().to_vec()
    }

    fn solve_l(lu: &mut SparseLu, c: &[f64]) -> Vec<f64> {
        let mut x = SsVector::new(c.len(), 1e-16);
        x.assign_dense(c);
        lu.solve_left(&mut x);
        x.values().to_vec()
    }

    fn tridiag() -> Vec<SVector> {
        // B = [[2,1,0],[1,3,1],[0,1,2]] column-wise
        vec![
            col(&[(0, 2.0), (1, 1.0)]),
            col(&[(0, 1.0), (1, 3.0), (2, 1.0)]),
            col(&[(1, 1.0), (2, 2.0)]),
        ]
    }

    #[test]
    fn test_solve_right_and_left() {
        let mut lu = SparseLu::new(LuConfig::default());
        lu.load(3, &tridiag(), &[0, 1, 2]).unwrap();
        assert_eq!(lu.basis_indices(), &[0, 1, 2]);

        // B * [1,1,1] = [3,5,3]
        let x = solve_r(&mut lu, &[3.0, 5.0, 3.0]);
        for xi in &x {
            assert!((xi - 1.0).abs() < 1e-9, "x = {:?}", x);
        }

        // B^T * [1,1,1] = column sums = [3,5,3]
        let y = solve_l(&mut lu, &[3.0, 5.0, 3.0]);
        for yi in &y {
            assert!((yi - 1.0).abs() < 1e-9, "y = {:?}", y);
        }
        assert!(lu.condition_estimate().is_finite());
        assert!(lu.nonzeros() > 0);
    }

    #[test]
    fn test_negated_unit_columns() {
        // Slack basis: B = -I
        let cols: Vec<SVector> = (0..4).map(|r| col(&[(r, -1.0)])).collect();
        let mut lu = SparseLu::new(LuConfig::default());
        lu.load(4, &cols, &[4, 5, 6, 7]).unwrap();
        let x = solve_r(&mut lu, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(x, vec![-1.0, -2.0, -3.0, -4.0]);
    }

    #[test]
    fn test_singular_detection() {
        let cols = vec![
            col(&[(0, 1.0), (1, 1.0)]),
            col(&[(0, 2.0), (1, 2.0)]),
            col(&[(2, 1.0)]),
        ];
        let mut lu = SparseLu::new(LuConfig::default());
        let err = lu.load(3, &cols, &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, FactorError::Singular { .. }));
        let (rows, pos) = lu.singular_rows_positions();
        assert_eq!(rows.len(), 1);
        assert_eq!(pos.len(), 1);
    }

    #[test]
    fn test_eta_update_matches_fresh_factor() {
        let mut lu = SparseLu::new(LuConfig::default());
        lu.load(3, &tridiag(), &[0, 1, 2]).unwrap();

        // Replace basis position 1 by the column a = e0.
        let a = [1.0, 0.0, 0.0];
        let delta = solve_r(&mut lu, &a);
        let mut dss = SsVector::new(3, 1e-16);
        dss.assign_dense(&delta);
        let verdict = lu.update(1, 9, &dss, delta[1]);
        assert_eq!(verdict, UpdateVerdict::Ok);
        assert_eq!(lu.updates(), 1);
        assert_eq!(lu.basis_indices(), &[0, 9, 2]);

        // Fresh factorization of the updated basis.
        let updated = vec![
            col(&[(0, 2.0), (1, 1.0)]),
            col(&[(0, 1.0)]),
            col(&[(1, 1.0), (2, 2.0)]),
        ];
        let mut fresh = SparseLu::new(LuConfig::default());
        fresh.load(3, &updated, &[0, 9, 2]).unwrap();

        let b = [1.0, -2.0, 0.5];
        let xu = solve_r(&mut lu, &b);
        let xf = solve_r(&mut fresh, &b);
        for (a, b) in xu.iter().zip(xf.iter()) {
            assert!((a - b).abs() < 1e-9, "{:?} vs {:?}", xu, xf);
        }

        let yu = solve_l(&mut lu, &b);
        let yf = solve_l(&mut fresh, &b);
        for (a, b) in yu.iter().zip(yf.iter()) {
            assert!((a - b).abs() < 1e-9, "{:?} vs {:?}", yu, yf);
        }
    }

    #[test]
    fn test_tiny_pivot_demands_refactor() {
        let mut lu = SparseLu::new(LuConfig::default());
        lu.load(3, &tridiag(), &[0, 1, 2]).unwrap();
        let mut dss = SsVector::new(3, 1e-16);
        dss.assign_dense(&[1.0, 1e-14, 0.0]);
        assert_eq!(lu.update(1, 9, &dss, 1e-14), UpdateVerdict::NeedsRefactor);
        // Rejected updates leave the factor untouched.
        assert_eq!(lu.updates(), 0);
        assert_eq!(lu.basis_indices(), &[0, 1, 2]);
    }
}
