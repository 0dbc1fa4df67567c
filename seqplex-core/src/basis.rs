//! Basis state: the basic/nonbasic partition of the variables.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;

use thiserror::Error;

use crate::lp::LpModel;

/// Basis status of one variable.
///
/// Variables are numbered `0..n` for structural columns and `n..n+m` for
/// the logical (slack) variable of each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarStatus {
    /// Nonbasic at its upper bound.
    OnUpper,
    /// Nonbasic at its lower bound.
    OnLower,
    /// Nonbasic with identical bounds.
    Fixed,
    /// Free variable, nonbasic at zero. Requires both bounds infinite.
    Zero,
    /// Member of the basis.
    Basic,
    /// Nothing known (fresh model or singular transformed basis).
    Undefined,
}

impl VarStatus {
    /// Human-readable token used in basis files.
    pub fn token(self) -> &'static str {
        match self {
            VarStatus::OnUpper => "ON_UPPER",
            VarStatus::OnLower => "ON_LOWER",
            VarStatus::Fixed => "FIXED",
            VarStatus::Zero => "ZERO",
            VarStatus::Basic => "BASIC",
            VarStatus::Undefined => "UNDEFINED",
        }
    }

    pub fn from_token(tok: &str) -> Option<Self> {
        Some(match tok {
            "ON_UPPER" => VarStatus::OnUpper,
            "ON_LOWER" => VarStatus::OnLower,
            "FIXED" => VarStatus::Fixed,
            "ZERO" => VarStatus::Zero,
            "BASIC" => VarStatus::Basic,
            "UNDEFINED" => VarStatus::Undefined,
            _ => return None,
        })
    }
}

impl fmt::Display for VarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Error)]
pub enum BasisError {
    #[error("basis file line {line}: unknown status token '{token}'")]
    BadToken { line: usize, token: String },

    #[error("basis file has {got} entries, expected {expected}")]
    WrongCount { expected: usize, got: usize },

    #[error("basis has {got} basic variables, expected {expected}")]
    WrongBasicCount { expected: usize, got: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The partition of the `n + m` variables into `m` basic and `n`
/// nonbasic, with a status per variable and the position map of the
/// basic set.
#[derive(Debug, Clone, Default)]
pub struct Basis {
    status: Vec<VarStatus>,
    basic: Vec<usize>,
    pos: Vec<i32>,
    n: usize,
    m: usize,
}

impl Basis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to `Undefined` for a model with `n` columns and `m` rows.
    pub fn reset(&mut self, n: usize, m: usize) {
        self.n = n;
        self.m = m;
        self.status.clear();
        self.status.resize(n + m, VarStatus::Undefined);
        self.basic.clear();
        self.pos.clear();
        self.pos.resize(n + m, -1);
    }

    pub fn num_cols(&self) -> usize {
        self.n
    }

    /// Basis dimension (= number of rows of the model).
    pub fn dim(&self) -> usize {
        self.m
    }

    pub fn is_defined(&self) -> bool {
        self.basic.len() == self.m && self.m + self.n > 0
    }

    pub fn status(&self, var: usize) -> VarStatus {
        self.status[var]
    }

    pub fn set_status(&mut self, var: usize, st: VarStatus) {
        debug_assert_ne!(st, VarStatus::Basic, "use make_basic for basis membership");
        debug_assert!(self.pos[var] < 0, "variable is basic");
        self.status[var] = st;
    }

    pub fn is_basic(&self, var: usize) -> bool {
        self.pos[var] >= 0
    }

    /// Basis position of `var`, or `None` when nonbasic.
    pub fn pos_of(&self, var: usize) -> Option<usize> {
        let p = self.pos[var];
        (p >= 0).then(|| p as usize)
    }

    /// Variable occupying basis position `p`.
    pub fn var_at(&self, p: usize) -> usize {
        self.basic[p]
    }

    pub fn basic_vars(&self) -> &[usize] {
        &self.basic
    }

    /// All variable statuses, columns then logicals.
    pub fn statuses(&self) -> &[VarStatus] {
        &self.status
    }

    /// Append `var` to the basic set (used while building a basis).
    pub fn push_basic(&mut self, var: usize) {
        debug_assert!(self.basic.len() < self.m);
        self.pos[var] = self.basic.len() as i32;
        self.basic.push(var);
        self.status[var] = VarStatus::Basic;
    }

    /// Pivot: variable `enter` replaces the variable at basis position
    /// `p`, which leaves with status `leave_status`.
    pub fn swap(&mut self, p: usize, enter: usize, leave_status: VarStatus) {
        let leave = self.basic[p];
        self.pos[leave] = -1;
        self.status[leave] = leave_status;
        self.basic[p] = enter;
        self.pos[enter] = p as i32;
        self.status[enter] = VarStatus::Basic;
    }

    /// Install the slack basis: all logicals basic, structural variables
    /// nonbasic at the bound preferred by their (minimization) objective
    /// coefficient.
    pub fn install_slack(&mut self, lp: &LpModel, obj: &[f64], infinity: f64) {
        let n = lp.num_cols();
        let m = lp.num_rows();
        self.reset(n, m);
        for j in 0..n {
            let lo = lp.lower(j);
            let up = lp.upper(j);
            let lo_fin = lo > -infinity;
            let up_fin = up < infinity;
            self.status[j] = if lo_fin && up_fin && lo == up {
                VarStatus::Fixed
            } else if obj[j] >= 0.0 {
                if lo_fin {
                    VarStatus::OnLower
                } else if up_fin {
                    VarStatus::OnUpper
                } else {
                    VarStatus::Zero
                }
            } else if up_fin {
                VarStatus::OnUpper
            } else if lo_fin {
                VarStatus::OnLower
            } else {
                VarStatus::Zero
            };
        }
        for r in 0..m {
            self.push_basic(n + r);
        }
    }

    /// Rebuild the basic set and position map from the status vector.
    /// Fails unless exactly `m` variables are `Basic`.
    pub fn rebuild_from_statuses(&mut self) -> Result<(), BasisError> {
        self.basic.clear();
        self.pos.fill(-1);
        for var in 0..self.status.len() {
            if self.status[var] == VarStatus::Basic {
                if self.basic.len() == self.m {
                    return Err(BasisError::WrongBasicCount {
                        expected: self.m,
                        got: self.status.iter().filter(|s| **s == VarStatus::Basic).count(),
                    });
                }
                self.pos[var] = self.basic.len() as i32;
                self.basic.push(var);
            }
        }
        if self.basic.len() != self.m {
            return Err(BasisError::WrongBasicCount {
                expected: self.m,
                got: self.basic.len(),
            });
        }
        Ok(())
    }

    /// Overwrite every status at once (basis file and FFI plumbing);
    /// the basic set is rebuilt lazily by the caller when needed.
    pub fn set_all_statuses(&mut self, statuses: &[VarStatus]) {
        debug_assert_eq!(statuses.len(), self.n + self.m);
        self.status.copy_from_slice(statuses);
        self.basic.clear();
        self.pos.fill(-1);
    }

    /// A cheap hash of the basic-variable multiset, used by the cycling
    /// monitor.
    pub fn signature(&self) -> u64 {
        let mut sorted = self.basic.clone();
        sorted.sort_unstable();
        let mut h = DefaultHasher::new();
        sorted.hash(&mut h);
        h.finish()
    }

    /// Write the basis file: one status token per variable, columns then
    /// rows.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BasisError> {
        let mut out = String::with_capacity((self.n + self.m) * 9);
        for st in &self.status {
            out.push_str(st.token());
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Read a basis file written by [`write_file`](Basis::write_file) for
    /// a model with matching dimensions.
    pub fn read_file<P: AsRef<Path>>(&mut self, path: P, n: usize, m: usize) -> Result<(), BasisError> {
        let text = fs::read_to_string(path)?;
        let mut statuses = Vec::with_capacity(n + m);
        for (lineno, line) in text.lines().enumerate() {
            let tok = line.trim();
            if tok.is_empty() {
                continue;
            }
            let st = VarStatus::from_token(tok).ok_or_else(|| BasisError::BadToken {
                line: lineno + 1,
                token: tok.to_string(),
            })?;
            statuses.push(st);
        }
        if statuses.len() != n + m {
            return Err(BasisError::WrongCount {
                expected: n + m,
                got: statuses.len(),
            });
        }
        self.reset(n, m);
        self.status = statuses;
        self.rebuild_from_statuses()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_lp() -> LpModel {
        let mut lp = LpModel::new();
        lp.add_row(1.0, &[], 1e100).unwrap();
        lp.add_col(1.0, 0.0, &[(0, 1.0)], 1e100).unwrap();
        lp.add_col(-1.0, 0.0, &[(0, 1.0)], 5.0).unwrap();
        lp
    }

    #[test]
    fn test_install_slack() {
        let lp = tiny_lp();
        let mut b = Basis::new();
        b.install_slack(&lp, &[1.0, -1.0], 1e100);
        assert!(b.is_defined());
        assert_eq!(b.status(0), VarStatus::OnLower);
        assert_eq!(b.status(1), VarStatus::OnUpper);
        assert_eq!(b.status(2), VarStatus::Basic);
        assert_eq!(b.var_at(0), 2);
        assert_eq!(b.pos_of(2), Some(0));
        assert_eq!(b.pos_of(0), None);
    }

    #[test]
    fn test_swap() {
        let lp = tiny_lp();
        let mut b = Basis::new();
        b.install_slack(&lp, &[1.0, -1.0], 1e100);
        b.swap(0, 0, VarStatus::OnLower);
        assert_eq!(b.var_at(0), 0);
        assert_eq!(b.status(0), VarStatus::Basic);
        assert_eq!(b.status(2), VarStatus::OnLower);
        assert_eq!(b.pos_of(0), Some(0));
        assert_eq!(b.pos_of(2), None);
    }

    #[test]
    fn test_signature_ignores_order() {
        let lp = tiny_lp();
        let mut a = Basis::new();
        a.install_slack(&lp, &[1.0, -1.0], 1e100);
        let sig = a.signature();
        a.swap(0, 1, VarStatus::OnLower);
        assert_ne!(a.signature(), sig);
    }

    #[test]
    fn test_basis_file_round_trip() {
        let lp = tiny_lp();
        let mut b = Basis::new();
        b.install_slack(&lp, &[1.0, -1.0], 1e100);
        let path = std::env::temp_dir().join("seqplex_test_basis.bas");
        b.write_file(&path).unwrap();

        let mut c = Basis::new();
        c.read_file(&path, 2, 1).unwrap();
        for v in 0..3 {
            assert_eq!(b.status(v), c.status(v));
        }
        assert_eq!(c.var_at(0), 2);
        std::fs::remove_file(&path).ok();
    }
}
