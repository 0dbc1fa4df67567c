//! Solver settings and the parameter dictionaries.

use std::fmt;
use std::fs;
use std::path::Path;

use thiserror::Error;

/// Storage orientation of the simplex tableau.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    /// Choose from the row/column ratio at load time.
    #[default]
    Auto,
    /// Column representation: basis dimension is the number of rows.
    Column,
    /// Row representation: basis dimension is the number of columns.
    Row,
}

/// Simplex algorithm variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Entering for column and leaving for row representation.
    Primal,
    /// Leaving for column and entering for row representation.
    #[default]
    Dual,
}

/// Factorization update scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FactorUpdateType {
    /// Product form update.
    Eta,
    /// Forrest-Tomlin type update.
    #[default]
    Ft,
}

/// Pricer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricerType {
    #[default]
    Auto,
    Dantzig,
    Devex,
}

/// Ratio tester selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatioTesterType {
    #[default]
    Auto,
    Textbook,
    BoundFlipping,
}

/// Sparse pricing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HyperPricing {
    Off,
    #[default]
    Auto,
    On,
}

/// Solution polishing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polishing {
    #[default]
    Off,
    /// Prefer basic slacks: more variables end up on their bounds.
    Integrality,
    /// Prefer nonbasic slacks: more variables end up between bounds.
    Fractionality,
}

/// Boolean parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolParam {
    /// Use bound flipping also for the row-side candidates.
    RowBoundFlips,
    /// Perturb the entire problem rather than single pivot bounds.
    FullPerturbation,
    /// Re-solve to produce a proof of infeasibility/unboundedness when a
    /// verdict from the row representation is inconclusive.
    EnsureRay,
}

/// Integer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntParam {
    Representation,
    Algorithm,
    FactorUpdateType,
    FactorUpdateMax,
    IterLimit,
    DisplayFreq,
    Pricer,
    RatioTester,
    HyperPricing,
    SolutionPolishing,
}

/// Real parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealParam {
    FeasTol,
    OptTol,
    EpsilonZero,
    EpsilonPivot,
    Infinity,
    TimeLimit,
    ObjLimitLower,
    ObjLimitUpper,
    SparsityThreshold,
    RepresentationSwitch,
    RefacBasisNnz,
    RefacUpdateFill,
    RefacMemFactor,
    MinMarkowitz,
    ObjOffset,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("value {value} out of range for parameter {param}")]
    OutOfRange { param: String, value: String },

    #[error("malformed settings line: {0}")]
    Parse(String),

    #[error("unknown parameter: {0}")]
    UnknownParam(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// All tunables the solver consumes.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Tableau orientation (auto/column/row).
    pub representation: Representation,
    /// Primal or dual simplex.
    pub algorithm: Algorithm,
    /// LU update scheme.
    pub factor_update_type: FactorUpdateType,
    /// Maximum factor updates between refactorizations.
    pub factor_update_max: usize,
    /// Iteration limit, -1 if unlimited.
    pub iter_limit: i64,
    /// Progress-check and display frequency in iterations.
    pub display_freq: usize,
    /// Pricer choice.
    pub pricer: PricerType,
    /// Ratio tester choice.
    pub ratio_tester: RatioTesterType,
    /// Sparse pricing mode.
    pub hyper_pricing: HyperPricing,
    /// Solution polishing mode.
    pub solution_polishing: Polishing,

    /// Primal feasibility tolerance.
    pub feas_tol: f64,
    /// Dual feasibility (optimality) tolerance.
    pub opt_tol: f64,
    /// General zero cutoff.
    pub epsilon_zero: f64,
    /// Minimum acceptable pivot magnitude.
    pub epsilon_pivot: f64,
    /// Infinity threshold: any magnitude at or above is treated as infinite.
    pub infinity: f64,
    /// Time limit in seconds.
    pub time_limit: f64,
    /// Lower objective limit; dual simplex aborts when crossed.
    pub obj_limit_lower: f64,
    /// Upper objective limit.
    pub obj_limit_upper: f64,
    /// Violation fraction below which sparse pricing activates.
    pub sparsity_threshold: f64,
    /// Row/column ratio switching representation in auto mode.
    pub representation_switch: f64,
    /// Refactor when basis nonzeros grew by this factor since load.
    pub refac_basis_nnz: f64,
    /// Refactor when update fill-in exceeds this multiple of the base
    /// factor nonzeros.
    pub refac_update_fill: f64,
    /// Refactor when factor memory grew by this factor.
    pub refac_mem_factor: f64,
    /// Markowitz stability threshold for LU pivot admission.
    pub min_markowitz: f64,
    /// Constant offset added to the objective value. Mirrors the loaded
    /// model's offset through the solver facade.
    pub obj_offset: f64,

    /// Bound flipping on the row side of the long-step dual ratio test.
    pub row_bound_flips: bool,
    /// Perturb all bounds instead of only the blocking ones.
    pub full_perturbation: bool,
    /// Force a certifying re-solve on inconclusive row-representation
    /// verdicts.
    pub ensure_ray: bool,

    /// Print an iteration line every `display_freq` iterations.
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            representation: Representation::Auto,
            algorithm: Algorithm::Dual,
            factor_update_type: FactorUpdateType::Ft,
            factor_update_max: 200,
            iter_limit: -1,
            display_freq: 100,
            pricer: PricerType::Auto,
            ratio_tester: RatioTesterType::Auto,
            hyper_pricing: HyperPricing::Auto,
            solution_polishing: Polishing::Off,

            feas_tol: 1e-6,
            opt_tol: 1e-6,
            epsilon_zero: 1e-16,
            epsilon_pivot: 1e-10,
            infinity: 1e100,
            time_limit: 1e100,
            obj_limit_lower: -1e100,
            obj_limit_upper: 1e100,
            sparsity_threshold: 0.6,
            representation_switch: 1.2,
            refac_basis_nnz: 10.0,
            refac_update_fill: 5.0,
            refac_mem_factor: 1.5,
            min_markowitz: 0.01,
            obj_offset: 0.0,

            row_bound_flips: false,
            full_perturbation: false,
            ensure_ray: false,

            verbose: false,
        }
    }
}

impl Settings {
    /// Whether `v` counts as plus or minus infinity.
    pub fn is_infinite(&self, v: f64) -> bool {
        v.abs() >= self.infinity
    }

    pub fn set_bool_param(&mut self, p: BoolParam, v: bool) {
        match p {
            BoolParam::RowBoundFlips => self.row_bound_flips = v,
            BoolParam::FullPerturbation => self.full_perturbation = v,
            BoolParam::EnsureRay => self.ensure_ray = v,
        }
    }

    pub fn bool_param(&self, p: BoolParam) -> bool {
        match p {
            BoolParam::RowBoundFlips => self.row_bound_flips,
            BoolParam::FullPerturbation => self.full_perturbation,
            BoolParam::EnsureRay => self.ensure_ray,
        }
    }

    pub fn set_int_param(&mut self, p: IntParam, v: i64) -> Result<(), SettingsError> {
        let bad = || SettingsError::OutOfRange {
            param: format!("{:?}", p),
            value: v.to_string(),
        };
        match p {
            IntParam::Representation => {
                self.representation = match v {
                    0 => Representation::Auto,
                    1 => Representation::Column,
                    2 => Representation::Row,
                    _ => return Err(bad()),
                }
            }
            IntParam::Algorithm => {
                self.algorithm = match v {
                    0 => Algorithm::Primal,
                    1 => Algorithm::Dual,
                    _ => return Err(bad()),
                }
            }
            IntParam::FactorUpdateType => {
                self.factor_update_type = match v {
                    0 => FactorUpdateType::Eta,
                    1 => FactorUpdateType::Ft,
                    _ => return Err(bad()),
                }
            }
            IntParam::FactorUpdateMax => {
                if v < 1 {
                    return Err(bad());
                }
                self.factor_update_max = v as usize;
            }
            IntParam::IterLimit => {
                if v < -1 {
                    return Err(bad());
                }
                self.iter_limit = v;
            }
            IntParam::DisplayFreq => {
                if v < 1 {
                    return Err(bad());
                }
                self.display_freq = v as usize;
            }
            IntParam::Pricer => {
                self.pricer = match v {
                    0 => PricerType::Auto,
                    1 => PricerType::Dantzig,
                    3 => PricerType::Devex,
                    _ => return Err(bad()),
                }
            }
            IntParam::RatioTester => {
                self.ratio_tester = match v {
                    0 => RatioTesterType::Textbook,
                    3 => RatioTesterType::BoundFlipping,
                    -1 => RatioTesterType::Auto,
                    _ => return Err(bad()),
                }
            }
            IntParam::HyperPricing => {
                self.hyper_pricing = match v {
                    0 => HyperPricing::Off,
                    1 => HyperPricing::Auto,
                    2 => HyperPricing::On,
                    _ => return Err(bad()),
                }
            }
            IntParam::SolutionPolishing => {
                self.solution_polishing = match v {
                    0 => Polishing::Off,
                    1 => Polishing::Integrality,
                    2 => Polishing::Fractionality,
                    _ => return Err(bad()),
                }
            }
        }
        Ok(())
    }

    pub fn int_param(&self, p: IntParam) -> i64 {
        match p {
            IntParam::Representation => match self.representation {
                Representation::Auto => 0,
                Representation::Column => 1,
                Representation::Row => 2,
            },
            IntParam::Algorithm => match self.algorithm {
                Algorithm::Primal => 0,
                Algorithm::Dual => 1,
            },
            IntParam::FactorUpdateType => match self.factor_update_type {
                FactorUpdateType::Eta => 0,
                FactorUpdateType::Ft => 1,
            },
            IntParam::FactorUpdateMax => self.factor_update_max as i64,
            IntParam::IterLimit => self.iter_limit,
            IntParam::DisplayFreq => self.display_freq as i64,
            IntParam::Pricer => match self.pricer {
                PricerType::Auto => 0,
                PricerType::Dantzig => 1,
                PricerType::Devex => 3,
            },
            IntParam::RatioTester => match self.ratio_tester {
                RatioTesterType::Auto => -1,
                RatioTesterType::Textbook => 0,
                RatioTesterType::BoundFlipping => 3,
            },
            IntParam::HyperPricing => match self.hyper_pricing {
                HyperPricing::Off => 0,
                HyperPricing::Auto => 1,
                HyperPricing::On => 2,
            },
            IntParam::SolutionPolishing => match self.solution_polishing {
                Polishing::Off => 0,
                Polishing::Integrality => 1,
                Polishing::Fractionality => 2,
            },
        }
    }

    pub fn set_real_param(&mut self, p: RealParam, v: f64) -> Result<(), SettingsError> {
        let bad = || SettingsError::OutOfRange {
            param: format!("{:?}", p),
            value: v.to_string(),
        };
        let field = match p {
            RealParam::FeasTol => &mut self.feas_tol,
            RealParam::OptTol => &mut self.opt_tol,
            RealParam::EpsilonZero => &mut self.epsilon_zero,
            RealParam::EpsilonPivot => &mut self.epsilon_pivot,
            RealParam::Infinity => &mut self.infinity,
            RealParam::TimeLimit => &mut self.time_limit,
            RealParam::ObjLimitLower => &mut self.obj_limit_lower,
            RealParam::ObjLimitUpper => &mut self.obj_limit_upper,
            RealParam::SparsityThreshold => &mut self.sparsity_threshold,
            RealParam::RepresentationSwitch => &mut self.representation_switch,
            RealParam::RefacBasisNnz => &mut self.refac_basis_nnz,
            RealParam::RefacUpdateFill => &mut self.refac_update_fill,
            RealParam::RefacMemFactor => &mut self.refac_mem_factor,
            RealParam::MinMarkowitz => &mut self.min_markowitz,
            RealParam::ObjOffset => &mut self.obj_offset,
        };
        let positive_only = matches!(
            p,
            RealParam::FeasTol
                | RealParam::OptTol
                | RealParam::EpsilonZero
                | RealParam::EpsilonPivot
                | RealParam::Infinity
                | RealParam::TimeLimit
        );
        if v.is_nan() || (positive_only && v <= 0.0) {
            return Err(bad());
        }
        *field = v;
        Ok(())
    }

    pub fn real_param(&self, p: RealParam) -> f64 {
        match p {
            RealParam::FeasTol => self.feas_tol,
            RealParam::OptTol => self.opt_tol,
            RealParam::EpsilonZero => self.epsilon_zero,
            RealParam::EpsilonPivot => self.epsilon_pivot,
            RealParam::Infinity => self.infinity,
            RealParam::TimeLimit => self.time_limit,
            RealParam::ObjLimitLower => self.obj_limit_lower,
            RealParam::ObjLimitUpper => self.obj_limit_upper,
            RealParam::SparsityThreshold => self.sparsity_threshold,
            RealParam::RepresentationSwitch => self.representation_switch,
            RealParam::RefacBasisNnz => self.refac_basis_nnz,
            RealParam::RefacUpdateFill => self.refac_update_fill,
            RealParam::RefacMemFactor => self.refac_mem_factor,
            RealParam::MinMarkowitz => self.min_markowitz,
            RealParam::ObjOffset => self.obj_offset,
        }
    }

    const BOOL_PARAMS: [(BoolParam, &'static str); 3] = [
        (BoolParam::RowBoundFlips, "row_bound_flips"),
        (BoolParam::FullPerturbation, "full_perturbation"),
        (BoolParam::EnsureRay, "ensure_ray"),
    ];

    const INT_PARAMS: [(IntParam, &'static str); 10] = [
        (IntParam::Representation, "representation"),
        (IntParam::Algorithm, "algorithm"),
        (IntParam::FactorUpdateType, "factor_update_type"),
        (IntParam::FactorUpdateMax, "factor_update_max"),
        (IntParam::IterLimit, "iter_limit"),
        (IntParam::DisplayFreq, "display_freq"),
        (IntParam::Pricer, "pricer"),
        (IntParam::RatioTester, "ratio_tester"),
        (IntParam::HyperPricing, "hyper_pricing"),
        (IntParam::SolutionPolishing, "solution_polishing"),
    ];

    const REAL_PARAMS: [(RealParam, &'static str); 15] = [
        (RealParam::FeasTol, "feas_tol"),
        (RealParam::OptTol, "opt_tol"),
        (RealParam::EpsilonZero, "epsilon_zero"),
        (RealParam::EpsilonPivot, "epsilon_pivot"),
        (RealParam::Infinity, "infinity"),
        (RealParam::TimeLimit, "time_limit"),
        (RealParam::ObjLimitLower, "obj_limit_lower"),
        (RealParam::ObjLimitUpper, "obj_limit_upper"),
        (RealParam::SparsityThreshold, "sparsity_threshold"),
        (RealParam::RepresentationSwitch, "representation_switch"),
        (RealParam::RefacBasisNnz, "refac_basis_nnz"),
        (RealParam::RefacUpdateFill, "refac_update_fill"),
        (RealParam::RefacMemFactor, "refac_mem_factor"),
        (RealParam::MinMarkowitz, "min_markowitz"),
        (RealParam::ObjOffset, "obj_offset"),
    ];

    /// Render all parameters as `kind:name = value` lines.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (p, name) in Self::BOOL_PARAMS {
            out.push_str(&format!("bool:{} = {}\n", name, self.bool_param(p)));
        }
        for (p, name) in Self::INT_PARAMS {
            out.push_str(&format!("int:{} = {}\n", name, self.int_param(p)));
        }
        for (p, name) in Self::REAL_PARAMS {
            out.push_str(&format!("real:{} = {}\n", name, self.real_param(p)));
        }
        out
    }

    /// Parse parameters from the `to_text` format. Unknown names and
    /// malformed lines are errors; missing parameters keep their current
    /// values.
    pub fn parse_text(&mut self, text: &str) -> Result<(), SettingsError> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (head, value) = line
                .split_once('=')
                .ok_or_else(|| SettingsError::Parse(line.to_string()))?;
            let (kind, name) = head
                .trim()
                .split_once(':')
                .ok_or_else(|| SettingsError::Parse(line.to_string()))?;
            let value = value.trim();
            match kind {
                "bool" => {
                    let p = Self::BOOL_PARAMS
                        .iter()
                        .find(|(_, n)| *n == name)
                        .map(|(p, _)| *p)
                        .ok_or_else(|| SettingsError::UnknownParam(name.to_string()))?;
                    let v = value
                        .parse::<bool>()
                        .map_err(|_| SettingsError::Parse(line.to_string()))?;
                    self.set_bool_param(p, v);
                }
                "int" => {
                    let p = Self::INT_PARAMS
                        .iter()
                        .find(|(_, n)| *n == name)
                        .map(|(p, _)| *p)
                        .ok_or_else(|| SettingsError::UnknownParam(name.to_string()))?;
                    let v = value
                        .parse::<i64>()
                        .map_err(|_| SettingsError::Parse(line.to_string()))?;
                    self.set_int_param(p, v)?;
                }
                "real" => {
                    let p = Self::REAL_PARAMS
                        .iter()
                        .find(|(_, n)| *n == name)
                        .map(|(p, _)| *p)
                        .ok_or_else(|| SettingsError::UnknownParam(name.to_string()))?;
                    let v = value
                        .parse::<f64>()
                        .map_err(|_| SettingsError::Parse(line.to_string()))?;
                    self.set_real_param(p, v)?;
                }
                _ => return Err(SettingsError::Parse(line.to_string())),
            }
        }
        Ok(())
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn read_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SettingsError> {
        let text = fs::read_to_string(path)?;
        self.parse_text(&text)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_dictionaries() {
        let mut s = Settings::default();
        s.set_int_param(IntParam::Pricer, 1).unwrap();
        assert_eq!(s.pricer, PricerType::Dantzig);
        assert_eq!(s.int_param(IntParam::Pricer), 1);

        s.set_real_param(RealParam::FeasTol, 1e-8).unwrap();
        assert_eq!(s.feas_tol, 1e-8);
        assert!(s.set_real_param(RealParam::FeasTol, -1.0).is_err());
        assert!(s.set_int_param(IntParam::Representation, 7).is_err());

        // the offset may be any finite real, negative included
        s.set_real_param(RealParam::ObjOffset, -2.5).unwrap();
        assert_eq!(s.real_param(RealParam::ObjOffset), -2.5);

        s.set_bool_param(BoolParam::EnsureRay, true);
        assert!(s.bool_param(BoolParam::EnsureRay));
    }

    #[test]
    fn test_text_round_trip() {
        let mut s = Settings::default();
        s.set_int_param(IntParam::IterLimit, 42).unwrap();
        s.set_real_param(RealParam::OptTol, 1e-9).unwrap();
        s.set_real_param(RealParam::ObjOffset, 7.25).unwrap();
        s.set_bool_param(BoolParam::FullPerturbation, true);

        let text = s.to_text();
        let mut t = Settings::default();
        t.parse_text(&text).unwrap();
        assert_eq!(t.iter_limit, 42);
        assert_eq!(t.opt_tol, 1e-9);
        assert_eq!(t.obj_offset, 7.25);
        assert!(t.full_perturbation);
    }

    #[test]
    fn test_infinity_threshold() {
        let s = Settings::default();
        assert!(s.is_infinite(1e100));
        assert!(s.is_infinite(-2e100));
        assert!(!s.is_infinite(1e99));
    }
}
