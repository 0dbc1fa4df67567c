//! C ABI for the seqplex solver.
//!
//! Every function takes the opaque handle returned by
//! [`Seqplex_create`] as its first argument. Statuses and basis codes
//! use the stable integer encodings of the core crate. Out-parameters
//! are caller-allocated arrays whose length is passed in `dim`; excess
//! entries are left untouched.

#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::ffi::CStr;
use std::path::Path;

use libc::{c_char, c_double, c_int, c_void};

use seqplex_core::basis::VarStatus;
use seqplex_core::engine::Interrupt;
use seqplex_core::{BoolParam, IntParam, RealParam, Sense, Solver};

fn solver_mut<'a>(ptr: *mut c_void) -> &'a mut Solver {
    debug_assert!(!ptr.is_null());
    unsafe { &mut *(ptr as *mut Solver) }
}

fn solver_ref<'a>(ptr: *mut c_void) -> &'a Solver {
    debug_assert!(!ptr.is_null());
    unsafe { &*(ptr as *const Solver) }
}

unsafe fn path_of<'a>(s: *const c_char) -> Option<&'a Path> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok().map(Path::new)
}

fn bool_param_of(code: c_int) -> Option<BoolParam> {
    Some(match code {
        0 => BoolParam::RowBoundFlips,
        1 => BoolParam::FullPerturbation,
        2 => BoolParam::EnsureRay,
        _ => return None,
    })
}

fn int_param_of(code: c_int) -> Option<IntParam> {
    Some(match code {
        0 => IntParam::Representation,
        1 => IntParam::Algorithm,
        2 => IntParam::FactorUpdateType,
        3 => IntParam::FactorUpdateMax,
        4 => IntParam::IterLimit,
        5 => IntParam::DisplayFreq,
        6 => IntParam::Pricer,
        7 => IntParam::RatioTester,
        8 => IntParam::HyperPricing,
        9 => IntParam::SolutionPolishing,
        _ => return None,
    })
}

fn real_param_of(code: c_int) -> Option<RealParam> {
    Some(match code {
        0 => RealParam::FeasTol,
        1 => RealParam::OptTol,
        2 => RealParam::EpsilonZero,
        3 => RealParam::EpsilonPivot,
        4 => RealParam::Infinity,
        5 => RealParam::TimeLimit,
        6 => RealParam::ObjLimitLower,
        7 => RealParam::ObjLimitUpper,
        8 => RealParam::SparsityThreshold,
        9 => RealParam::RepresentationSwitch,
        10 => RealParam::RefacBasisNnz,
        11 => RealParam::RefacUpdateFill,
        12 => RealParam::RefacMemFactor,
        13 => RealParam::MinMarkowitz,
        14 => RealParam::ObjOffset,
        _ => return None,
    })
}

fn var_status_code(st: VarStatus) -> c_int {
    match st {
        VarStatus::OnUpper => 0,
        VarStatus::OnLower => 1,
        VarStatus::Fixed => 2,
        VarStatus::Zero => 3,
        VarStatus::Basic => 4,
        VarStatus::Undefined => 5,
    }
}

unsafe fn dense_to_entries(values: *const c_double, size: c_int) -> Vec<(usize, f64)> {
    let mut entries = Vec::new();
    if values.is_null() {
        return entries;
    }
    for i in 0..size.max(0) as usize {
        let v = *values.add(i);
        if v != 0.0 {
            entries.push((i, v));
        }
    }
    entries
}

unsafe fn copy_out(src: &[f64], dst: *mut c_double, dim: c_int) {
    if dst.is_null() {
        return;
    }
    let len = src.len().min(dim.max(0) as usize);
    std::ptr::copy_nonoverlapping(src.as_ptr(), dst, len);
}

/// Create a new solver instance.
#[no_mangle]
pub extern "C" fn Seqplex_create() -> *mut c_void {
    Box::into_raw(Box::new(Solver::new())) as *mut c_void
}

/// Destroy a solver instance.
#[no_mangle]
pub unsafe extern "C" fn Seqplex_free(solver: *mut c_void) {
    if !solver.is_null() {
        drop(Box::from_raw(solver as *mut Solver));
    }
}

/// Remove the loaded LP.
#[no_mangle]
pub extern "C" fn Seqplex_clearLP(solver: *mut c_void) {
    solver_mut(solver).clear();
}

#[no_mangle]
pub extern "C" fn Seqplex_numRows(solver: *mut c_void) -> c_int {
    solver_ref(solver).num_rows() as c_int
}

#[no_mangle]
pub extern "C" fn Seqplex_numCols(solver: *mut c_void) -> c_int {
    solver_ref(solver).num_cols() as c_int
}

#[no_mangle]
pub extern "C" fn Seqplex_setBoolParam(
    solver: *mut c_void,
    paramcode: c_int,
    paramvalue: bool,
) -> bool {
    match bool_param_of(paramcode) {
        Some(p) => {
            solver_mut(solver).set_bool_param(p, paramvalue);
            true
        }
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn Seqplex_getBoolParam(solver: *mut c_void, paramcode: c_int) -> bool {
    bool_param_of(paramcode)
        .map(|p| solver_ref(solver).bool_param(p))
        .unwrap_or(false)
}

#[no_mangle]
pub extern "C" fn Seqplex_setIntParam(
    solver: *mut c_void,
    paramcode: c_int,
    paramvalue: c_int,
) -> bool {
    match int_param_of(paramcode) {
        Some(p) => solver_mut(solver)
            .set_int_param(p, paramvalue as i64)
            .is_ok(),
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn Seqplex_getIntParam(solver: *mut c_void, paramcode: c_int) -> c_int {
    int_param_of(paramcode)
        .map(|p| solver_ref(solver).int_param(p) as c_int)
        .unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn Seqplex_setRealParam(
    solver: *mut c_void,
    paramcode: c_int,
    paramvalue: c_double,
) -> bool {
    match real_param_of(paramcode) {
        Some(p) => solver_mut(solver).set_real_param(p, paramvalue).is_ok(),
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn Seqplex_getRealParam(solver: *mut c_void, paramcode: c_int) -> c_double {
    real_param_of(paramcode)
        .map(|p| solver_ref(solver).real_param(p))
        .unwrap_or(f64::NAN)
}

/// Objective sense: -1 minimize, +1 maximize.
#[no_mangle]
pub extern "C" fn Seqplex_setObjSense(solver: *mut c_void, sense: c_int) -> bool {
    let s = match sense {
        -1 => Sense::Minimize,
        1 => Sense::Maximize,
        _ => return false,
    };
    solver_mut(solver).change_sense(s);
    true
}

/// Add a column given as a dense array of `colsize` row coefficients.
#[no_mangle]
pub unsafe extern "C" fn Seqplex_addCol(
    solver: *mut c_void,
    colentries: *const c_double,
    colsize: c_int,
    objval: c_double,
    lb: c_double,
    ub: c_double,
) -> bool {
    let entries = dense_to_entries(colentries, colsize);
    solver_mut(solver).add_col(objval, lb, &entries, ub).is_ok()
}

/// Add a row given as a dense array of `rowsize` column coefficients.
#[no_mangle]
pub unsafe extern "C" fn Seqplex_addRow(
    solver: *mut c_void,
    rowentries: *const c_double,
    rowsize: c_int,
    lhs: c_double,
    rhs: c_double,
) -> bool {
    let entries = dense_to_entries(rowentries, rowsize);
    solver_mut(solver).add_row(lhs, &entries, rhs).is_ok()
}

#[no_mangle]
pub extern "C" fn Seqplex_removeCol(solver: *mut c_void, colidx: c_int) -> bool {
    colidx >= 0 && solver_mut(solver).remove_col(colidx as usize).is_ok()
}

#[no_mangle]
pub extern "C" fn Seqplex_removeRow(solver: *mut c_void, rowidx: c_int) -> bool {
    rowidx >= 0 && solver_mut(solver).remove_row(rowidx as usize).is_ok()
}

/// Replace the objective vector.
#[no_mangle]
pub unsafe extern "C" fn Seqplex_changeObj(
    solver: *mut c_void,
    obj: *const c_double,
    dim: c_int,
) -> bool {
    if obj.is_null() || dim < 0 {
        return false;
    }
    let obj = std::slice::from_raw_parts(obj, dim as usize);
    solver_mut(solver).change_obj_all(obj).is_ok()
}

/// Replace the column bound vectors.
#[no_mangle]
pub unsafe extern "C" fn Seqplex_changeBounds(
    solver: *mut c_void,
    lb: *const c_double,
    ub: *const c_double,
    dim: c_int,
) -> bool {
    if lb.is_null() || ub.is_null() || dim < 0 {
        return false;
    }
    let lb = std::slice::from_raw_parts(lb, dim as usize);
    let ub = std::slice::from_raw_parts(ub, dim as usize);
    solver_mut(solver).change_bounds_all(lb, ub).is_ok()
}

#[no_mangle]
pub extern "C" fn Seqplex_changeVarBounds(
    solver: *mut c_void,
    colidx: c_int,
    lb: c_double,
    ub: c_double,
) -> bool {
    colidx >= 0
        && solver_mut(solver)
            .change_bounds(colidx as usize, lb, ub)
            .is_ok()
}

#[no_mangle]
pub extern "C" fn Seqplex_changeVarLower(solver: *mut c_void, colidx: c_int, lb: c_double) -> bool {
    colidx >= 0 && solver_mut(solver).change_lower(colidx as usize, lb).is_ok()
}

#[no_mangle]
pub extern "C" fn Seqplex_changeVarUpper(solver: *mut c_void, colidx: c_int, ub: c_double) -> bool {
    colidx >= 0 && solver_mut(solver).change_upper(colidx as usize, ub).is_ok()
}

/// Replace the row left-hand side vector.
#[no_mangle]
pub unsafe extern "C" fn Seqplex_changeLhs(
    solver: *mut c_void,
    lhs: *const c_double,
    dim: c_int,
) -> bool {
    if lhs.is_null() || dim < 0 {
        return false;
    }
    let lhs = std::slice::from_raw_parts(lhs, dim as usize);
    solver_mut(solver).change_lhs_all(lhs).is_ok()
}

/// Replace the row right-hand side vector.
#[no_mangle]
pub unsafe extern "C" fn Seqplex_changeRhs(
    solver: *mut c_void,
    rhs: *const c_double,
    dim: c_int,
) -> bool {
    if rhs.is_null() || dim < 0 {
        return false;
    }
    let rhs = std::slice::from_raw_parts(rhs, dim as usize);
    solver_mut(solver).change_rhs_all(rhs).is_ok()
}

#[no_mangle]
pub extern "C" fn Seqplex_changeRowRange(
    solver: *mut c_void,
    rowidx: c_int,
    lhs: c_double,
    rhs: c_double,
) -> bool {
    rowidx >= 0
        && solver_mut(solver)
            .change_range(rowidx as usize, lhs, rhs)
            .is_ok()
}

/// Optimize the loaded LP. `interrupt` may be null or point to a flag
/// the caller can raise to stop the solve at the next iteration
/// boundary; the returned status is then resumable.
#[no_mangle]
pub unsafe extern "C" fn Seqplex_optimize(
    solver: *mut c_void,
    interrupt: *const bool,
) -> c_int {
    let s = solver_mut(solver);
    if !interrupt.is_null() {
        s.engine_mut()
            .set_interrupt_handle(Some(Interrupt::Raw(interrupt)));
    }
    let status = match s.optimize() {
        Ok(st) => st,
        Err(_) => s.status(),
    };
    if !interrupt.is_null() {
        s.engine_mut().set_interrupt_handle(None);
    }
    status.code()
}

#[no_mangle]
pub extern "C" fn Seqplex_getStatus(solver: *mut c_void) -> c_int {
    solver_ref(solver).status().code()
}

#[no_mangle]
pub extern "C" fn Seqplex_getSolvingTime(solver: *mut c_void) -> c_double {
    solver_ref(solver).solving_time()
}

#[no_mangle]
pub extern "C" fn Seqplex_getNumIterations(solver: *mut c_void) -> c_int {
    solver_ref(solver).iterations() as c_int
}

#[no_mangle]
pub extern "C" fn Seqplex_objValue(solver: *mut c_void) -> c_double {
    solver_ref(solver).objective_value()
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getPrimal(
    solver: *mut c_void,
    primal: *mut c_double,
    dim: c_int,
) {
    copy_out(solver_ref(solver).primal(), primal, dim);
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getDual(solver: *mut c_void, dual: *mut c_double, dim: c_int) {
    copy_out(solver_ref(solver).duals(), dual, dim);
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getRedCost(solver: *mut c_void, rc: *mut c_double, dim: c_int) {
    copy_out(solver_ref(solver).reduced_costs(), rc, dim);
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getSlacks(solver: *mut c_void, slacks: *mut c_double, dim: c_int) {
    copy_out(solver_ref(solver).slacks(), slacks, dim);
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getPrimalRay(
    solver: *mut c_void,
    ray: *mut c_double,
    dim: c_int,
) -> bool {
    match solver_ref(solver).primal_ray() {
        Some(r) => {
            copy_out(r, ray, dim);
            true
        }
        None => false,
    }
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getDualFarkas(
    solver: *mut c_void,
    farkas: *mut c_double,
    dim: c_int,
) -> bool {
    match solver_ref(solver).dual_farkas() {
        Some(f) => {
            copy_out(f, farkas, dim);
            true
        }
        None => false,
    }
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getLower(solver: *mut c_void, lb: *mut c_double, dim: c_int) {
    let lp = solver_ref(solver).model();
    let lower: Vec<f64> = (0..lp.num_cols()).map(|j| lp.lower(j)).collect();
    copy_out(&lower, lb, dim);
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getUpper(solver: *mut c_void, ub: *mut c_double, dim: c_int) {
    let lp = solver_ref(solver).model();
    let upper: Vec<f64> = (0..lp.num_cols()).map(|j| lp.upper(j)).collect();
    copy_out(&upper, ub, dim);
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_getObj(solver: *mut c_void, obj: *mut c_double, dim: c_int) {
    let lp = solver_ref(solver).model();
    let objective: Vec<f64> = (0..lp.num_cols()).map(|j| lp.obj(j)).collect();
    copy_out(&objective, obj, dim);
}

#[no_mangle]
pub extern "C" fn Seqplex_isPrimalFeasible(solver: *mut c_void) -> bool {
    solver_ref(solver).is_primal_feasible()
}

#[no_mangle]
pub extern "C" fn Seqplex_isDualFeasible(solver: *mut c_void) -> bool {
    solver_ref(solver).is_dual_feasible()
}

#[no_mangle]
pub extern "C" fn Seqplex_hasSol(solver: *mut c_void) -> bool {
    solver_ref(solver).status().has_solution()
}

#[no_mangle]
pub extern "C" fn Seqplex_hasPrimalRay(solver: *mut c_void) -> bool {
    solver_ref(solver).has_primal_ray()
}

#[no_mangle]
pub extern "C" fn Seqplex_hasDualFarkas(solver: *mut c_void) -> bool {
    solver_ref(solver).has_dual_farkas()
}

#[no_mangle]
pub extern "C" fn Seqplex_basisColStatus(solver: *mut c_void, colidx: c_int) -> c_int {
    if colidx < 0 {
        return var_status_code(VarStatus::Undefined);
    }
    var_status_code(solver_ref(solver).col_status(colidx as usize))
}

#[no_mangle]
pub extern "C" fn Seqplex_basisRowStatus(solver: *mut c_void, rowidx: c_int) -> c_int {
    if rowidx < 0 {
        return var_status_code(VarStatus::Undefined);
    }
    var_status_code(solver_ref(solver).row_status(rowidx as usize))
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_readBasisFile(
    solver: *mut c_void,
    filename: *const c_char,
) -> bool {
    match path_of(filename) {
        Some(p) => solver_mut(solver).read_basis_file(p).is_ok(),
        None => false,
    }
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_writeBasisFile(
    solver: *mut c_void,
    filename: *const c_char,
) -> bool {
    match path_of(filename) {
        Some(p) => solver_ref(solver).write_basis_file(p).is_ok(),
        None => false,
    }
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_readSettingsFile(
    solver: *mut c_void,
    filename: *const c_char,
) -> bool {
    match path_of(filename) {
        Some(p) => solver_mut(solver).read_settings_file(p).is_ok(),
        None => false,
    }
}

#[no_mangle]
pub unsafe extern "C" fn Seqplex_writeSettingsFile(
    solver: *mut c_void,
    filename: *const c_char,
) -> bool {
    match path_of(filename) {
        Some(p) => solver_ref(solver).write_settings_file(p).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqplex_core::Status;

    #[test]
    fn test_create_solve_free() {
        let h = Seqplex_create();

        // min x1 + x2  s.t.  x1 + x2 >= 1, x >= 0
        let row = [1.0, 1.0];
        unsafe {
            assert!(Seqplex_addCol(h, std::ptr::null(), 0, 1.0, 0.0, 1e100));
            assert!(Seqplex_addCol(h, std::ptr::null(), 0, 1.0, 0.0, 1e100));
            assert!(Seqplex_addRow(h, row.as_ptr(), 2, 1.0, 1e100));
        }
        assert_eq!(Seqplex_numCols(h), 2);
        assert_eq!(Seqplex_numRows(h), 1);

        let status = unsafe { Seqplex_optimize(h, std::ptr::null()) };
        assert_eq!(status, Status::Optimal.code());
        assert!((Seqplex_objValue(h) - 1.0).abs() < 1e-6);

        let mut x = [0.0f64; 2];
        unsafe { Seqplex_getPrimal(h, x.as_mut_ptr(), 2) };
        assert!((x[0] + x[1] - 1.0).abs() < 1e-6);

        assert!(Seqplex_hasSol(h));
        assert!(Seqplex_isPrimalFeasible(h));
        unsafe { Seqplex_free(h) };
    }

    #[test]
    fn test_param_round_trip() {
        let h = Seqplex_create();
        assert!(Seqplex_setIntParam(h, 4, 123)); // iter limit
        assert_eq!(Seqplex_getIntParam(h, 4), 123);
        assert!(Seqplex_setRealParam(h, 0, 1e-9)); // feas tol
        assert!((Seqplex_getRealParam(h, 0) - 1e-9).abs() < 1e-18);
        assert!(Seqplex_setBoolParam(h, 2, true)); // ensure ray
        assert!(Seqplex_getBoolParam(h, 2));
        assert!(Seqplex_setRealParam(h, 14, 5.5)); // objective offset
        assert!((Seqplex_getRealParam(h, 14) - 5.5).abs() < 1e-12);
        assert!(!Seqplex_setIntParam(h, 99, 0));
        unsafe { Seqplex_free(h) };
    }

    #[test]
    fn test_interrupt_flag() {
        let h = Seqplex_create();
        let row = [1.0];
        unsafe {
            assert!(Seqplex_addCol(h, std::ptr::null(), 0, -1.0, 0.0, 1e100));
            assert!(Seqplex_addRow(h, row.as_ptr(), 1, 0.0, 5.0));
        }
        let stop = true;
        let status = unsafe { Seqplex_optimize(h, &stop as *const bool) };
        // running-family status, resumable
        assert_eq!(status, Status::Running.code());
        let go = false;
        let status = unsafe { Seqplex_optimize(h, &go as *const bool) };
        assert_eq!(status, Status::Optimal.code());
        unsafe { Seqplex_free(h) };
    }
}
