//! Dense-matrix helpers for the regression math.
//!
//! Everything is 64-bit; `faer` supplies the matrix type and
//! decompositions. Singularity is reported to the caller instead of
//! aborting, so the solver can fall back to the pseudo-inverse.

use crate::error::{Result, ShapError};
use faer::prelude::*;
use faer::{Mat, MatRef};

/// Determinant-checked inverse. Returns `None` when the matrix is singular
/// (zero or non-finite determinant).
pub fn inverse(a: MatRef<'_, f64>) -> Option<Mat<f64>> {
    debug_assert_eq!(a.nrows(), a.ncols());
    let det = a.determinant();
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let eye = Mat::<f64>::identity(a.nrows(), a.ncols());
    Some(a.partial_piv_lu().solve(eye.as_ref()))
}

/// Moore-Penrose pseudo-inverse via SVD. Singular values below
/// `max(m, n) * eps * sigma_max` are treated as zero.
pub fn pseudo_inverse(a: MatRef<'_, f64>) -> Result<Mat<f64>> {
    let (m, n) = (a.nrows(), a.ncols());
    let svd = a.svd().map_err(|_| ShapError::NumericDegenerate {
        reason: "singular value decomposition did not converge".to_string(),
    })?;
    let u = svd.U();
    let s = svd.S().column_vector();
    let v = svd.V();

    let k = m.min(n);
    let s_max = (0..k).map(|i| s[i]).fold(0.0f64, f64::max);
    let tol = m.max(n) as f64 * f64::EPSILON * s_max;

    // S^+ U^T with rank truncation; pinv(A) = V S^+ U^T
    let mut su = Mat::<f64>::zeros(n, m);
    for i in 0..k {
        let si = s[i];
        if si > tol {
            for j in 0..m {
                su[(i, j)] = u[(j, i)] / si;
            }
        }
    }
    Ok(v * su.as_ref())
}
