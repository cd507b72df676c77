//! Weighted least-squares solver.
//!
//! Kernel SHAP reduces to one closed-form regression per target, so this is
//! the only solve the crate needs. Rank-deficient designs (fewer coalitions
//! than features) make the normal equations singular; that case is
//! recovered through the pseudo-inverse rather than treated as a crash.

use crate::error::{Result, ShapError};
use crate::linalg;
use faer::{Col, Mat, MatRef};
use tracing::warn;

/// Solve `min_beta sum_i w_i (x_i^T beta - y_i)^2`.
///
/// `weights` is either an m x 1 column, interpreted as `diag(w)`, or a full
/// m x m matrix. With `A = X^T W X` and `b = X^T W y`, the solution is
/// `A^-1 b` when `A` is regular and `pinv(A) b` otherwise; the fallback is
/// logged once per call.
pub fn weighted_least_squares(
    x: MatRef<'_, f64>,
    y: MatRef<'_, f64>,
    weights: MatRef<'_, f64>,
) -> Result<Col<f64>> {
    let m = x.nrows();
    if y.nrows() != m || y.ncols() != 1 {
        return Err(ShapError::ShapeMismatch {
            x_rows: m,
            y_rows: y.nrows(),
            y_cols: y.ncols(),
        });
    }

    let (a, b) = if weights.nrows() == m && weights.ncols() == 1 {
        // diag(w) applied by scaling the rows of X and y
        let wx = Mat::from_fn(m, x.ncols(), |i, j| weights[(i, 0)] * x[(i, j)]);
        let wy = Mat::from_fn(m, 1, |i, _| weights[(i, 0)] * y[(i, 0)]);
        (x.transpose() * wx.as_ref(), x.transpose() * wy.as_ref())
    } else if weights.nrows() == m && weights.ncols() == m {
        let wx = weights * x;
        let wy = weights * y;
        (x.transpose() * wx.as_ref(), x.transpose() * wy.as_ref())
    } else {
        return Err(ShapError::WeightShape {
            rows: weights.nrows(),
            cols: weights.ncols(),
            expected: m,
        });
    };

    let beta = match linalg::inverse(a.as_ref()) {
        Some(inv) => inv.as_ref() * b.as_ref(),
        None => {
            warn!(
                rows = m,
                cols = x.ncols(),
                "normal equations are singular; falling back to the pseudo-inverse"
            );
            linalg::pseudo_inverse(a.as_ref())?.as_ref() * b.as_ref()
        }
    };
    Ok(Col::from_fn(beta.nrows(), |i| beta[(i, 0)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 10 x 5 fixture; expected coefficients computed with an independent
    // implementation of the same normal equations.
    const X: [[f64; 5]; 10] = [
        [8.47, 2.98, 5.34, 4.42, 8.38],
        [9.62, 2.37, 2.68, 7.47, 5.96],
        [0.36, 2.86, 6.07, 7.33, 2.61],
        [5.13, 1.11, 9.23, 1.88, 1.08],
        [8.77, 5.32, 9.48, 4.41, 5.28],
        [6.23, 9.35, 8.65, 4.77, 4.89],
        [1.91, 9.04, 5.51, 6.66, 5.62],
        [7.98, 8.63, 5.05, 6.18, 6.25],
        [5.43, 6.38, 6.20, 4.37, 2.50],
        [8.99, 0.43, 1.18, 5.83, 5.52],
    ];
    const Y: [f64; 10] = [
        3.24, 13.52, 10.89, 12.54, 4.75, 13.20, 3.79, 4.34, -4.19, 8.17,
    ];
    const W: [f64; 10] = [
        1.054, 1.0, 0.957, 0.289, 0.804, 1.117, 0.219, 0.423, 0.495, 0.48,
    ];

    fn fixture() -> (Mat<f64>, Mat<f64>) {
        let x = Mat::from_fn(10, 5, |i, j| X[i][j]);
        let y = Mat::from_fn(10, 1, |i, _| Y[i]);
        (x, y)
    }

    fn assert_close(beta: &Col<f64>, expected: &[f64], tol: f64) {
        assert_eq!(beta.nrows(), expected.len());
        for (i, e) in expected.iter().enumerate() {
            assert!(
                (beta[i] - e).abs() < tol,
                "coefficient {i}: got {}, expected {e}",
                beta[i]
            );
        }
    }

    #[test]
    fn test_weighted_solution() {
        let (x, y) = fixture();
        let w = Mat::from_fn(10, 1, |i, _| W[i]);
        let beta = weighted_least_squares(x.as_ref(), y.as_ref(), w.as_ref()).unwrap();
        let expected = [
            0.3347006986061736,
            -0.23996333314003682,
            0.4164331620693644,
            1.538064006130896,
            -0.7824069793550628,
        ];
        assert_close(&beta, &expected, 1e-8);
    }

    #[test]
    fn test_unit_weights_match_ordinary_least_squares() {
        let (x, y) = fixture();
        let w = Mat::from_fn(10, 1, |_, _| 1.0);
        let beta = weighted_least_squares(x.as_ref(), y.as_ref(), w.as_ref()).unwrap();
        let expected = [
            0.17307144508204342,
            -0.8347423657551407,
            0.7764266801929149,
            1.382169517292148,
            -0.3924668536472673,
        ];
        assert_close(&beta, &expected, 1e-8);
    }

    #[test]
    fn test_diagonal_matrix_weights_match_column_weights() {
        let (x, y) = fixture();
        let w_col = Mat::from_fn(10, 1, |i, _| W[i]);
        let w_mat = Mat::from_fn(10, 10, |i, j| if i == j { W[i] } else { 0.0 });
        let a = weighted_least_squares(x.as_ref(), y.as_ref(), w_col.as_ref()).unwrap();
        let b = weighted_least_squares(x.as_ref(), y.as_ref(), w_mat.as_ref()).unwrap();
        for i in 0..5 {
            assert!((a[i] - b[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_singular_design_minimum_norm_solution() {
        // Duplicated column makes X^T W X singular; the pseudo-inverse
        // returns the minimum-norm solution, which splits the exact-fit
        // coefficient evenly across the two copies.
        let x = Mat::from_fn(3, 2, |i, _| (i + 1) as f64);
        let y = Mat::from_fn(3, 1, |i, _| 2.0 * (i + 1) as f64);
        let w = Mat::from_fn(3, 1, |_, _| 1.0);
        let beta = weighted_least_squares(x.as_ref(), y.as_ref(), w.as_ref()).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-8);
        assert!((beta[1] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_row_count_mismatch() {
        let (x, _) = fixture();
        let y = Mat::from_fn(9, 1, |i, _| Y[i]);
        let w = Mat::from_fn(10, 1, |i, _| W[i]);
        let err = weighted_least_squares(x.as_ref(), y.as_ref(), w.as_ref()).unwrap_err();
        assert!(matches!(
            err,
            ShapError::ShapeMismatch {
                x_rows: 10,
                y_rows: 9,
                y_cols: 1,
            }
        ));
    }

    #[test]
    fn test_multi_column_target_rejected() {
        let (x, _) = fixture();
        let y = Mat::from_fn(10, 2, |i, _| Y[i]);
        let w = Mat::from_fn(10, 1, |i, _| W[i]);
        let err = weighted_least_squares(x.as_ref(), y.as_ref(), w.as_ref()).unwrap_err();
        assert!(matches!(err, ShapError::ShapeMismatch { y_cols: 2, .. }));
    }

    #[test]
    fn test_weight_shape_rejected() {
        let (x, y) = fixture();
        let w = Mat::from_fn(10, 2, |i, _| W[i]);
        let err = weighted_least_squares(x.as_ref(), y.as_ref(), w.as_ref()).unwrap_err();
        assert!(matches!(
            err,
            ShapError::WeightShape {
                rows: 10,
                cols: 2,
                expected: 10,
            }
        ));
    }
}
