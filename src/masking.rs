//! Masked-input materialization and the batched inference drive.
//!
//! Each coalition row expands into N background-sized replicates: present
//! features take the instance value, absent features the background row's.
//! The expanded design goes through the model in sampler order; with a
//! batch cap in place it is materialized chunk by chunk instead of all at
//! once, so S * N rows never need to exist in memory together. Each
//! coalition's N output rows are averaged into one regression target row.

use crate::error::{Result, ShapError};
use crate::oracle::Oracle;
use faer::{Mat, MatRef};

/// Expected model outputs per coalition:
/// `Y[s, t] = (1/N) * sum_i f(masked(s, i))[t]`.
pub fn expected_oracle_outputs<O: Oracle>(
    oracle: &O,
    x: &[f64],
    background: MatRef<'_, f64>,
    masks: MatRef<'_, f64>,
    n_targets: usize,
    max_batch_rows: Option<usize>,
) -> Result<Mat<f64>> {
    let n = background.nrows();
    let f = background.ncols();
    let s = masks.nrows();
    if masks.ncols() != f || x.len() != f {
        return Err(ShapError::InternalInvariant {
            detail: format!(
                "mask width {} and instance length {} must both equal the feature count {f}",
                masks.ncols(),
                x.len()
            ),
        });
    }

    let total_rows = s * n;
    let chunk = max_batch_rows.unwrap_or(total_rows).max(1);

    // Row s*N + i of the expanded design is mask row s applied over
    // background row i; sums accumulate in f64 regardless of what the
    // model used internally.
    let mut sums = Mat::<f64>::zeros(s, n_targets);
    let mut start = 0;
    while start < total_rows {
        let take = chunk.min(total_rows - start);
        let batch = Mat::from_fn(take, f, |r, j| {
            let row = start + r;
            let (si, bi) = (row / n, row % n);
            if masks[(si, j)] == 1.0 {
                x[j]
            } else {
                background[(bi, j)]
            }
        });
        let out = oracle.predict_batch(batch.as_ref())?;
        validate_output(&out, take, n_targets)?;
        for r in 0..take {
            let si = (start + r) / n;
            for t in 0..n_targets {
                sums[(si, t)] += out[(r, t)];
            }
        }
        start += take;
    }

    let inv_n = 1.0 / n as f64;
    Ok(Mat::from_fn(s, n_targets, |si, t| sums[(si, t)] * inv_n))
}

fn validate_output(out: &Mat<f64>, expected_rows: usize, expected_targets: usize) -> Result<()> {
    if out.nrows() != expected_rows {
        return Err(ShapError::OracleRows {
            expected: expected_rows,
            found: out.nrows(),
        });
    }
    if out.ncols() != expected_targets {
        return Err(ShapError::OracleTargets {
            expected: expected_targets,
            found: out.ncols(),
        });
    }
    Ok(())
}
