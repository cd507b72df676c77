//! The prediction capability supplied by the caller.

use crate::error::Result;
use faer::{Mat, MatRef};

/// Black-box batch predictor.
///
/// The explainer never looks inside the model; this is its only view of it.
/// Implementations must return one output row per input row with a fixed
/// number of target columns, and must be deterministic for the same input
/// (a nondeterministic model leaves the regression poorly conditioned).
pub trait Oracle {
    /// Evaluate a batch of rows: an m x F input yields an m x T output.
    fn predict_batch(&self, inputs: MatRef<'_, f64>) -> Result<Mat<f64>>;
}

/// Closures over a batch are oracles, so callers can pass a `Fn` directly.
impl<F> Oracle for F
where
    F: Fn(MatRef<'_, f64>) -> Result<Mat<f64>>,
{
    fn predict_batch(&self, inputs: MatRef<'_, f64>) -> Result<Mat<f64>> {
        self(inputs)
    }
}
