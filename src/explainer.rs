//! Explainer orchestration: background expectations, coalition sampling,
//! masked inference, and the per-target constrained regression.

use crate::{
    error::{Result, ShapError},
    masking::expected_oracle_outputs,
    oracle::Oracle,
    rng::{Lcg, clamp_seed},
    sampler::sample_coalitions,
    wls::weighted_least_squares,
};
use faer::{Col, Mat, MatRef, Par};
use rayon::prelude::*;
use tracing::debug;

/// Default RNG seed, fixed so examples reproduce run to run.
pub const DEFAULT_SEED: f64 = 0.20071022;

/// Kernel SHAP explainer for a black-box model.
///
/// Holds the model, the background set, and the cached background
/// predictions. Per-call state lives in the call frame, so one explainer
/// can serve concurrent `explain_one_instance` calls; every call seeds its
/// own generator from the stored seed.
pub struct KernelShap<O> {
    oracle: O,
    background: Mat<f64>,
    base_predictions: Mat<f64>,
    expected_value: Col<f64>,
    seed: f64,
    max_batch_rows: Option<usize>,
}

impl<O> std::fmt::Debug for KernelShap<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelShap")
            .field("oracle", &"<oracle>")
            .field("background", &self.background)
            .field("base_predictions", &self.base_predictions)
            .field("expected_value", &self.expected_value)
            .field("seed", &self.seed)
            .field("max_batch_rows", &self.max_batch_rows)
            .finish()
    }
}

/// Configuration surface for [`KernelShap`].
pub struct KernelShapBuilder<O> {
    oracle: O,
    background: Vec<Vec<f64>>,
    seed: f64,
    max_batch_rows: Option<usize>,
}

impl<O: Oracle> KernelShapBuilder<O> {
    pub fn new(oracle: O, background: Vec<Vec<f64>>) -> Self {
        Self {
            oracle,
            background,
            seed: DEFAULT_SEED,
            max_batch_rows: None,
        }
    }

    /// RNG seed; values outside `[0, 1)` are clamped by `|seed| - floor(|seed|)`.
    pub fn seed(mut self, seed: f64) -> Self {
        self.seed = seed;
        self
    }

    /// Cap on rows per model call; the expanded design is streamed through
    /// the model in contiguous sub-batches of at most this many rows.
    pub fn max_batch_rows(mut self, rows: usize) -> Self {
        self.max_batch_rows = Some(rows);
        self
    }

    pub fn build(self) -> Result<KernelShap<O>> {
        KernelShap::with_options(self.oracle, self.background, self.seed, self.max_batch_rows)
    }
}

impl<O: Oracle> KernelShap<O> {
    /// Build an explainer with the default seed and unbounded batches.
    ///
    /// Validates the background set, then evaluates the model on it once to
    /// cache the base predictions and their per-target mean.
    pub fn new(oracle: O, background: Vec<Vec<f64>>) -> Result<Self> {
        Self::with_options(oracle, background, DEFAULT_SEED, None)
    }

    pub fn builder(oracle: O, background: Vec<Vec<f64>>) -> KernelShapBuilder<O> {
        KernelShapBuilder::new(oracle, background)
    }

    fn with_options(
        oracle: O,
        background: Vec<Vec<f64>>,
        seed: f64,
        max_batch_rows: Option<usize>,
    ) -> Result<Self> {
        faer::set_global_parallelism(Par::rayon(0));

        if background.is_empty() || background[0].is_empty() {
            return Err(ShapError::EmptyBackground);
        }
        let f = background[0].len();
        for (row, values) in background.iter().enumerate() {
            if values.len() != f {
                return Err(ShapError::RaggedBackground {
                    row,
                    expected: f,
                    found: values.len(),
                });
            }
        }
        let n = background.len();
        let background = Mat::from_fn(n, f, |i, j| background[i][j]);

        let base_predictions = oracle.predict_batch(background.as_ref())?;
        if base_predictions.nrows() != n {
            return Err(ShapError::OracleRows {
                expected: n,
                found: base_predictions.nrows(),
            });
        }
        let t = base_predictions.ncols();
        if t == 0 {
            return Err(ShapError::EmptyOracleOutput);
        }
        let expected_value = Col::from_fn(t, |tj| {
            (0..n).map(|i| base_predictions[(i, tj)]).sum::<f64>() / n as f64
        });

        Ok(Self {
            oracle,
            background,
            base_predictions,
            expected_value,
            seed: clamp_seed(seed),
            max_batch_rows,
        })
    }

    pub fn num_features(&self) -> usize {
        self.background.ncols()
    }

    pub fn num_targets(&self) -> usize {
        self.base_predictions.ncols()
    }

    /// Per-target mean of the model over the background set.
    pub fn expected_value(&self) -> &Col<f64> {
        &self.expected_value
    }

    /// Cached model outputs on the background set (N x T).
    pub fn base_predictions(&self) -> MatRef<'_, f64> {
        self.base_predictions.as_ref()
    }

    /// The clamped seed in effect.
    pub fn seed(&self) -> f64 {
        self.seed
    }

    /// Attribute the model's prediction on `x` to its features.
    ///
    /// Returns a T x F matrix whose row t sums to `f(x)[t] - E[f][t]`.
    /// `n_samples` bounds the number of coalitions; it defaults to
    /// `2 * F + 2048` and is capped at `2^F - 2` for F <= 30.
    pub fn explain_one_instance(&self, x: &[f64], n_samples: Option<usize>) -> Result<Mat<f64>> {
        let f = self.num_features();
        let t = self.num_targets();
        if x.len() != f {
            return Err(ShapError::InstanceLength {
                expected: f,
                found: x.len(),
            });
        }
        if n_samples == Some(0) {
            return Err(ShapError::InvalidSampleCount);
        }

        let instance = Mat::from_fn(1, f, |_, j| x[j]);
        let fx_out = self.oracle.predict_batch(instance.as_ref())?;
        if fx_out.nrows() != 1 {
            return Err(ShapError::OracleRows {
                expected: 1,
                found: fx_out.nrows(),
            });
        }
        if fx_out.ncols() != t {
            return Err(ShapError::OracleTargets {
                expected: t,
                found: fx_out.ncols(),
            });
        }
        let fx = Col::from_fn(t, |tj| fx_out[(0, tj)]);
        let ev = &self.expected_value;

        // A single feature carries the whole difference; nothing to sample.
        if f == 1 {
            return Ok(Mat::from_fn(t, 1, |tj, _| fx[tj] - ev[tj]));
        }

        let n_samples = n_samples.unwrap_or(2 * f + 2048);
        let mut rng = Lcg::from_seed(self.seed);
        let samples = sample_coalitions(f, n_samples, &mut rng)?;
        let s = samples.masks.nrows();
        let masks = samples.masks.as_ref();

        let y = expected_oracle_outputs(
            &self.oracle,
            x,
            self.background.as_ref(),
            masks,
            t,
            self.max_batch_rows,
        )?;

        // The all-ones and all-zeros coalitions enter as constraints: the
        // last feature's attribution is expressed through the others, which
        // pins the row sum to f(x) - E[f].
        let x_adj = Mat::from_fn(s, f - 1, |i, j| masks[(i, j)] - masks[(i, f - 1)]);
        let w_col = Mat::from_fn(s, 1, |i, _| samples.weights[i]);

        let betas: Vec<Result<Col<f64>>> = (0..t)
            .into_par_iter()
            .map(|tj| {
                let y_adj = Mat::from_fn(s, 1, |i, _| {
                    y[(i, tj)] - ev[tj] - masks[(i, f - 1)] * (fx[tj] - ev[tj])
                });
                weighted_least_squares(x_adj.as_ref(), y_adj.as_ref(), w_col.as_ref())
            })
            .collect();

        let mut phi = Mat::zeros(t, f);
        for (tj, beta) in betas.into_iter().enumerate() {
            let beta = beta?;
            if beta.nrows() != f - 1 {
                return Err(ShapError::InternalInvariant {
                    detail: format!(
                        "regression returned {} coefficients for {} free features",
                        beta.nrows(),
                        f - 1
                    ),
                });
            }
            let mut assigned = 0.0;
            for j in 0..f - 1 {
                phi[(tj, j)] = beta[j];
                assigned += beta[j];
            }
            phi[(tj, f - 1)] = (fx[tj] - ev[tj]) - assigned;
        }

        debug!(
            coalitions = s,
            targets = t,
            fully_enumerated = samples.fully_enumerated,
            "explanation complete"
        );
        Ok(phi)
    }
}
