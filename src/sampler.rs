//! Coalition construction: mask matrix and kernel weights.
//!
//! The weight of a coalition of size z over F features is
//! `(F - 1) / (C(F, z) * z * (F - z))`; aggregated per size this is
//! `W(z) = (F - 1) / (z * (F - z))` with `W(z) = W(F - z)`, so sizes z and
//! F - z share a slot whose paired weight is doubled. Cheap sizes are
//! enumerated outright (small subsets and their complements), the rest are
//! sampled in proportion to the per-size weight that remains.
//!
//! Randomness is consumed in a fixed order so seeded runs reproduce
//! exactly: one uniform selects the subset size by CDF inversion, then one
//! uniform per selected element drives a partial Fisher-Yates shuffle.

use crate::error::{Result, ShapError};
use crate::rng::Lcg;
use crate::utils::{binomial, for_each_subset};
use faer::{Col, Mat};
use std::collections::HashMap;
use tracing::debug;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Coalition rows and kernel weights for one explanation call.
pub struct CoalitionSamples {
    /// S x F mask matrix; 1 selects the instance value, 0 the background.
    pub masks: Mat<f64>,
    /// Kernel weight per row, normalized to sum to one.
    pub weights: Col<f64>,
    /// True when every non-trivial coalition was enumerated.
    pub fully_enumerated: bool,
}

/// Mask rows in first-seen order with on-line weight accumulation for
/// duplicates. Keys are bit-packed so they stay small for any F.
struct MaskAccumulator {
    rows: Vec<Vec<u8>>,
    weights: Vec<f64>,
    seen: HashMap<Vec<u8>, usize>,
}

impl MaskAccumulator {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            weights: Vec::new(),
            seen: HashMap::new(),
        }
    }

    fn key(mask: &[u8]) -> Vec<u8> {
        let mut packed = vec![0u8; mask.len().div_ceil(8)];
        for (i, &bit) in mask.iter().enumerate() {
            if bit == 1 {
                packed[i / 8] |= 1 << (i % 8);
            }
        }
        packed
    }

    /// Insert a new row or fold the weight into the first-seen copy.
    /// Returns true when the row is new.
    fn insert_or_accumulate(&mut self, mask: &[u8], weight: f64) -> bool {
        let key = Self::key(mask);
        match self.seen.get(&key) {
            Some(&idx) => {
                self.weights[idx] += weight;
                false
            }
            None => {
                self.seen.insert(key, self.rows.len());
                self.rows.push(mask.to_vec());
                self.weights.push(weight);
                true
            }
        }
    }
}

/// Build the mask matrix and kernel weights for `n_features` >= 2.
///
/// The effective budget is `min(n_samples, 2^F - 2)` for F <= 30 and
/// `n_samples` beyond that; the all-zeros and all-ones coalitions are never
/// emitted (they enter the regression as constraints instead). A sampled
/// mask of a paired size always brings its complement along, even when the
/// pair lands on the last budget slot, so at most one row past the budget
/// can appear.
pub fn sample_coalitions(
    n_features: usize,
    n_samples: usize,
    rng: &mut Lcg,
) -> Result<CoalitionSamples> {
    let f = n_features;
    if f < 2 {
        return Err(ShapError::InternalInvariant {
            detail: format!("coalition sampling needs at least two features, got {f}"),
        });
    }

    let budget = if f <= 30 {
        n_samples.min((1usize << f) - 2)
    } else {
        n_samples
    };

    let num_subset_sizes = (f - 1).div_ceil(2);
    let num_paired = (f - 1) / 2;

    // Per-size kernel weights; paired slots cover both z and F - z.
    let mut weight_vector: Vec<f64> = (1..=num_subset_sizes)
        .map(|z| (f - 1) as f64 / (z * (f - z)) as f64)
        .collect();
    for w in weight_vector.iter_mut().take(num_paired) {
        *w *= 2.0;
    }
    let total: f64 = weight_vector.iter().sum();
    for w in &mut weight_vector {
        *w /= total;
    }

    let mut acc = MaskAccumulator::new();
    let mut remaining = weight_vector.clone();
    let mut num_full_subsets = 0usize;
    let mut samples_left = budget;
    let mut mask = vec![0u8; f];
    // Mass the shells deposit into the accumulator; checked against the
    // stored weights before normalization.
    let mut expected_mass = 0.0f64;

    // Deterministic shell: enumerate a size outright while the budget
    // assigns at least one sample to each of its subsets.
    for s in 1..=num_subset_sizes {
        let n_choose = binomial(f, s);
        let paired = s <= num_paired;
        let nsubsets = if paired { 2.0 * n_choose } else { n_choose };
        if samples_left as f64 * remaining[s - 1] / nsubsets < 1.0 - 1e-8 {
            break;
        }
        num_full_subsets += 1;
        samples_left = samples_left.saturating_sub(nsubsets.round() as usize);
        expected_mass += weight_vector[s - 1];
        if remaining[s - 1] < 1.0 {
            let consumed = remaining[s - 1];
            for v in &mut remaining {
                *v /= 1.0 - consumed;
            }
        }
        let mut w = weight_vector[s - 1] / n_choose;
        if paired {
            w /= 2.0;
        }
        for_each_subset(f, s, |inds| {
            mask.fill(0);
            for &i in inds {
                mask[i] = 1;
            }
            acc.insert_or_accumulate(&mask, w);
            if paired {
                for b in mask.iter_mut() {
                    *b = 1 - *b;
                }
                acc.insert_or_accumulate(&mask, w);
            }
        });
    }

    let fully_enumerated = num_full_subsets == num_subset_sizes;
    let deterministic_rows = acc.rows.len();

    // Random shell: spend the rest of the budget on the sizes that were too
    // large to enumerate, re-weighted now that the enumerated mass is gone.
    if !fully_enumerated && samples_left > 0 {
        let remaining_mass: f64 = weight_vector[num_full_subsets..].iter().sum();
        let selection: Vec<f64> = weight_vector[num_full_subsets..]
            .iter()
            .map(|v| v / remaining_mass)
            .collect();
        let per_row = remaining_mass / samples_left as f64;

        let mut pool: Vec<usize> = (0..f).collect();
        let mut attempts = 0usize;
        let max_attempts = 4 * samples_left;
        while samples_left > 0 && attempts < max_attempts {
            attempts += 1;

            let u = rng.next_f64();
            let mut slot = selection.len() - 1;
            let mut cdf = 0.0;
            for (i, p) in selection.iter().enumerate() {
                cdf += p;
                if u < cdf {
                    slot = i;
                    break;
                }
            }
            let size = num_full_subsets + slot + 1;

            for (i, v) in pool.iter_mut().enumerate() {
                *v = i;
            }
            for i in 0..size {
                let j = i + (rng.next_f64() * (f - i) as f64) as usize;
                pool.swap(i, j);
            }
            mask.fill(0);
            for &i in &pool[..size] {
                mask[i] = 1;
            }

            let paired = size <= num_paired;
            let w = if paired { per_row / 2.0 } else { per_row };
            if acc.insert_or_accumulate(&mask, w) {
                samples_left -= 1;
            }
            // The complement always comes along, even when the primary
            // insertion used up the last budget slot; the pair must stay
            // whole for the weights to balance.
            if paired {
                for b in mask.iter_mut() {
                    *b = 1 - *b;
                }
                if acc.insert_or_accumulate(&mask, w) {
                    samples_left = samples_left.saturating_sub(1);
                }
            }
            expected_mass += per_row;
        }
    }

    let rows = acc.rows.len();
    if rows == 0 || rows > budget + 1 {
        return Err(ShapError::InternalInvariant {
            detail: format!("sampled {rows} coalitions against a budget of {budget}"),
        });
    }

    // Compare before normalizing: dividing by the sum afterwards would make
    // any accumulation defect invisible.
    let sum: f64 = acc.weights.iter().sum();
    if (sum - expected_mass).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ShapError::InternalInvariant {
            detail: format!(
                "kernel weights sum to {sum} before normalization; the shells deposited {expected_mass}"
            ),
        });
    }
    for w in &mut acc.weights {
        *w /= sum;
    }

    debug!(
        rows,
        deterministic_rows, fully_enumerated, "coalition sampling complete"
    );

    let masks = Mat::from_fn(rows, f, |i, j| acc.rows[i][j] as f64);
    let weights = Col::from_fn(rows, |i| acc.weights[i]);
    Ok(CoalitionSamples {
        masks,
        weights,
        fully_enumerated,
    })
}
