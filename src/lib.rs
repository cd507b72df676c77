//! Kernel SHAP feature attributions for black-box models
//!
//! Shapley values for a single prediction are recovered as the solution of
//! a specially weighted linear regression over sampled feature coalitions:
//! absent features are replaced by background-distribution values, the
//! model is evaluated in one batched pass over the masked inputs, and a
//! constrained weighted least-squares solve per target yields attributions
//! that sum to `f(x) - E[f]` exactly. The model is supplied as an
//! [`Oracle`]; the crate never looks at its internals.

pub mod error;
pub mod explainer;
pub mod linalg;
pub mod masking;
pub mod oracle;
pub mod rng;
pub mod sampler;
mod utils;
pub mod wls;

// Re-export main types and functions
pub use error::{Result, ShapError};
pub use explainer::{DEFAULT_SEED, KernelShap, KernelShapBuilder};
pub use oracle::Oracle;
pub use sampler::CoalitionSamples;
pub use wls::weighted_least_squares;
