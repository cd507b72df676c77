use thiserror::Error;

/// Error types for the Kernel SHAP explainer
#[derive(Debug, Error)]
pub enum ShapError {
    /// Background data has no rows or no columns
    #[error("The background set must contain at least one row and one column.")]
    EmptyBackground,

    /// Background rows disagree on length
    #[error("Background row {row} has {found} values; every row must have {expected}.")]
    RaggedBackground {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Instance length differs from the background feature count
    #[error("The instance has {found} features; the explainer was built for {expected}.")]
    InstanceLength { expected: usize, found: usize },

    /// Requested sample count below one
    #[error("At least one coalition sample is required.")]
    InvalidSampleCount,

    /// Regression inputs disagree on shape
    #[error(
        "Design and target shapes disagree: design has {x_rows} rows, target is {y_rows} x {y_cols}; the target must be a single column with one row per design row."
    )]
    ShapeMismatch {
        x_rows: usize,
        y_rows: usize,
        y_cols: usize,
    },

    /// Regression weights neither a column nor a square matrix
    #[error("Weights must be {expected} x 1 or {expected} x {expected}; got {rows} x {cols}.")]
    WeightShape {
        rows: usize,
        cols: usize,
        expected: usize,
    },

    /// Model returned the wrong number of output rows
    #[error("The model returned {found} output rows for a batch of {expected}.")]
    OracleRows { expected: usize, found: usize },

    /// Model changed its number of targets between calls
    #[error("The model returned {found} targets; earlier calls returned {expected}.")]
    OracleTargets { expected: usize, found: usize },

    /// Model returned zero output columns
    #[error("The model returned an output with no targets.")]
    EmptyOracleOutput,

    /// Model evaluation failed; the underlying error is passed through unchanged
    #[error("Model evaluation failed: {0}")]
    Oracle(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Non-recoverable numerical failure
    #[error("Numerical computation failed: {reason}")]
    NumericDegenerate { reason: String },

    /// Sanity-check failure; indicates a bug rather than bad input
    #[error("Internal invariant violated: {detail}")]
    InternalInvariant { detail: String },
}

/// Result type alias for explainer operations
pub type Result<T> = std::result::Result<T, ShapError>;
