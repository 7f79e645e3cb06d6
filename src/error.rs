//! # Errors
//!
//! $$
//! \sigma_p = 0 \implies \text{SR}_p \text{ undefined}
//! $$
//!
//! Error taxonomy shared by the evaluator, the optimizers, the sweeps and the
//! data/reporting collaborators.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortfolioError {
  /// Vector and matrix sizes disagree.
  #[error("Dimension mismatch in {context}: expected {expected}, got {got}")]
  DimensionMismatch {
    context: String,
    expected: usize,
    got: usize,
  },

  /// Malformed input rejected before any computation.
  #[error("Invalid input for {field}: {reason}")]
  InvalidInput { field: String, reason: String },

  /// Portfolio volatility is numerically zero, so the Sharpe ratio is undefined.
  #[error("Degenerate volatility in {context}: Sharpe ratio is undefined")]
  DegenerateVolatility { context: String },

  #[error("Numerical failure: {0}")]
  NumericalFailure(String),

  /// Raised by callers that refuse to continue with an unconverged allocation.
  #[error("Solver did not converge in {stage} after {evaluations} objective evaluations")]
  SolverNonConvergence { stage: String, evaluations: u64 },

  #[error("Upstream data unavailable: {0}")]
  UpstreamDataUnavailable(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Csv(#[from] csv::Error),
}

impl PortfolioError {
  pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
    PortfolioError::InvalidInput {
      field: field.to_string(),
      reason: reason.into(),
    }
  }
}

/// Result type for portfolio computations.
pub type Result<T> = std::result::Result<T, PortfolioError>;
