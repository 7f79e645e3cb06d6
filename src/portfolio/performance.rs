//! # Portfolio Performance
//!
//! $$
//! \mu_p=\mathbf{w}^\top\mu,\qquad
//! \sigma_p=\sqrt{\max(\mathbf{w}^\top\Sigma\mathbf{w},0)},\qquad
//! \text{SR}_p=\frac{\mu_p-r_f}{\sigma_p}
//! $$
//!
//! Pure evaluation of an allocation against expected returns and covariance.

use ndarray::ArrayView1;

use super::types::CovarianceMatrix;
use super::types::ExpectedReturns;
use super::types::Performance;
use super::types::Weights;
use crate::error::PortfolioError;
use crate::error::Result;

/// Volatility at or below this is treated as zero.
pub const VOLATILITY_FLOOR: f64 = 1e-12;

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `w' Σ w` without clamping.
pub(crate) fn quad_form(cov: &CovarianceMatrix, w: &[f64]) -> f64 {
  let w = ArrayView1::from(w);
  w.dot(&cov.as_array().dot(&w))
}

fn check_dims(weights: &Weights, mean: &ExpectedReturns, cov: &CovarianceMatrix) -> Result<()> {
  if weights.len() != mean.len() {
    return Err(PortfolioError::DimensionMismatch {
      context: "weights vs expected returns".into(),
      expected: mean.len(),
      got: weights.len(),
    });
  }
  if cov.dim() != mean.len() {
    return Err(PortfolioError::DimensionMismatch {
      context: "covariance vs expected returns".into(),
      expected: mean.len(),
      got: cov.dim(),
    });
  }
  Ok(())
}

/// Portfolio variance with floating-point negatives clamped to zero.
pub fn portfolio_variance(weights: &Weights, cov: &CovarianceMatrix) -> Result<f64> {
  if weights.len() != cov.dim() {
    return Err(PortfolioError::DimensionMismatch {
      context: "weights vs covariance".into(),
      expected: cov.dim(),
      got: weights.len(),
    });
  }

  let var = quad_form(cov, weights.as_slice());
  if var.is_nan() {
    return Err(PortfolioError::NumericalFailure(
      "portfolio variance is NaN".into(),
    ));
  }
  Ok(var.max(0.0))
}

pub fn portfolio_volatility(weights: &Weights, cov: &CovarianceMatrix) -> Result<f64> {
  portfolio_variance(weights, cov).map(f64::sqrt)
}

/// `(ret - rf) / vol`, refusing a numerically zero volatility.
pub fn sharpe_ratio(expected_return: f64, volatility: f64, risk_free: f64) -> Result<f64> {
  if volatility <= VOLATILITY_FLOOR {
    return Err(PortfolioError::DegenerateVolatility {
      context: format!("sharpe ratio (volatility {volatility:e})"),
    });
  }
  Ok((expected_return - risk_free) / volatility)
}

/// Expected return, volatility and Sharpe ratio of `weights`.
pub fn evaluate(
  weights: &Weights,
  mean: &ExpectedReturns,
  cov: &CovarianceMatrix,
  risk_free: f64,
) -> Result<Performance> {
  check_dims(weights, mean, cov)?;
  if !risk_free.is_finite() {
    return Err(PortfolioError::invalid("risk_free_rate", "must be finite"));
  }

  let expected_return = weights.as_array().dot(mean.as_array());
  let volatility = portfolio_volatility(weights, cov)?;
  let sharpe = sharpe_ratio(expected_return, volatility, risk_free)?;

  Ok(Performance {
    expected_return,
    volatility,
    sharpe,
  })
}
