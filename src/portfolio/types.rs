//! # Portfolio Types
//!
//! $$
//! \mathbf{w}\in\Delta^{N-1}=\{\mathbf{w}\in[0,1]^N:\ \mathbf{1}^\top\mathbf{w}=1\}
//! $$
//!
//! Validated inputs (expected returns, covariance) and the result containers
//! produced by the optimizers, the frontier builder and the sweeps.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use crate::error::PortfolioError;
use crate::error::Result;

/// Tolerance on `sum(w) = 1` for any weight vector accepted or produced.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Relative tolerance for the symmetry check on covariance inputs.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Annualized expected return per asset.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpectedReturns(Array1<f64>);

impl ExpectedReturns {
  /// Non-empty vector of finite returns.
  pub fn new(values: Array1<f64>) -> Result<Self> {
    if values.is_empty() {
      return Err(PortfolioError::invalid(
        "expected_returns",
        "at least one asset is required",
      ));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
      return Err(PortfolioError::invalid(
        "expected_returns",
        format!("entry {i} is not finite"),
      ));
    }
    Ok(Self(values))
  }

  pub fn from_vec(values: Vec<f64>) -> Result<Self> {
    Self::new(Array1::from(values))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_array(&self) -> &Array1<f64> {
    &self.0
  }

  /// Smallest expected return, the lower end of the frontier grid.
  pub fn min(&self) -> f64 {
    self.0.iter().copied().fold(f64::INFINITY, f64::min)
  }

  /// Largest expected return.
  pub fn max(&self) -> f64 {
    self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
  }
}

/// Annualized N x N covariance matrix.
///
/// Symmetric with a non-negative diagonal. Positive semi-definiteness is not
/// checked; small negative quadratic forms are clamped by the evaluator.
#[derive(Clone, Debug, PartialEq)]
pub struct CovarianceMatrix(Array2<f64>);

impl CovarianceMatrix {
  pub fn new(values: Array2<f64>) -> Result<Self> {
    let (rows, cols) = values.dim();
    if rows == 0 {
      return Err(PortfolioError::invalid(
        "covariance",
        "matrix must not be empty",
      ));
    }
    if rows != cols {
      return Err(PortfolioError::DimensionMismatch {
        context: "covariance columns".into(),
        expected: rows,
        got: cols,
      });
    }
    if values.iter().any(|v| !v.is_finite()) {
      return Err(PortfolioError::invalid(
        "covariance",
        "all entries must be finite",
      ));
    }

    for i in 0..rows {
      if values[[i, i]] < 0.0 {
        return Err(PortfolioError::invalid(
          "covariance",
          format!("variance of asset {i} is negative"),
        ));
      }
      for j in (i + 1)..rows {
        let (a, b) = (values[[i, j]], values[[j, i]]);
        let scale = a.abs().max(b.abs()).max(1.0);
        if (a - b).abs() > SYMMETRY_TOLERANCE * scale {
          return Err(PortfolioError::invalid(
            "covariance",
            format!("matrix is not symmetric at ({i}, {j})"),
          ));
        }
      }
    }

    Ok(Self(values))
  }

  /// Build from row vectors; every row must have the same length as the row count.
  pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
    let n = rows.len();
    for (i, row) in rows.iter().enumerate() {
      if row.len() != n {
        return Err(PortfolioError::DimensionMismatch {
          context: format!("covariance row {i}"),
          expected: n,
          got: row.len(),
        });
      }
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let values = Array2::from_shape_vec((n, n), flat)
      .map_err(|e| PortfolioError::invalid("covariance", e.to_string()))?;
    Self::new(values)
  }

  /// Diagonal covariance built from per-asset variances.
  pub fn from_variances(variances: &[f64]) -> Result<Self> {
    Self::new(Array2::from_diag(&ArrayView1::from(variances)))
  }

  /// Wrap a matrix already known to satisfy the invariants.
  pub(crate) fn from_trusted(values: Array2<f64>) -> Self {
    Self(values)
  }

  pub fn dim(&self) -> usize {
    self.0.nrows()
  }

  pub fn as_array(&self) -> &Array2<f64> {
    &self.0
  }

  pub fn variances(&self) -> Array1<f64> {
    self.0.diag().to_owned()
  }

  /// A fresh matrix holding only the diagonal of `self`.
  pub fn diagonal_part(&self) -> Self {
    Self(Array2::from_diag(&self.0.diag()))
  }

  pub fn is_diagonal(&self) -> bool {
    self
      .0
      .indexed_iter()
      .all(|((i, j), v)| i == j || *v == 0.0)
  }

  pub fn is_symmetric(&self) -> bool {
    let n = self.dim();
    (0..n).all(|i| (0..n).all(|j| self.0[[i, j]] == self.0[[j, i]]))
  }
}

/// Expected returns and covariance of the same dimension.
#[derive(Clone, Debug)]
pub struct MeanVarianceInputs {
  mean: ExpectedReturns,
  cov: CovarianceMatrix,
}

impl MeanVarianceInputs {
  pub fn new(mean: ExpectedReturns, cov: CovarianceMatrix) -> Result<Self> {
    if mean.len() != cov.dim() {
      return Err(PortfolioError::DimensionMismatch {
        context: "covariance vs expected returns".into(),
        expected: mean.len(),
        got: cov.dim(),
      });
    }
    Ok(Self { mean, cov })
  }

  /// Convenience constructor from plain vectors.
  pub fn from_vecs(mean: Vec<f64>, cov: Vec<Vec<f64>>) -> Result<Self> {
    Self::new(ExpectedReturns::from_vec(mean)?, CovarianceMatrix::from_rows(cov)?)
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  pub fn mean(&self) -> &ExpectedReturns {
    &self.mean
  }

  pub fn cov(&self) -> &CovarianceMatrix {
    &self.cov
  }

  /// Same expected returns with a different covariance.
  pub fn with_cov(&self, cov: CovarianceMatrix) -> Result<Self> {
    Self::new(self.mean.clone(), cov)
  }
}

/// Long-only, fully invested weight vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Weights(Array1<f64>);

impl Weights {
  /// Validate an explicit allocation: every weight in `[0, 1]`, sum within
  /// [`WEIGHT_SUM_TOLERANCE`] of one.
  pub fn try_from_vec(values: Vec<f64>) -> Result<Self> {
    if values.is_empty() {
      return Err(PortfolioError::invalid("weights", "must not be empty"));
    }
    if let Some(i) = values
      .iter()
      .position(|w| !w.is_finite() || *w < 0.0 || *w > 1.0)
    {
      return Err(PortfolioError::invalid(
        "weights",
        format!("weight {i} is outside [0, 1]"),
      ));
    }
    let sum: f64 = values.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
      return Err(PortfolioError::invalid(
        "weights",
        format!("weights sum to {sum}, expected 1"),
      ));
    }
    Ok(Self(Array1::from(values)))
  }

  /// Uniform `1/N` allocation.
  pub fn equal(n: usize) -> Result<Self> {
    if n == 0 {
      return Err(PortfolioError::invalid("weights", "must not be empty"));
    }
    Ok(Self(Array1::from_elem(n, 1.0 / n as f64)))
  }

  /// Solver output on the simplex; renormalized to absorb rounding.
  pub(crate) fn from_simplex(mut values: Vec<f64>) -> Self {
    for w in values.iter_mut() {
      *w = w.clamp(0.0, 1.0);
    }
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
      for w in values.iter_mut() {
        *w /= sum;
      }
    }
    Self(Array1::from(values))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_array(&self) -> &Array1<f64> {
    &self.0
  }

  pub fn as_slice(&self) -> &[f64] {
    self.0.as_slice().unwrap_or(&[])
  }

  pub fn sum(&self) -> f64 {
    self.0.sum()
  }

  pub fn to_vec(&self) -> Vec<f64> {
    self.0.to_vec()
  }
}

/// Expected return, volatility and Sharpe ratio of one allocation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Performance {
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
}

/// Output of a single constrained solve.
#[derive(Clone, Debug)]
pub struct Allocation {
  pub weights: Weights,
  /// `false` when the solver stopped without meeting its stationarity or
  /// constraint tolerances. `weights` are still feasible but not trusted.
  pub converged: bool,
  /// Objective evaluations spent, across all outer iterations.
  pub evaluations: u64,
}

/// A solved allocation together with its evaluated performance.
#[derive(Clone, Debug)]
pub struct PortfolioResult {
  pub allocation: Allocation,
  pub performance: Performance,
}

/// One solved point of the efficient frontier.
#[derive(Clone, Debug)]
pub struct FrontierPoint {
  /// Position of the target in the return grid.
  pub grid_index: usize,
  pub expected_return: f64,
  pub volatility: f64,
  pub weights: Weights,
}

/// Efficient frontier sampled on a target-return grid.
#[derive(Clone, Debug, Default)]
pub struct Frontier {
  /// Solved points in grid order.
  pub points: Vec<FrontierPoint>,
  /// Targets whose solve did not converge, in grid order.
  pub gaps: Vec<f64>,
  pub grid_len: usize,
}

impl Frontier {
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Solved point with the smallest volatility.
  pub fn min_volatility_point(&self) -> Option<&FrontierPoint> {
    self
      .points
      .iter()
      .min_by(|a, b| a.volatility.total_cmp(&b.volatility))
  }

  /// Contiguous runs of solved grid points. A dropped target splits the curve.
  pub fn segments(&self) -> Vec<&[FrontierPoint]> {
    let indices: Vec<usize> = self.points.iter().map(|p| p.grid_index).collect();
    contiguous_runs(&indices)
      .into_iter()
      .map(|r| &self.points[r])
      .collect()
  }
}

pub(crate) fn contiguous_runs(indices: &[usize]) -> Vec<std::ops::Range<usize>> {
  let mut runs = Vec::new();
  let mut start = 0;
  for i in 1..=indices.len() {
    if i == indices.len() || indices[i] != indices[i - 1] + 1 {
      if start < i {
        runs.push(start..i);
      }
      start = i;
    }
  }
  runs
}

/// Swept parameter value and the Sharpe ratio of the re-optimized portfolio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensitivityPoint {
  pub parameter: f64,
  /// `None` when the re-optimized portfolio has degenerate volatility.
  pub sharpe: Option<f64>,
  pub converged: bool,
}

impl SensitivityPoint {
  /// Sharpe ratio of a converged, non-degenerate sub-solve.
  pub fn trusted_sharpe(&self) -> Option<f64> {
    if self.converged {
      self.sharpe
    } else {
      None
    }
  }
}

/// One entry per grid value, in grid order.
#[derive(Clone, Debug, Default)]
pub struct SensitivityCurve {
  pub points: Vec<SensitivityPoint>,
}

impl SensitivityCurve {
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn parameters(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.parameter).collect()
  }

  /// Every grid point converged with a defined Sharpe ratio.
  pub fn is_complete(&self) -> bool {
    self.points.iter().all(|p| p.trusted_sharpe().is_some())
  }
}
