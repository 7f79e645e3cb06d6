//! # Sharpe Sensitivity
//!
//! $$
//! \Sigma_\alpha=(1-\alpha)\,\Sigma+\alpha\,\operatorname{diag}(\Sigma),\qquad
//! \text{SR}^\*(r_f)=\max_{\mathbf{w}\in\Delta^{N-1}}\frac{\mathbf{w}^\top\mu-r_f}{\sigma_p}
//! $$
//!
//! Re-solve the maximum-Sharpe portfolio across a risk-free-rate grid or a
//! covariance shrinkage grid. Output always has one point per grid value.

use ndarray::Array1;
use rayon::prelude::*;
use tracing::warn;

use super::optimizers::solve_max_sharpe;
use super::optimizers::SolverOptions;
use super::performance::evaluate;
use super::types::CovarianceMatrix;
use super::types::MeanVarianceInputs;
use super::types::SensitivityCurve;
use super::types::SensitivityPoint;
use crate::error::PortfolioError;
use crate::error::Result;

/// `linspace(0, 0.05, 6)`
pub fn default_risk_free_grid() -> Vec<f64> {
  Array1::linspace(0.0, 0.05, 6).to_vec()
}

/// `linspace(0, 1, 6)`
pub fn default_shrinkage_grid() -> Vec<f64> {
  Array1::linspace(0.0, 1.0, 6).to_vec()
}

fn check_grid(field: &str, grid: &[f64]) -> Result<()> {
  if grid.is_empty() {
    return Err(PortfolioError::invalid(field, "grid must not be empty"));
  }
  if let Some(i) = grid.iter().position(|v| !v.is_finite()) {
    return Err(PortfolioError::invalid(
      field,
      format!("grid value {i} is not finite"),
    ));
  }
  Ok(())
}

/// Blend the covariance toward its diagonal. Returns a new matrix.
pub fn shrink_covariance(cov: &CovarianceMatrix, alpha: f64) -> Result<CovarianceMatrix> {
  if !(0.0..=1.0).contains(&alpha) {
    return Err(PortfolioError::invalid(
      "shrinkage",
      format!("intensity {alpha} is outside [0, 1]"),
    ));
  }

  let diag = cov.diagonal_part();
  let shrunk = cov.as_array() * (1.0 - alpha) + diag.as_array() * alpha;
  Ok(CovarianceMatrix::from_trusted(shrunk))
}

/// Solve and evaluate at one `(inputs, rf)` pair, flagging instead of failing
/// on non-convergence or degenerate volatility.
fn sharpe_point(
  parameter: f64,
  inputs: &MeanVarianceInputs,
  risk_free: f64,
  options: &SolverOptions,
) -> Result<SensitivityPoint> {
  let allocation = solve_max_sharpe(inputs, risk_free, options)?;
  if !allocation.converged {
    warn!(parameter, "sensitivity point did not converge, flagging it");
  }

  let sharpe = match evaluate(&allocation.weights, inputs.mean(), inputs.cov(), risk_free) {
    Ok(perf) => Some(perf.sharpe),
    Err(PortfolioError::DegenerateVolatility { .. }) => {
      warn!(parameter, "degenerate volatility, Sharpe ratio undefined");
      None
    }
    Err(e) => return Err(e),
  };

  Ok(SensitivityPoint {
    parameter,
    sharpe,
    converged: allocation.converged,
  })
}

/// Optimal Sharpe ratio for each risk-free rate in `rf_grid`.
pub fn sweep_risk_free_rate(
  inputs: &MeanVarianceInputs,
  rf_grid: &[f64],
  options: &SolverOptions,
) -> Result<SensitivityCurve> {
  check_grid("risk_free_grid", rf_grid)?;

  let points = rf_grid
    .par_iter()
    .map(|&rf| sharpe_point(rf, inputs, rf, options))
    .collect::<Result<Vec<_>>>()?;

  Ok(SensitivityCurve { points })
}

/// Optimal Sharpe ratio for each shrinkage intensity in `shrink_grid`.
pub fn sweep_shrinkage(
  inputs: &MeanVarianceInputs,
  risk_free: f64,
  shrink_grid: &[f64],
  options: &SolverOptions,
) -> Result<SensitivityCurve> {
  check_grid("shrinkage_grid", shrink_grid)?;

  let points = shrink_grid
    .par_iter()
    .map(|&alpha| {
      let shrunk = inputs.with_cov(shrink_covariance(inputs.cov(), alpha)?)?;
      sharpe_point(alpha, &shrunk, risk_free, options)
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(SensitivityCurve { points })
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;
  use crate::portfolio::types::Weights;

  fn three_assets() -> MeanVarianceInputs {
    MeanVarianceInputs::from_vecs(
      vec![0.10, 0.12, 0.08],
      vec![
        vec![0.04, 0.006, 0.004],
        vec![0.006, 0.09, 0.008],
        vec![0.004, 0.008, 0.025],
      ],
    )
    .unwrap()
  }

  #[test]
  fn risk_free_sweep_is_aligned_and_non_increasing() {
    let inputs = three_assets();
    let grid = default_risk_free_grid();
    let curve = sweep_risk_free_rate(&inputs, &grid, &SolverOptions::default()).unwrap();

    assert_eq!(curve.len(), grid.len());
    assert_eq!(curve.parameters(), grid);
    assert!(curve.is_complete());

    let sharpes: Vec<f64> = curve.points.iter().filter_map(|p| p.sharpe).collect();
    for pair in sharpes.windows(2) {
      assert!(pair[1] <= pair[0] + 1e-9, "{} > {}", pair[1], pair[0]);
    }
  }

  #[test]
  fn zero_shrinkage_matches_direct_solve() {
    let inputs = three_assets();
    let options = SolverOptions::default();

    let curve = sweep_shrinkage(&inputs, 0.02, &[0.0], &options).unwrap();
    let direct = solve_max_sharpe(&inputs, 0.02, &options).unwrap();
    let direct_perf = evaluate(&direct.weights, inputs.mean(), inputs.cov(), 0.02).unwrap();

    let sharpe = curve.points[0].sharpe.unwrap();
    assert!((sharpe - direct_perf.sharpe).abs() < 1e-9);

    let unshrunk = inputs
      .with_cov(shrink_covariance(inputs.cov(), 0.0).unwrap())
      .unwrap();
    let reweighted = solve_max_sharpe(&unshrunk, 0.02, &options).unwrap();
    for (a, b) in reweighted
      .weights
      .as_slice()
      .iter()
      .zip(direct.weights.as_slice())
    {
      assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }
  }

  #[test]
  #[traced_test]
  fn unconverged_sub_solves_are_kept_and_flagged() {
    let inputs = three_assets();
    let options = SolverOptions {
      max_iters: 1,
      max_outer_iters: 1,
      ..SolverOptions::default()
    };

    let rf_grid = [0.0, 0.02, 0.04];
    let rf_curve = sweep_risk_free_rate(&inputs, &rf_grid, &options).unwrap();
    assert_eq!(rf_curve.parameters(), rf_grid);
    assert!(rf_curve.points.iter().all(|p| !p.converged));
    assert!(!rf_curve.is_complete());

    let shrink_grid = [0.0, 1.0];
    let shrink_curve = sweep_shrinkage(&inputs, 0.02, &shrink_grid, &options).unwrap();
    assert_eq!(shrink_curve.parameters(), shrink_grid);
    assert!(shrink_curve.points.iter().all(|p| !p.converged));
    assert!(!shrink_curve.is_complete());

    assert!(logs_contain("sensitivity point did not converge"));
  }

  #[test]
  fn full_shrinkage_is_exactly_diagonal() {
    let inputs = three_assets();
    let shrunk = shrink_covariance(inputs.cov(), 1.0).unwrap();

    assert!(shrunk.is_diagonal());
    assert_eq!(shrunk.variances(), inputs.cov().variances());
    assert_eq!(shrink_covariance(inputs.cov(), 0.0).unwrap(), *inputs.cov());
  }

  #[test]
  fn shrinkage_preserves_symmetry_and_leaves_source_untouched() {
    let inputs = three_assets();
    let before = inputs.cov().clone();

    for alpha in default_shrinkage_grid() {
      let shrunk = shrink_covariance(inputs.cov(), alpha).unwrap();
      assert_eq!(shrunk.dim(), 3);
      assert!(shrunk.is_symmetric());
    }
    assert_eq!(*inputs.cov(), before);
  }

  #[test]
  fn shrinkage_sweep_has_one_point_per_alpha() {
    let inputs = three_assets();
    let grid = default_shrinkage_grid();
    let curve = sweep_shrinkage(&inputs, 0.02, &grid, &SolverOptions::default()).unwrap();

    assert_eq!(curve.len(), grid.len());
    assert_eq!(curve.parameters(), grid);
    assert!(curve.is_complete());

    // Every point must still beat equal weights under its own covariance.
    for p in &curve.points {
      let cov = shrink_covariance(inputs.cov(), p.parameter).unwrap();
      let eq = evaluate(&Weights::equal(3).unwrap(), inputs.mean(), &cov, 0.02).unwrap();
      assert!(p.sharpe.unwrap() >= eq.sharpe - 1e-9);
    }
  }

  #[test]
  fn invalid_grids_are_rejected() {
    let inputs = three_assets();
    let options = SolverOptions::default();

    assert!(sweep_risk_free_rate(&inputs, &[], &options).is_err());
    assert!(sweep_risk_free_rate(&inputs, &[0.01, f64::NAN], &options).is_err());
    assert!(matches!(
      sweep_shrinkage(&inputs, 0.02, &[0.5, 1.5], &options),
      Err(PortfolioError::InvalidInput { .. })
    ));
  }

  #[test]
  fn degenerate_volatility_is_flagged_not_dropped() {
    let inputs =
      MeanVarianceInputs::from_vecs(vec![0.05, 0.05], vec![vec![0.0, 0.0], vec![0.0, 0.0]])
        .unwrap();
    let curve = sweep_risk_free_rate(&inputs, &[0.0, 0.01], &SolverOptions::default()).unwrap();

    assert_eq!(curve.len(), 2);
    assert!(curve.points.iter().all(|p| p.sharpe.is_none()));
    assert!(!curve.is_complete());
  }
}
