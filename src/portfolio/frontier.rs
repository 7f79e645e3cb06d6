//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(r^\*)=\min_{\mathbf{w}\in\Delta^{N-1}}\ \sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}
//! \quad\text{s.t.}\quad \mathbf{w}^\top\mu=r^\*,\qquad
//! r^\*\in\operatorname{linspace}(\min\mu,\max\mu,K)
//! $$
//!
//! Grid points whose solve does not converge are dropped from the curve and
//! reported as gaps, so the returned frontier may hold fewer than `K` points.

use ndarray::Array1;
use rayon::prelude::*;
use tracing::info;
use tracing::warn;

use super::optimizers::solve_min_volatility;
use super::optimizers::SolverOptions;
use super::performance::portfolio_volatility;
use super::types::Frontier;
use super::types::FrontierPoint;
use super::types::MeanVarianceInputs;
use crate::error::PortfolioError;
use crate::error::Result;

pub const DEFAULT_FRONTIER_POINTS: usize = 100;

/// Target-return grid spanning the smallest to the largest expected return.
pub fn target_return_grid(inputs: &MeanVarianceInputs, num_points: usize) -> Vec<f64> {
  let mean = inputs.mean();
  Array1::linspace(mean.min(), mean.max(), num_points).to_vec()
}

/// Minimum-volatility portfolio for each target return on the grid.
pub fn build_frontier(
  inputs: &MeanVarianceInputs,
  num_points: usize,
  options: &SolverOptions,
) -> Result<Frontier> {
  if num_points == 0 {
    return Err(PortfolioError::invalid(
      "frontier_points",
      "at least one grid point is required",
    ));
  }

  let grid = target_return_grid(inputs, num_points);
  let solved = grid
    .par_iter()
    .enumerate()
    .map(|(idx, &target)| {
      solve_min_volatility(inputs, Some(target), options).map(|a| (idx, target, a))
    })
    .collect::<Result<Vec<_>>>()?;

  let mut frontier = Frontier {
    points: Vec::with_capacity(solved.len()),
    gaps: Vec::new(),
    grid_len: grid.len(),
  };

  for (grid_index, target, allocation) in solved {
    if !allocation.converged {
      warn!(target, grid_index, "frontier point did not converge, leaving a gap");
      frontier.gaps.push(target);
      continue;
    }

    let volatility = portfolio_volatility(&allocation.weights, inputs.cov())?;
    frontier.points.push(FrontierPoint {
      grid_index,
      expected_return: target,
      volatility,
      weights: allocation.weights,
    });
  }

  info!(
    solved = frontier.points.len(),
    dropped = frontier.gaps.len(),
    "efficient frontier built"
  );
  Ok(frontier)
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;

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
  fn grid_spans_min_to_max_return() {
    let grid = target_return_grid(&three_assets(), 5);

    assert_eq!(grid.len(), 5);
    assert!((grid[0] - 0.08).abs() < 1e-15);
    assert!((grid[4] - 0.12).abs() < 1e-15);
    assert!((grid[2] - 0.10).abs() < 1e-12);
  }

  #[test]
  fn solved_points_and_gaps_cover_the_grid() {
    let frontier = build_frontier(&three_assets(), 30, &SolverOptions::default()).unwrap();

    assert_eq!(frontier.grid_len, 30);
    assert_eq!(frontier.points.len() + frontier.gaps.len(), 30);
    assert!(frontier.points.len() >= 15);
    assert!(frontier
      .points
      .windows(2)
      .all(|w| w[0].grid_index < w[1].grid_index));
  }

  #[test]
  #[traced_test]
  fn unconverged_targets_become_gaps() {
    let options = SolverOptions {
      max_iters: 1,
      max_outer_iters: 1,
      ..SolverOptions::default()
    };
    let frontier = build_frontier(&three_assets(), 20, &options).unwrap();
    let grid = target_return_grid(&three_assets(), 20);

    assert!(frontier.points.is_empty());
    assert!(frontier.segments().is_empty());
    assert_eq!(frontier.grid_len, 20);
    assert_eq!(frontier.gaps, grid);
    assert!(logs_contain("frontier point did not converge"));
  }

  #[test]
  fn volatility_is_non_decreasing_above_minimum_volatility() {
    let frontier = build_frontier(&three_assets(), 40, &SolverOptions::default()).unwrap();
    let min_point = frontier.min_volatility_point().unwrap();

    let upper: Vec<_> = frontier
      .points
      .iter()
      .filter(|p| p.expected_return >= min_point.expected_return)
      .collect();
    assert!(upper.len() > 1);
    for pair in upper.windows(2) {
      assert!(
        pair[1].volatility >= pair[0].volatility - 1e-6,
        "vol fell from {} to {} between returns {} and {}",
        pair[0].volatility,
        pair[1].volatility,
        pair[0].expected_return,
        pair[1].expected_return,
      );
    }
  }

  #[test]
  fn frontier_weights_hit_their_targets() {
    let inputs = three_assets();
    let frontier = build_frontier(&inputs, 10, &SolverOptions::default()).unwrap();

    for p in &frontier.points {
      let ret = p.weights.as_array().dot(inputs.mean().as_array());
      assert!((ret - p.expected_return).abs() <= 1e-6);
      assert!((p.weights.sum() - 1.0).abs() <= 1e-6);
    }
  }

  #[test]
  fn zero_points_is_rejected() {
    let err = build_frontier(&three_assets(), 0, &SolverOptions::default()).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidInput { .. }));
  }

  #[test]
  fn single_asset_frontier_collapses_to_one_volatility() {
    let inputs = MeanVarianceInputs::from_vecs(vec![0.07], vec![vec![0.04]]).unwrap();
    let frontier = build_frontier(&inputs, 3, &SolverOptions::default()).unwrap();

    assert_eq!(frontier.points.len(), 3);
    assert!(frontier
      .points
      .iter()
      .all(|p| (p.volatility - 0.2).abs() < 1e-12));
  }
}
