//! # Portfolio Engine
//!
//! $$
//! (\mu,\Sigma)\mapsto\bigl(\mathbf{w}^\*,\ \mathbf{w}_{\text{eq}},\ \mathbf{w}_{\min},\
//! \sigma^\*(r^\*),\ \text{SR}^\*(r_f),\ \text{SR}^\*(\alpha)\bigr)
//! $$
//!
//! Runs the full analysis for one set of annualized inputs.

use tracing::info;

use super::frontier::build_frontier;
use super::frontier::DEFAULT_FRONTIER_POINTS;
use super::optimizers::solve_max_sharpe;
use super::optimizers::solve_min_volatility;
use super::optimizers::SolverOptions;
use super::performance::evaluate;
use super::sensitivity::default_risk_free_grid;
use super::sensitivity::default_shrinkage_grid;
use super::sensitivity::sweep_risk_free_rate;
use super::sensitivity::sweep_shrinkage;
use super::types::Allocation;
use super::types::Frontier;
use super::types::MeanVarianceInputs;
use super::types::Performance;
use super::types::PortfolioResult;
use super::types::SensitivityCurve;
use super::types::Weights;
use crate::error::PortfolioError;
use crate::error::Result;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
  /// Risk-free rate for the optimal portfolio and the shrinkage sweep.
  pub risk_free_rate: f64,
  /// Number of target returns on the frontier grid.
  pub frontier_points: usize,
  pub risk_free_grid: Vec<f64>,
  pub shrinkage_grid: Vec<f64>,
  pub solver: SolverOptions,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: 0.02,
      frontier_points: DEFAULT_FRONTIER_POINTS,
      risk_free_grid: default_risk_free_grid(),
      shrinkage_grid: default_shrinkage_grid(),
      solver: SolverOptions::default(),
    }
  }
}

/// Everything produced by one [`PortfolioEngine::run`].
#[derive(Clone, Debug)]
pub struct AnalysisReport {
  pub assets: Vec<String>,
  pub risk_free_rate: f64,
  /// Maximum-Sharpe portfolio.
  pub optimal: PortfolioResult,
  /// `1/N` benchmark.
  pub equal_weight: Performance,
  /// Global minimum-volatility portfolio.
  pub min_variance: PortfolioResult,
  pub frontier: Frontier,
  pub risk_free_sensitivity: SensitivityCurve,
  pub shrinkage_sensitivity: SensitivityCurve,
}

#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: AnalysisConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: AnalysisConfig) -> Self {
    Self { config }
  }

  /// Configuration used for every stage of [`PortfolioEngine::run`].
  pub fn config(&self) -> &AnalysisConfig {
    &self.config
  }

  /// Maximum-Sharpe portfolio with its performance. Fails if the solve did not
  /// converge.
  pub fn optimal_portfolio(&self, inputs: &MeanVarianceInputs) -> Result<PortfolioResult> {
    let rf = self.config.risk_free_rate;
    let allocation = solve_max_sharpe(inputs, rf, &self.config.solver)?;
    if !allocation.converged {
      return Err(PortfolioError::SolverNonConvergence {
        stage: "maximum Sharpe portfolio".into(),
        evaluations: allocation.evaluations,
      });
    }
    let performance = evaluate(&allocation.weights, inputs.mean(), inputs.cov(), rf)?;
    Ok(PortfolioResult {
      allocation,
      performance,
    })
  }

  /// Global minimum-volatility portfolio. Its Sharpe ratio is evaluated at the
  /// configured risk-free rate.
  pub fn min_variance_portfolio(&self, inputs: &MeanVarianceInputs) -> Result<PortfolioResult> {
    let allocation = solve_min_volatility(inputs, None, &self.config.solver)?;
    if !allocation.converged {
      return Err(PortfolioError::SolverNonConvergence {
        stage: "minimum variance portfolio".into(),
        evaluations: allocation.evaluations,
      });
    }
    let performance = evaluate(
      &allocation.weights,
      inputs.mean(),
      inputs.cov(),
      self.config.risk_free_rate,
    )?;
    Ok(PortfolioResult {
      allocation,
      performance,
    })
  }

  pub fn equal_weight(&self, inputs: &MeanVarianceInputs) -> Result<PortfolioResult> {
    let weights = Weights::equal(inputs.n_assets())?;
    let performance = evaluate(
      &weights,
      inputs.mean(),
      inputs.cov(),
      self.config.risk_free_rate,
    )?;
    Ok(PortfolioResult {
      allocation: Allocation {
        weights,
        converged: true,
        evaluations: 0,
      },
      performance,
    })
  }

  /// Full analysis: optimal portfolio, benchmarks, frontier and both sweeps.
  pub fn run(&self, assets: &[String], inputs: &MeanVarianceInputs) -> Result<AnalysisReport> {
    if assets.len() != inputs.n_assets() {
      return Err(PortfolioError::DimensionMismatch {
        context: "asset labels vs expected returns".into(),
        expected: inputs.n_assets(),
        got: assets.len(),
      });
    }
    let cfg = &self.config;

    let optimal = self.optimal_portfolio(inputs)?;
    info!(
      sharpe = optimal.performance.sharpe,
      expected_return = optimal.performance.expected_return,
      volatility = optimal.performance.volatility,
      "optimal portfolio solved"
    );

    let equal_weight = self.equal_weight(inputs)?.performance;
    let min_variance = self.min_variance_portfolio(inputs)?;
    info!(
      equal_weight_sharpe = equal_weight.sharpe,
      min_volatility = min_variance.performance.volatility,
      "benchmarks evaluated"
    );

    let frontier = build_frontier(inputs, cfg.frontier_points, &cfg.solver)?;

    let risk_free_sensitivity = sweep_risk_free_rate(inputs, &cfg.risk_free_grid, &cfg.solver)?;
    let shrinkage_sensitivity = sweep_shrinkage(
      inputs,
      cfg.risk_free_rate,
      &cfg.shrinkage_grid,
      &cfg.solver,
    )?;
    info!(
      risk_free_points = risk_free_sensitivity.len(),
      shrinkage_points = shrinkage_sensitivity.len(),
      "sensitivity sweeps finished"
    );

    Ok(AnalysisReport {
      assets: assets.to_vec(),
      risk_free_rate: cfg.risk_free_rate,
      optimal,
      equal_weight,
      min_variance,
      frontier,
      risk_free_sensitivity,
      shrinkage_sensitivity,
    })
  }
}
