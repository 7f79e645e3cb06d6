//! # Portfolio Optimizers
//!
//! $$
//! \max_{\mathbf{w}\in\Delta^{N-1}} \frac{\mathbf{w}^\top\mu-r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! \qquad
//! \min_{\mathbf{w}\in\Delta^{N-1},\ \mathbf{w}^\top\mu=r^\*} \sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}
//! $$
//!
//! Long-only, fully invested solvers. Weights are parameterized as
//! `w = softmax(x)`, which keeps `sum(w) = 1` and `0 <= w_i <= 1` exact, and
//! the smooth objective is minimized over `x` with L-BFGS. A target-return
//! equality is enforced with an augmented Lagrangian outer loop.
//!
//! Every solve starts from the uniform allocation `1/N` (`x = 0`). On
//! near-degenerate covariance structures a local solver started there can
//! settle in a different local optimum than one started elsewhere.

use std::cell::RefCell;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::State;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use tracing::debug;
use tracing::warn;

use super::performance::dot;
use super::performance::quad_form;
use super::performance::VOLATILITY_FLOOR;
use super::types::Allocation;
use super::types::CovarianceMatrix;
use super::types::MeanVarianceInputs;
use super::types::Weights;
use crate::error::PortfolioError;
use crate::error::Result;

/// Cost returned where the objective is undefined (zero volatility).
const UNDEFINED_COST: f64 = 1e10;

/// Upper bound on the augmented Lagrangian penalty.
const MAX_PENALTY: f64 = 1e8;

/// Tuning knobs shared by every constrained solve.
#[derive(Clone, Debug)]
pub struct SolverOptions {
  /// Iteration cap for each L-BFGS run.
  pub max_iters: u64,
  /// L-BFGS history length.
  pub lbfgs_memory: usize,
  /// L-BFGS gradient-norm stopping tolerance.
  pub grad_tolerance: f64,
  /// Max-norm of the reparameterized gradient accepted as stationary.
  pub stationarity_tolerance: f64,
  /// Accepted violation of equality constraints.
  pub constraint_tolerance: f64,
  /// Augmented Lagrangian outer iterations.
  pub max_outer_iters: usize,
  /// Starting augmented Lagrangian penalty.
  pub initial_penalty: f64,
}

impl Default for SolverOptions {
  fn default() -> Self {
    Self {
      max_iters: 1000,
      lbfgs_memory: 10,
      grad_tolerance: 1e-10,
      stationarity_tolerance: 1e-6,
      constraint_tolerance: 1e-6,
      max_outer_iters: 30,
      initial_penalty: 10.0,
    }
  }
}

fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if sum < 1e-15 {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

/// Chain rule through softmax: `dx_k = w_k (g_k - g·w)`.
fn softmax_pullback(w: &[f64], g: &[f64]) -> Vec<f64> {
  let gw = dot(g, w);
  w.iter().zip(g.iter()).map(|(wi, gi)| wi * (gi - gw)).collect()
}

fn max_abs(v: &[f64]) -> f64 {
  v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

/// Smooth objective over simplex weights.
trait SimplexObjective {
  fn value(&self, w: &[f64]) -> f64;
  fn gradient(&self, w: &[f64]) -> Vec<f64>;
}

/// `-(w·mu - rf) / sqrt(w'Σw)`
struct NegativeSharpe<'a> {
  mu: &'a [f64],
  cov: &'a CovarianceMatrix,
  risk_free: f64,
}

impl SimplexObjective for NegativeSharpe<'_> {
  fn value(&self, w: &[f64]) -> f64 {
    let vol = quad_form(self.cov, w).max(0.0).sqrt();
    if vol <= VOLATILITY_FLOOR {
      return UNDEFINED_COST;
    }
    -(dot(w, self.mu) - self.risk_free) / vol
  }

  fn gradient(&self, w: &[f64]) -> Vec<f64> {
    let sigma_w = self.cov.as_array().dot(&ndarray::ArrayView1::from(w));
    let var = dot(w, sigma_w.as_slice().unwrap_or(&[])).max(0.0);
    let vol = var.sqrt();
    if vol <= VOLATILITY_FLOOR {
      return vec![0.0; w.len()];
    }
    let excess = dot(w, self.mu) - self.risk_free;
    let vol3 = vol * var;
    self
      .mu
      .iter()
      .zip(sigma_w.iter())
      .map(|(m, sw)| -(m / vol - excess * sw / vol3))
      .collect()
  }
}

/// Target-return equality `w·mu - r* = 0` with its current multiplier and penalty.
#[derive(Clone, Copy, Debug)]
struct ReturnTarget {
  target: f64,
  multiplier: f64,
  penalty: f64,
}

/// `sqrt(w'Σw) + λ h + ρ/2 h²` with `h = w·mu - r*`.
struct PenalizedVolatility<'a> {
  mu: &'a [f64],
  cov: &'a CovarianceMatrix,
  target: Option<ReturnTarget>,
}

impl SimplexObjective for PenalizedVolatility<'_> {
  fn value(&self, w: &[f64]) -> f64 {
    let vol = quad_form(self.cov, w).max(0.0).sqrt();
    match self.target {
      Some(t) => {
        let h = dot(w, self.mu) - t.target;
        vol + t.multiplier * h + 0.5 * t.penalty * h * h
      }
      None => vol,
    }
  }

  fn gradient(&self, w: &[f64]) -> Vec<f64> {
    let sigma_w = self.cov.as_array().dot(&ndarray::ArrayView1::from(w));
    let vol = dot(w, sigma_w.as_slice().unwrap_or(&[])).max(0.0).sqrt();
    let coef = self.target.map_or(0.0, |t| {
      let h = dot(w, self.mu) - t.target;
      t.multiplier + t.penalty * h
    });

    sigma_w
      .iter()
      .zip(self.mu.iter())
      .map(|(sw, m)| {
        let dvol = if vol > VOLATILITY_FLOOR { sw / vol } else { 0.0 };
        dvol + coef * m
      })
      .collect()
  }
}

/// Lowest-cost parameters seen during a run, kept outside the executor so they
/// survive a failed line search.
#[derive(Debug)]
struct BestPoint {
  cost: f64,
  x: Vec<f64>,
  evaluations: u64,
}

struct SoftmaxProblem<'a, O> {
  objective: &'a O,
  best: &'a RefCell<BestPoint>,
}

impl<O: SimplexObjective> CostFunction for SoftmaxProblem<'_, O> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let c = self.objective.value(&softmax(x));
    let c = if c.is_finite() { c } else { UNDEFINED_COST };

    let mut best = self.best.borrow_mut();
    best.evaluations += 1;
    if c < best.cost {
      best.cost = c;
      best.x.clone_from(x);
    }
    Ok(c)
  }
}

impl<O: SimplexObjective> Gradient for SoftmaxProblem<'_, O> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
    let w = softmax(x);
    Ok(softmax_pullback(&w, &self.objective.gradient(&w)))
  }
}

/// Result of one L-BFGS run over the softmax parameters.
struct InnerSolve {
  x: Vec<f64>,
  weights: Vec<f64>,
  stationarity: f64,
  evaluations: u64,
}

fn minimize_on_simplex<O: SimplexObjective>(
  objective: &O,
  x0: Vec<f64>,
  options: &SolverOptions,
) -> Result<InnerSolve> {
  let best = RefCell::new(BestPoint {
    cost: f64::INFINITY,
    x: x0.clone(),
    evaluations: 0,
  });

  let solver_error =
    |e: argmin::core::Error| PortfolioError::invalid("solver options", e.to_string());
  let linesearch = MoreThuenteLineSearch::new()
    .with_c(1e-4, 0.9)
    .map_err(solver_error)?;
  let solver = LBFGS::new(linesearch, options.lbfgs_memory)
    .with_tolerance_grad(options.grad_tolerance)
    .map_err(solver_error)?;

  let problem = SoftmaxProblem {
    objective,
    best: &best,
  };

  let run = Executor::new(problem, solver)
    .configure(|state| state.param(x0).max_iters(options.max_iters))
    .run();

  let x = match run {
    Ok(res) => {
      let state = res.state();
      debug!(
        iters = state.get_iter(),
        cost = state.get_best_cost(),
        termination = ?state.get_termination_status(),
        "l-bfgs finished"
      );
      let tracked = best.borrow();
      match state.get_best_param() {
        Some(p) if state.get_best_cost() <= tracked.cost => p.clone(),
        _ => tracked.x.clone(),
      }
    }
    Err(e) => {
      debug!(error = %e, "l-bfgs stopped early, using best point seen");
      best.borrow().x.clone()
    }
  };

  let weights = softmax(&x);
  let stationarity = max_abs(&softmax_pullback(&weights, &objective.gradient(&weights)));
  let evaluations = best.borrow().evaluations;

  Ok(InnerSolve {
    x,
    weights,
    stationarity,
    evaluations,
  })
}

fn check_risk_free(risk_free: f64) -> Result<()> {
  if risk_free.is_finite() {
    Ok(())
  } else {
    Err(PortfolioError::invalid("risk_free_rate", "must be finite"))
  }
}

fn single_asset() -> Allocation {
  Allocation {
    weights: Weights::from_simplex(vec![1.0]),
    converged: true,
    evaluations: 0,
  }
}

/// Maximum-Sharpe long-only portfolio.
///
/// Returns `converged = false` instead of an error when the stopping criteria
/// are not met; callers decide whether to trust the weights.
pub fn solve_max_sharpe(
  inputs: &MeanVarianceInputs,
  risk_free: f64,
  options: &SolverOptions,
) -> Result<Allocation> {
  check_risk_free(risk_free)?;
  let n = inputs.n_assets();
  if n == 1 {
    return Ok(single_asset());
  }

  let mu = inputs.mean().as_array().to_vec();
  let objective = NegativeSharpe {
    mu: &mu,
    cov: inputs.cov(),
    risk_free,
  };

  let inner = minimize_on_simplex(&objective, vec![0.0; n], options)?;
  let converged = inner.stationarity <= options.stationarity_tolerance;
  if !converged {
    warn!(
      risk_free,
      stationarity = inner.stationarity,
      "maximum Sharpe solve did not converge"
    );
  }

  Ok(Allocation {
    weights: Weights::from_simplex(inner.weights),
    converged,
    evaluations: inner.evaluations,
  })
}

/// Minimum-volatility long-only portfolio, optionally at a fixed expected
/// return. `None` solves for the global minimum-volatility portfolio.
pub fn solve_min_volatility(
  inputs: &MeanVarianceInputs,
  target_return: Option<f64>,
  options: &SolverOptions,
) -> Result<Allocation> {
  let n = inputs.n_assets();
  let mean = inputs.mean();

  if let Some(target) = target_return {
    let tol = options.constraint_tolerance;
    if !target.is_finite() || target < mean.min() - tol || target > mean.max() + tol {
      return Err(PortfolioError::invalid(
        "target_return",
        format!(
          "{target} is outside the attainable range [{}, {}]",
          mean.min(),
          mean.max()
        ),
      ));
    }
  }

  if n == 1 {
    return Ok(single_asset());
  }

  let mu = mean.as_array().to_vec();
  let Some(target) = target_return else {
    let objective = PenalizedVolatility {
      mu: &mu,
      cov: inputs.cov(),
      target: None,
    };
    let inner = minimize_on_simplex(&objective, vec![0.0; n], options)?;
    let converged = inner.stationarity <= options.stationarity_tolerance;
    if !converged {
      warn!(
        stationarity = inner.stationarity,
        "minimum volatility solve did not converge"
      );
    }
    return Ok(Allocation {
      weights: Weights::from_simplex(inner.weights),
      converged,
      evaluations: inner.evaluations,
    });
  };

  let mut constraint = ReturnTarget {
    target,
    multiplier: 0.0,
    penalty: options.initial_penalty,
  };
  let mut x = vec![0.0; n];
  let mut weights = vec![1.0 / n as f64; n];
  let mut evaluations = 0;
  let mut last_violation = f64::INFINITY;
  let mut converged = false;

  for outer in 0..options.max_outer_iters {
    let objective = PenalizedVolatility {
      mu: &mu,
      cov: inputs.cov(),
      target: Some(constraint),
    };
    let inner = minimize_on_simplex(&objective, x, options)?;
    evaluations += inner.evaluations;
    x = inner.x;
    weights = inner.weights;

    let violation = dot(&weights, &mu) - target;
    if violation.abs() <= options.constraint_tolerance
      && inner.stationarity <= options.stationarity_tolerance
    {
      converged = true;
      debug!(target, outer, evaluations, "target-return solve converged");
      break;
    }

    constraint.multiplier += constraint.penalty * violation;
    if violation.abs() > 0.25 * last_violation {
      constraint.penalty = (constraint.penalty * 10.0).min(MAX_PENALTY);
    }
    last_violation = violation.abs();
  }

  Ok(Allocation {
    weights: Weights::from_simplex(weights),
    converged,
    evaluations,
  })
}
