//! # Portfolio
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}\in\Delta^{N-1}}\frac{\mathbf{w}^\top\mu-r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Long-only mean-variance allocation, the efficient frontier and Sharpe
//! sensitivity sweeps.

pub mod data;
pub mod engine;
pub mod frontier;
pub mod optimizers;
pub mod performance;
pub mod sensitivity;
pub mod types;

pub use data::PriceTable;
pub use data::ReturnsTable;
pub use data::DEFAULT_PERIODS_PER_YEAR;
pub use engine::AnalysisConfig;
pub use engine::AnalysisReport;
pub use engine::PortfolioEngine;
pub use frontier::build_frontier;
pub use frontier::target_return_grid;
pub use frontier::DEFAULT_FRONTIER_POINTS;
pub use optimizers::solve_max_sharpe;
pub use optimizers::solve_min_volatility;
pub use optimizers::SolverOptions;
pub use performance::evaluate;
pub use performance::portfolio_variance;
pub use performance::portfolio_volatility;
pub use performance::sharpe_ratio;
pub use sensitivity::default_risk_free_grid;
pub use sensitivity::default_shrinkage_grid;
pub use sensitivity::shrink_covariance;
pub use sensitivity::sweep_risk_free_rate;
pub use sensitivity::sweep_shrinkage;
pub use types::Allocation;
pub use types::CovarianceMatrix;
pub use types::ExpectedReturns;
pub use types::Frontier;
pub use types::FrontierPoint;
pub use types::MeanVarianceInputs;
pub use types::Performance;
pub use types::PortfolioResult;
pub use types::SensitivityCurve;
pub use types::SensitivityPoint;
pub use types::Weights;
