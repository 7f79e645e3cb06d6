//! # frontier-rs
//!
//! $$
//! \max_{\mathbf{w}\ge 0,\ \mathbf{1}^\top\mathbf{w}=1}\ \frac{\mathbf{w}^\top\mu-r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Long-only maximum-Sharpe allocation from annualized expected returns and
//! covariance, with the efficient frontier and Sharpe sensitivity sweeps over
//! the risk-free rate and covariance shrinkage.
//!
//! ```ignore
//! use frontier_rs::portfolio::AnalysisConfig;
//! use frontier_rs::portfolio::MeanVarianceInputs;
//! use frontier_rs::portfolio::PortfolioEngine;
//!
//! let inputs = MeanVarianceInputs::from_vecs(
//!   vec![0.10, 0.12, 0.08],
//!   vec![
//!     vec![0.04, 0.006, 0.004],
//!     vec![0.006, 0.09, 0.008],
//!     vec![0.004, 0.008, 0.025],
//!   ],
//! )?;
//! let assets = vec!["A".to_string(), "B".to_string(), "C".to_string()];
//! let report = PortfolioEngine::new(AnalysisConfig::default()).run(&assets, &inputs)?;
//! ```

pub mod error;
pub mod portfolio;
pub mod report;
pub mod visualization;

pub use error::PortfolioError;
pub use error::Result;
