//! # Report
//!
//! CSV exports and the console summary table.

use std::path::Path;

use prettytable::format;
use prettytable::row;
use prettytable::Table;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::portfolio::AnalysisReport;
use crate::portfolio::Frontier;
use crate::portfolio::SensitivityCurve;
use crate::portfolio::Weights;

/// `Ticker,Weight` rows followed by a `Sharpe Ratio,<value>` row.
pub fn write_summary_csv(
  path: impl AsRef<Path>,
  assets: &[String],
  weights: &Weights,
  sharpe: f64,
) -> Result<()> {
  if assets.len() != weights.len() {
    return Err(PortfolioError::DimensionMismatch {
      context: "summary rows".into(),
      expected: assets.len(),
      got: weights.len(),
    });
  }

  let mut wtr = csv::Writer::from_path(path)?;
  wtr.write_record(["Ticker", "Weight"])?;
  for (ticker, w) in assets.iter().zip(weights.as_slice()) {
    wtr.write_record([ticker.as_str(), &w.to_string()])?;
  }
  wtr.write_record(["Sharpe Ratio", &sharpe.to_string()])?;
  wtr.flush()?;
  Ok(())
}

/// One row per solved frontier point, weights in asset order.
pub fn write_frontier_csv(
  path: impl AsRef<Path>,
  assets: &[String],
  frontier: &Frontier,
) -> Result<()> {
  let mut wtr = csv::Writer::from_path(path)?;

  let mut header = vec![
    "grid_index".to_string(),
    "expected_return".to_string(),
    "volatility".to_string(),
  ];
  header.extend(assets.iter().cloned());
  wtr.write_record(&header)?;

  for p in &frontier.points {
    let mut record = vec![
      p.grid_index.to_string(),
      p.expected_return.to_string(),
      p.volatility.to_string(),
    ];
    record.extend(p.weights.as_slice().iter().map(f64::to_string));
    wtr.write_record(&record)?;
  }
  wtr.flush()?;
  Ok(())
}

/// `parameter,sharpe,converged`; an undefined Sharpe ratio is left empty.
pub fn write_sensitivity_csv(
  path: impl AsRef<Path>,
  parameter: &str,
  curve: &SensitivityCurve,
) -> Result<()> {
  let mut wtr = csv::Writer::from_path(path)?;
  wtr.write_record([parameter, "sharpe", "converged"])?;
  for p in &curve.points {
    wtr.write_record([
      p.parameter.to_string(),
      p.sharpe.map(|s| s.to_string()).unwrap_or_default(),
      p.converged.to_string(),
    ])?;
  }
  wtr.flush()?;
  Ok(())
}

/// Optimal weights as percentages, then return, volatility and the Sharpe
/// ratios of the optimal and equal-weight portfolios.
pub fn summary_table(report: &AnalysisReport) -> Table {
  let mut table = Table::new();
  table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
  table.set_titles(row!["Ticker", "Weight"]);

  let weights = report.optimal.allocation.weights.as_slice();
  for (ticker, w) in report.assets.iter().zip(weights) {
    table.add_row(row![ticker, r->format!("{:.2}%", w * 100.0)]);
  }

  let perf = &report.optimal.performance;
  table.add_row(row![
    "Expected Annual Return",
    r->format!("{:.2}%", perf.expected_return * 100.0)
  ]);
  table.add_row(row![
    "Expected Volatility",
    r->format!("{:.2}%", perf.volatility * 100.0)
  ]);
  table.add_row(row!["Sharpe Ratio", r->format!("{:.2}", perf.sharpe)]);
  table.add_row(row![
    "Equal-Weight Sharpe",
    r->format!("{:.2}", report.equal_weight.sharpe)
  ]);
  table
}

/// Print [`summary_table`] to stdout, noting any frontier gaps.
pub fn print_summary(report: &AnalysisReport) {
  println!("\n========= OPTIMAL PORTFOLIO SUMMARY =========");
  summary_table(report).printstd();
  if !report.frontier.gaps.is_empty() {
    println!(
      "Frontier: {} of {} target returns did not converge and are shown as gaps",
      report.frontier.gaps.len(),
      report.frontier.grid_len
    );
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;
  use crate::portfolio::SensitivityPoint;

  #[test]
  fn summary_csv_has_weights_then_sharpe_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("portfolio_summary.csv");
    let assets = vec!["AAPL".to_string(), "MSFT".to_string()];
    let weights = Weights::try_from_vec(vec![0.25, 0.75]).unwrap();

    write_summary_csv(&path, &assets, &weights, 1.5).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
      lines,
      vec!["Ticker,Weight", "AAPL,0.25", "MSFT,0.75", "Sharpe Ratio,1.5"]
    );
  }

  #[test]
  fn summary_csv_rejects_mismatched_rows() {
    let dir = tempdir().unwrap();
    let weights = Weights::equal(3).unwrap();
    let err =
      write_summary_csv(dir.path().join("s.csv"), &["A".into()], &weights, 1.0).unwrap_err();
    assert!(matches!(err, PortfolioError::DimensionMismatch { .. }));
  }

  #[test]
  fn sensitivity_csv_leaves_undefined_sharpe_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rf.csv");
    let curve = SensitivityCurve {
      points: vec![
        SensitivityPoint {
          parameter: 0.0,
          sharpe: Some(0.5),
          converged: true,
        },
        SensitivityPoint {
          parameter: 0.01,
          sharpe: None,
          converged: true,
        },
      ],
    };

    write_sensitivity_csv(&path, "risk_free_rate", &curve).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
      lines,
      vec!["risk_free_rate,sharpe,converged", "0,0.5,true", "0.01,,true"]
    );
  }

  #[test]
  fn unwritable_path_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("out.csv");
    let result = write_frontier_csv(&path, &[], &Frontier::default());
    assert!(result.is_err());
  }
}
