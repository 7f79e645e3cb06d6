//! # Visualization
//!
//! $$
//! (\sigma_p,\mu_p),\quad \mathbf{w}^\*,\quad \text{SR}^\*(r_f),\quad \text{SR}^\*(\alpha)
//! \mapsto \text{interactive HTML charts}
//! $$
//!
//! Plotly charts for an [`AnalysisReport`]. Dropped frontier targets and
//! flagged sensitivity points break the plotted line instead of being
//! interpolated across.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use plotly::common::Line;
use plotly::common::Marker;
use plotly::common::MarkerSymbol;
use plotly::common::Mode;
use plotly::common::Title;
use plotly::layout::Axis;
use plotly::Bar;
use plotly::Layout;
use plotly::Plot;
use plotly::Scatter;
use tracing::info;

use crate::error::Result;
use crate::portfolio::types::contiguous_runs;
use crate::portfolio::AnalysisReport;
use crate::portfolio::Frontier;
use crate::portfolio::Performance;
use crate::portfolio::SensitivityCurve;
use crate::portfolio::Weights;

pub const FRONTIER_HTML: &str = "efficient_frontier.html";
pub const WEIGHTS_HTML: &str = "optimal_portfolio_weights.html";
pub const RISK_FREE_HTML: &str = "sensitivity_rf.html";
pub const SHRINKAGE_HTML: &str = "sensitivity_shrinkage.html";

/// Frontier as volatility vs. return, one line per contiguous run of solved
/// targets, with the optimal portfolio marked.
pub fn plot_efficient_frontier(frontier: &Frontier, optimal: &Performance) -> Plot {
  let mut plot = Plot::new();

  for (i, segment) in frontier.segments().into_iter().enumerate() {
    let vols: Vec<f64> = segment.iter().map(|p| p.volatility).collect();
    let rets: Vec<f64> = segment.iter().map(|p| p.expected_return).collect();
    let trace = Scatter::new(vols, rets)
      .mode(if segment.len() > 1 {
        Mode::Lines
      } else {
        Mode::Markers
      })
      .name("Efficient Frontier")
      .legend_group("frontier")
      .show_legend(i == 0)
      .line(Line::new().color("#1f77b4").width(2.0));
    plot.add_trace(trace);
  }

  let star = Scatter::new(vec![optimal.volatility], vec![optimal.expected_return])
    .mode(Mode::Markers)
    .name("Optimal Portfolio")
    .marker(
      Marker::new()
        .size(16)
        .symbol(MarkerSymbol::Star)
        .color("#d62728"),
    );
  plot.add_trace(star);

  plot.set_layout(
    Layout::new()
      .title(Title::from("Efficient Frontier"))
      .x_axis(Axis::new().title("Volatility (Risk)"))
      .y_axis(Axis::new().title("Expected Return")),
  );
  plot
}

pub fn plot_weights(assets: &[String], weights: &Weights) -> Plot {
  let mut plot = Plot::new();
  plot.add_trace(Bar::new(assets.to_vec(), weights.to_vec()).name("Weight"));
  plot.set_layout(
    Layout::new()
      .title(Title::from("Optimal Portfolio Allocation"))
      .y_axis(Axis::new().title("Weight").tick_format(".0%")),
  );
  plot
}

/// Optimal Sharpe ratio against the swept parameter. Only converged points
/// with a defined Sharpe ratio are drawn.
pub fn plot_sensitivity(curve: &SensitivityCurve, x_label: &str, title: &str) -> Plot {
  let trusted: Vec<(usize, f64, f64)> = curve
    .points
    .iter()
    .enumerate()
    .filter_map(|(i, p)| p.trusted_sharpe().map(|s| (i, p.parameter, s)))
    .collect();
  let indices: Vec<usize> = trusted.iter().map(|(i, _, _)| *i).collect();

  let mut plot = Plot::new();
  for (k, run) in contiguous_runs(&indices).into_iter().enumerate() {
    let xs: Vec<f64> = trusted[run.clone()].iter().map(|(_, x, _)| *x).collect();
    let ys: Vec<f64> = trusted[run].iter().map(|(_, _, y)| *y).collect();
    plot.add_trace(
      Scatter::new(xs, ys)
        .mode(Mode::LinesMarkers)
        .name("Optimal Sharpe Ratio")
        .legend_group("sharpe")
        .show_legend(k == 0),
    );
  }

  plot.set_layout(
    Layout::new()
      .title(Title::from(title))
      .x_axis(Axis::new().title(x_label))
      .y_axis(Axis::new().title("Sharpe Ratio")),
  );
  plot
}

fn write_plot(plot: &Plot, path: &Path) -> Result<()> {
  fs::write(path, plot.to_html())?;
  Ok(())
}

/// Write every chart of `report` into `dir` and return the paths written.
pub fn write_all(report: &AnalysisReport, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
  let dir = dir.as_ref();
  fs::create_dir_all(dir)?;

  let charts = [
    (
      FRONTIER_HTML,
      plot_efficient_frontier(&report.frontier, &report.optimal.performance),
    ),
    (
      WEIGHTS_HTML,
      plot_weights(&report.assets, &report.optimal.allocation.weights),
    ),
    (
      RISK_FREE_HTML,
      plot_sensitivity(
        &report.risk_free_sensitivity,
        "Risk-Free Rate",
        "Sharpe Ratio Sensitivity to Risk-Free Rate",
      ),
    ),
    (
      SHRINKAGE_HTML,
      plot_sensitivity(
        &report.shrinkage_sensitivity,
        "Shrinkage Intensity",
        "Sharpe Ratio vs Covariance Shrinkage",
      ),
    ),
  ];

  let mut written = Vec::with_capacity(charts.len());
  for (name, plot) in &charts {
    let path = dir.join(name);
    write_plot(plot, &path)?;
    written.push(path);
  }
  info!(dir = %dir.display(), charts = written.len(), "charts written");
  Ok(written)
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;
  use crate::portfolio::AnalysisConfig;
  use crate::portfolio::MeanVarianceInputs;
  use crate::portfolio::PortfolioEngine;
  use crate::portfolio::SensitivityPoint;

  fn report() -> AnalysisReport {
    let inputs = MeanVarianceInputs::from_vecs(
      vec![0.10, 0.12, 0.08],
      vec![
        vec![0.04, 0.006, 0.004],
        vec![0.006, 0.09, 0.008],
        vec![0.004, 0.008, 0.025],
      ],
    )
    .unwrap();
    let config = AnalysisConfig {
      frontier_points: 10,
      ..AnalysisConfig::default()
    };
    PortfolioEngine::new(config)
      .run(&["A".into(), "B".into(), "C".into()], &inputs)
      .unwrap()
  }

  #[test]
  fn write_all_creates_every_chart() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("outputs");

    let written = write_all(&report(), &out).unwrap();

    assert_eq!(written.len(), 4);
    for path in &written {
      let html = fs::read_to_string(path).unwrap();
      assert!(html.contains("plotly"), "{} is not a plotly page", path.display());
    }
    assert!(out.join(FRONTIER_HTML).exists());
    assert!(out.join(SHRINKAGE_HTML).exists());
  }

  #[test]
  fn flagged_points_are_left_out_of_sensitivity_chart() {
    let curve = SensitivityCurve {
      points: vec![
        SensitivityPoint {
          parameter: 0.0,
          sharpe: Some(0.9),
          converged: true,
        },
        SensitivityPoint {
          parameter: 0.5,
          sharpe: Some(123.456),
          converged: false,
        },
        SensitivityPoint {
          parameter: 1.0,
          sharpe: Some(0.7),
          converged: true,
        },
      ],
    };

    let html = plot_sensitivity(&curve, "Shrinkage Intensity", "Sharpe").to_html();
    assert!(!html.contains("123.456"));
    assert!(html.contains("0.9"));
  }
}
