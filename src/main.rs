use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use frontier_rs::portfolio::AnalysisConfig;
use frontier_rs::portfolio::MeanVarianceInputs;
use frontier_rs::portfolio::PortfolioEngine;
use frontier_rs::portfolio::PriceTable;
use frontier_rs::portfolio::DEFAULT_FRONTIER_POINTS;
use frontier_rs::portfolio::DEFAULT_PERIODS_PER_YEAR;
use frontier_rs::report;
use frontier_rs::visualization;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "Maximum-Sharpe long-only portfolio with efficient frontier and sensitivity analysis",
  after_help = "EXAMPLES:
    # Built-in three-asset inputs
    frontier --demo

    # Cached daily closes, four tickers, 3% risk-free rate
    frontier --prices data_cache/cached_prices.csv --tickers AAPL,MSFT,GOOGL,AMZN --risk-free-rate 0.03"
)]
struct Args {
  /// Price CSV: first column a date, one close-price column per ticker
  #[arg(long, default_value = "data_cache/cached_prices.csv")]
  prices: PathBuf,

  /// Comma-separated tickers to use (default: every column in the CSV)
  #[arg(long, value_delimiter = ',')]
  tickers: Option<Vec<String>>,

  /// Annual risk-free rate
  #[arg(long, default_value_t = 0.02)]
  risk_free_rate: f64,

  /// Target-return grid size for the efficient frontier
  #[arg(long, default_value_t = DEFAULT_FRONTIER_POINTS)]
  frontier_points: usize,

  /// Return observations per year used for annualization
  #[arg(long, default_value_t = DEFAULT_PERIODS_PER_YEAR)]
  periods_per_year: f64,

  /// Directory for the summary CSVs and HTML charts
  #[arg(long, default_value = "outputs")]
  output_dir: PathBuf,

  /// Skip writing HTML charts
  #[arg(long)]
  no_plots: bool,

  /// Use built-in annualized inputs instead of a price file
  #[arg(long)]
  demo: bool,
}

fn demo_inputs() -> anyhow::Result<(Vec<String>, MeanVarianceInputs)> {
  let inputs = MeanVarianceInputs::from_vecs(
    vec![0.10, 0.12, 0.08],
    vec![
      vec![0.04, 0.006, 0.004],
      vec![0.006, 0.09, 0.008],
      vec![0.004, 0.008, 0.025],
    ],
  )?;
  let assets = ["ASSET_A", "ASSET_B", "ASSET_C"].map(String::from).to_vec();
  Ok((assets, inputs))
}

fn price_inputs(args: &Args) -> anyhow::Result<(Vec<String>, MeanVarianceInputs)> {
  let table = PriceTable::from_csv(&args.prices)
    .with_context(|| format!("loading prices from {}", args.prices.display()))?;
  let table = match &args.tickers {
    Some(tickers) => table.select(tickers).context("selecting tickers")?,
    None => table,
  };
  info!(tickers = ?table.tickers, rows = table.n_rows(), "data loaded");

  let inputs = table
    .simple_returns()
    .and_then(|r| r.annualize(args.periods_per_year))
    .context("estimating annualized mean and covariance")?;
  Ok((table.tickers, inputs))
}

fn main() -> anyhow::Result<()> {
  let env_filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("frontier_rs=info,frontier=info"));
  tracing_subscriber::fmt().with_env_filter(env_filter).init();
  let args = Args::parse();

  let (assets, inputs) = if args.demo {
    demo_inputs()?
  } else {
    price_inputs(&args)?
  };

  let config = AnalysisConfig {
    risk_free_rate: args.risk_free_rate,
    frontier_points: args.frontier_points,
    ..AnalysisConfig::default()
  };
  let report = PortfolioEngine::new(config)
    .run(&assets, &inputs)
    .context("portfolio analysis")?;

  report::print_summary(&report);

  fs::create_dir_all(&args.output_dir)
    .with_context(|| format!("creating {}", args.output_dir.display()))?;
  let out = &args.output_dir;
  report::write_summary_csv(
    out.join("portfolio_summary.csv"),
    &report.assets,
    &report.optimal.allocation.weights,
    report.optimal.performance.sharpe,
  )
  .context("writing portfolio summary")?;
  report::write_frontier_csv(
    out.join("efficient_frontier.csv"),
    &report.assets,
    &report.frontier,
  )
  .context("writing frontier")?;
  report::write_sensitivity_csv(
    out.join("sensitivity_rf.csv"),
    "risk_free_rate",
    &report.risk_free_sensitivity,
  )
  .context("writing risk-free sensitivity")?;
  report::write_sensitivity_csv(
    out.join("sensitivity_shrinkage.csv"),
    "shrinkage",
    &report.shrinkage_sensitivity,
  )
  .context("writing shrinkage sensitivity")?;

  if args.no_plots {
    info!("plots skipped");
  } else if let Err(e) = visualization::write_all(&report, out) {
    warn!(error = %e, "plotting skipped");
  }

  println!("\nResults saved to '{}'.", out.display());
  Ok(())
}
