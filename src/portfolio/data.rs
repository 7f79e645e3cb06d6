//! # Price Data
//!
//! $$
//! r_t=\frac{P_t}{P_{t-1}}-1,\qquad
//! \mu=k\,\bar r,\qquad
//! \Sigma=k\,\widehat{\operatorname{Cov}}(r)
//! $$
//!
//! Loads a cached price table (first column a date, one column per ticker),
//! converts it to simple returns and annualizes with `k` periods per year.

use std::path::Path;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use tracing::debug;
use tracing::info;

use super::types::CovarianceMatrix;
use super::types::ExpectedReturns;
use super::types::MeanVarianceInputs;
use crate::error::PortfolioError;
use crate::error::Result;

/// Trading days per year.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Close prices, one row per date and one column per ticker.
#[derive(Clone, Debug)]
pub struct PriceTable {
  pub dates: Vec<String>,
  pub tickers: Vec<String>,
  pub prices: Array2<f64>,
}

fn parse_price(field: Option<&str>) -> Option<f64> {
  let v = field?.trim().parse::<f64>().ok()?;
  (v.is_finite() && v > 0.0).then_some(v)
}

impl PriceTable {
  /// Read a price CSV. Rows with any missing, unparsable or non-positive
  /// price are dropped.
  pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let unavailable = |e: csv::Error| {
      PortfolioError::UpstreamDataUnavailable(format!("{}: {e}", path.display()))
    };

    let mut reader = csv::ReaderBuilder::new()
      .flexible(true)
      .from_path(path)
      .map_err(unavailable)?;

    let tickers: Vec<String> = reader
      .headers()
      .map_err(unavailable)?
      .iter()
      .skip(1)
      .map(|h| h.trim().to_string())
      .collect();
    if tickers.is_empty() {
      return Err(PortfolioError::UpstreamDataUnavailable(format!(
        "{}: no ticker columns",
        path.display()
      )));
    }

    let mut dates = Vec::new();
    let mut flat = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
      let record = record.map_err(unavailable)?;
      let row: Option<Vec<f64>> = (1..=tickers.len())
        .map(|i| parse_price(record.get(i)))
        .collect();
      match row {
        Some(row) => {
          dates.push(record.get(0).unwrap_or_default().to_string());
          flat.extend(row);
        }
        None => dropped += 1,
      }
    }

    if dates.len() < 2 {
      return Err(PortfolioError::UpstreamDataUnavailable(format!(
        "{}: {} valid price rows, at least 2 required",
        path.display(),
        dates.len()
      )));
    }
    if dropped > 0 {
      debug!(dropped, "dropped incomplete price rows");
    }

    let prices = Array2::from_shape_vec((dates.len(), tickers.len()), flat)
      .map_err(|e| PortfolioError::NumericalFailure(e.to_string()))?;
    info!(
      rows = dates.len(),
      assets = tickers.len(),
      "price table loaded"
    );

    Ok(Self {
      dates,
      tickers,
      prices,
    })
  }

  /// Restrict to `tickers`, in the order given.
  pub fn select(&self, tickers: &[String]) -> Result<Self> {
    let columns = tickers
      .iter()
      .map(|t| {
        self.tickers.iter().position(|c| c == t).ok_or_else(|| {
          PortfolioError::UpstreamDataUnavailable(format!("no price column for {t}"))
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      dates: self.dates.clone(),
      tickers: tickers.to_vec(),
      prices: self.prices.select(Axis(1), &columns),
    })
  }

  pub fn n_rows(&self) -> usize {
    self.prices.nrows()
  }

  /// Period-over-period percentage change; one row shorter than the prices.
  pub fn simple_returns(&self) -> Result<ReturnsTable> {
    let n = self.prices.nrows();
    if n < 2 {
      return Err(PortfolioError::UpstreamDataUnavailable(
        "need at least two price rows to form returns".into(),
      ));
    }

    let prev = self.prices.slice(ndarray::s![..n - 1, ..]);
    let next = self.prices.slice(ndarray::s![1.., ..]);
    ReturnsTable::from_array(self.tickers.clone(), &next / &prev - 1.0)
  }
}

/// Periodic returns, one row per period and one column per ticker.
#[derive(Clone, Debug)]
pub struct ReturnsTable {
  pub tickers: Vec<String>,
  pub returns: Array2<f64>,
}

impl ReturnsTable {
  pub fn from_array(tickers: Vec<String>, returns: Array2<f64>) -> Result<Self> {
    if tickers.len() != returns.ncols() {
      return Err(PortfolioError::DimensionMismatch {
        context: "return columns vs tickers".into(),
        expected: tickers.len(),
        got: returns.ncols(),
      });
    }
    if returns.iter().any(|r| !r.is_finite()) {
      return Err(PortfolioError::invalid("returns", "all entries must be finite"));
    }
    Ok(Self { tickers, returns })
  }

  /// Annualized mean and sample covariance (`ddof = 1`).
  pub fn annualize(&self, periods_per_year: f64) -> Result<MeanVarianceInputs> {
    if !(periods_per_year.is_finite() && periods_per_year > 0.0) {
      return Err(PortfolioError::invalid(
        "periods_per_year",
        "must be positive and finite",
      ));
    }
    if self.returns.nrows() < 2 {
      return Err(PortfolioError::UpstreamDataUnavailable(format!(
        "{} return observations, at least 2 required",
        self.returns.nrows()
      )));
    }

    let mean: Array1<f64> = self
      .returns
      .mean_axis(Axis(0))
      .ok_or_else(|| PortfolioError::NumericalFailure("empty returns".into()))?
      * periods_per_year;
    let cov = self
      .returns
      .t()
      .cov(1.)
      .map_err(|e| PortfolioError::NumericalFailure(e.to_string()))?
      * periods_per_year;
    // Sample covariance is symmetric only up to rounding.
    let cov = (&cov + &cov.t()) / 2.0;

    MeanVarianceInputs::new(ExpectedReturns::new(mean)?, CovarianceMatrix::new(cov)?)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use approx::assert_abs_diff_eq;
  use tempfile::NamedTempFile;

  use super::*;

  fn write_csv(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
  }

  #[test]
  fn loads_prices_and_drops_incomplete_rows() {
    let file = write_csv(
      "Date,AAA,BBB\n\
       2024-01-02,100.0,50.0\n\
       2024-01-03,101.0,\n\
       2024-01-04,102.0,51.0\n\
       2024-01-05,n/a,52.0\n\
       2024-01-08,103.0,50.5\n",
    );

    let table = PriceTable::from_csv(file.path()).unwrap();
    assert_eq!(table.tickers, vec!["AAA", "BBB"]);
    assert_eq!(table.dates, vec!["2024-01-02", "2024-01-04", "2024-01-08"]);
    assert_eq!(table.prices[[1, 1]], 51.0);

    let returns = table.simple_returns().unwrap();
    assert_eq!(returns.returns.dim(), (2, 2));
    assert_abs_diff_eq!(returns.returns[[0, 0]], 0.02, epsilon = 1e-12);
    assert_abs_diff_eq!(returns.returns[[0, 1]], 0.02, epsilon = 1e-12);
  }

  #[test]
  fn annualizes_mean_and_covariance() {
    let returns = ReturnsTable::from_array(
      vec!["A".into(), "B".into()],
      ndarray::array![[0.01, 0.02], [0.03, 0.00], [0.02, 0.01]],
    )
    .unwrap();

    let inputs = returns.annualize(252.0).unwrap();
    let mean = inputs.mean().as_array();
    let cov = inputs.cov().as_array();
    assert_abs_diff_eq!(mean[0], 0.02 * 252.0, epsilon = 1e-12);
    assert_abs_diff_eq!(mean[1], 0.01 * 252.0, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[0, 0]], 1e-4 * 252.0, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[1, 1]], 1e-4 * 252.0, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[0, 1]], -1e-4 * 252.0, epsilon = 1e-12);
    assert_eq!(cov[[0, 1]], cov[[1, 0]]);
  }

  #[test]
  fn select_reorders_and_rejects_unknown_tickers() {
    let file = write_csv("Date,AAA,BBB,CCC\nd1,1,2,3\nd2,2,3,4\n");
    let table = PriceTable::from_csv(file.path()).unwrap();

    let sub = table.select(&["CCC".into(), "AAA".into()]).unwrap();
    assert_eq!(sub.tickers, vec!["CCC", "AAA"]);
    assert_eq!(sub.prices.row(0).to_vec(), vec![3.0, 1.0]);

    let err = table.select(&["ZZZ".into()]).unwrap_err();
    assert!(matches!(err, PortfolioError::UpstreamDataUnavailable(_)));
  }

  #[test]
  fn missing_or_short_files_are_unavailable() {
    let err = PriceTable::from_csv("/definitely/not/here.csv").unwrap_err();
    assert!(matches!(err, PortfolioError::UpstreamDataUnavailable(_)));

    let file = write_csv("Date,AAA\n2024-01-02,100.0\n2024-01-03,\n");
    let err = PriceTable::from_csv(file.path()).unwrap_err();
    assert!(matches!(err, PortfolioError::UpstreamDataUnavailable(_)));
  }

  #[test]
  fn single_return_row_cannot_be_annualized() {
    let returns = ReturnsTable::from_array(vec!["A".into()], ndarray::array![[0.01]]).unwrap();
    assert!(matches!(
      returns.annualize(252.0),
      Err(PortfolioError::UpstreamDataUnavailable(_))
    ));
    assert!(returns.annualize(0.0).is_err());
  }
}
