// =============================================================================
// Price sources — where raw daily bars come from
// =============================================================================
//
// The engine only needs "something that returns bars for a symbol and a date
// range, or fails". `CsvPriceSource` reads one `<SYMBOL>.csv` file per symbol
// from a directory. Header names follow the common daily-export layout
// (`date,open,high,low,close,volume`) and the capitalised variant
// (`Date,Open,High,Low,Close,Adj Close,Volume`); unknown columns are ignored.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;
use crate::market_data::PriceBar;

/// Supplier of raw (unvalidated) daily bars.
pub trait PriceSource: Send + Sync {
    /// Return the bars for `symbol` with `start <= date <= end`.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<PriceBar>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(default, alias = "Open")]
    open: Option<f64>,
    #[serde(default, alias = "High")]
    high: Option<f64>,
    #[serde(default, alias = "Low")]
    low: Option<f64>,
    #[serde(default, alias = "Close")]
    close: Option<f64>,
    #[serde(default, alias = "Volume")]
    volume: Option<f64>,
}

impl From<CsvRow> for PriceBar {
    fn from(row: CsvRow) -> Self {
        // A missing close stays NaN so that series preparation rejects it.
        let close = row.close.unwrap_or(f64::NAN);
        Self {
            date: row.date,
            open: row.open.unwrap_or(close),
            high: row.high.unwrap_or(close),
            low: row.low.unwrap_or(close),
            close,
            volume: row.volume.unwrap_or(0.0),
        }
    }
}

/// Reads `<dir>/<SYMBOL>.csv`.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    dir: PathBuf,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    fn read_file(path: &Path) -> Result<Vec<PriceBar>, FetchError> {
        let display = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|source| FetchError::Io {
            path: display.clone(),
            source,
        })?;

        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
        reader
            .deserialize::<CsvRow>()
            .map(|row| {
                row.map(PriceBar::from).map_err(|source| FetchError::Csv {
                    path: display.clone(),
                    source,
                })
            })
            .collect()
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, FetchError> {
        let path = self.path_for(symbol);
        let bars: Vec<PriceBar> = Self::read_file(&path)?
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();

        if bars.is_empty() {
            return Err(FetchError::NoData(symbol.to_string()));
        }

        debug!(symbol, path = %path.display(), bars = bars.len(), "price data loaded");
        Ok(bars)
    }
}
