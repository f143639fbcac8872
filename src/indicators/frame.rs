// =============================================================================
// Indicator Frame — a price series plus its aligned derived columns
// =============================================================================
//
// The frame owns the validated series and a name -> column map. Every column
// has exactly `series.len()` entries; `None` marks samples where the window has
// insufficient history or the value is a guarded degenerate case.
//
// Columns are added by the consuming `with_*` builders, so once a frame has
// been handed out by reference it cannot change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bollinger::{calculate_bollinger, BollingerParams};
use super::ema::calculate_ema;
use super::macd::{calculate_macd, MacdParams};
use super::rsi::{calculate_rsi, DEFAULT_RSI_PERIOD};
use crate::error::IndicatorError;
use crate::market_data::PriceSeries;

pub const MACD_LINE: &str = "MACD_line";
pub const MACD_SIGNAL: &str = "MACD_signal";
pub const MACD_HIST: &str = "MACD_hist";
pub const BB_UPPER: &str = "BB_upper";
pub const BB_MIDDLE: &str = "BB_middle";
pub const BB_LOWER: &str = "BB_lower";
pub const BB_WIDTH: &str = "BB_width";
pub const BB_PERCENT: &str = "BB_percent";

/// Column name for an EMA span, e.g. `EMA_20`.
pub fn ema_name(span: usize) -> String {
    format!("EMA_{span}")
}

/// Column name for an RSI period, e.g. `RSI_14`.
pub fn rsi_name(period: usize) -> String {
    format!("RSI_{period}")
}

fn default_ema_spans() -> Vec<usize> {
    vec![5, 10, 20, 50, 60, 120, 200]
}

fn default_rsi_period() -> usize {
    DEFAULT_RSI_PERIOD
}

/// Which indicators to compute and with what parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSettings {
    #[serde(default = "default_ema_spans")]
    pub ema_spans: Vec<usize>,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default)]
    pub macd: MacdParams,

    #[serde(default)]
    pub bollinger: BollingerParams,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_spans: default_ema_spans(),
            rsi_period: default_rsi_period(),
            macd: MacdParams::default(),
            bollinger: BollingerParams::default(),
        }
    }
}

/// A validated price series with its derived indicator columns.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    series: PriceSeries,
    columns: BTreeMap<String, Vec<Option<f64>>>,
    rsi_period: Option<usize>,
}

impl IndicatorFrame {
    /// Frame with no derived columns yet.
    pub fn new(series: PriceSeries) -> Self {
        Self {
            series,
            columns: BTreeMap::new(),
            rsi_period: None,
        }
    }

    /// Compute every indicator named in `settings` in one pass.
    pub fn compute(series: PriceSeries, settings: &IndicatorSettings) -> Self {
        let frame = Self::new(series)
            .with_emas(&settings.ema_spans)
            .with_rsi(settings.rsi_period)
            .with_macd(settings.macd)
            .with_bollinger(settings.bollinger);

        debug!(
            bars = frame.len(),
            columns = frame.columns.len(),
            last_date = %frame.series.last_date(),
            "indicator frame computed"
        );
        frame
    }

    pub fn with_emas(mut self, spans: &[usize]) -> Self {
        for &span in spans {
            let col = calculate_ema(self.series.closes(), span);
            self.columns.insert(ema_name(span), col);
        }
        self
    }

    pub fn with_rsi(mut self, period: usize) -> Self {
        let col = calculate_rsi(self.series.closes(), period);
        self.columns.insert(rsi_name(period), col);
        self.rsi_period = Some(period);
        self
    }

    pub fn with_macd(mut self, params: MacdParams) -> Self {
        let m = calculate_macd(self.series.closes(), params);
        self.columns.insert(MACD_LINE.to_string(), m.line);
        self.columns.insert(MACD_SIGNAL.to_string(), m.signal);
        self.columns.insert(MACD_HIST.to_string(), m.histogram);
        self
    }

    pub fn with_bollinger(mut self, params: BollingerParams) -> Self {
        let bb = calculate_bollinger(self.series.closes(), params);
        self.columns.insert(BB_UPPER.to_string(), bb.upper);
        self.columns.insert(BB_MIDDLE.to_string(), bb.middle);
        self.columns.insert(BB_LOWER.to_string(), bb.lower);
        self.columns.insert(BB_WIDTH.to_string(), bb.width);
        self.columns.insert(BB_PERCENT.to_string(), bb.percent_b);
        self
    }

    pub fn series(&self) -> &PriceSeries {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Names of all computed columns, sorted.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&[Option<f64>], IndicatorError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| IndicatorError::MissingColumn(name.to_string()))
    }

    pub fn ema(&self, span: usize) -> Result<&[Option<f64>], IndicatorError> {
        self.column(&ema_name(span))
    }

    /// The RSI column added by the most recent [`with_rsi`](Self::with_rsi).
    pub fn rsi(&self) -> Result<&[Option<f64>], IndicatorError> {
        let period = self
            .rsi_period
            .ok_or_else(|| IndicatorError::MissingColumn(rsi_name(DEFAULT_RSI_PERIOD)))?;
        self.column(&rsi_name(period))
    }

    pub fn rsi_period(&self) -> Option<usize> {
        self.rsi_period
    }

    /// Latest value of a column, `None` when undefined at the last sample.
    pub fn latest(&self, name: &str) -> Result<Option<f64>, IndicatorError> {
        Ok(self.column(name)?.last().copied().flatten())
    }

    /// Latest value of every column.
    pub fn snapshot(&self) -> BTreeMap<String, Option<f64>> {
        self.columns
            .iter()
            .map(|(name, col)| (name.clone(), col.last().copied().flatten()))
            .collect()
    }
}
