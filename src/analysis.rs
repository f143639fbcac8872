// =============================================================================
// Symbol & Batch Analysis
// =============================================================================
//
// Wires one symbol through the whole pipeline:
//
//   fetch -> prepare series -> indicator frame -> classify -> alerts -> report
//
// A batch runs every configured symbol and records each failure against its
// symbol instead of aborting the run.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::indicators::{ema_name, IndicatorFrame};
use crate::market_data::{PriceBar, PriceSeries, PriceSource};
use crate::runtime_config::AnalysisConfig;
use crate::signals::{assemble_alerts, classify, count_by_type, AlertKind, AlertRecord, SignalSummary};

// =============================================================================
// Per-symbol report
// =============================================================================

/// Latest close and its change from the previous bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub close: f64,
    pub previous_close: f64,
    pub change: f64,
    /// `None` when the previous close is zero.
    pub change_pct: Option<f64>,
}

impl PriceSummary {
    pub fn from_series(series: &PriceSeries) -> Self {
        let close = series.last().close;
        let previous_close = series.previous().close;
        let change = close - previous_close;
        let change_pct = (previous_close != 0.0).then(|| change / previous_close * 100.0);
        Self {
            close,
            previous_close,
            change,
            change_pct,
        }
    }
}

/// Everything reported for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub bars: usize,
    pub price: PriceSummary,
    /// Latest value of every indicator column.
    pub indicators: BTreeMap<String, Option<f64>>,
    /// Close minus EMA, keyed by EMA column name.
    pub ema_distance: BTreeMap<String, Option<f64>>,
    pub signals: SignalSummary,
    pub alerts: Vec<AlertRecord>,
    pub alert_counts: BTreeMap<AlertKind, usize>,
}

impl SymbolReport {
    pub fn recent_alerts(&self) -> impl Iterator<Item = &AlertRecord> {
        self.alerts.iter().filter(|a| a.is_recent)
    }
}

/// A finished report together with the frame it was derived from.
#[derive(Debug, Clone)]
pub struct SymbolAnalysis {
    pub report: SymbolReport,
    pub frame: IndicatorFrame,
}

fn ema_distance(frame: &IndicatorFrame, spans: &[usize]) -> BTreeMap<String, Option<f64>> {
    let close = frame.series().last().close;
    spans
        .iter()
        .map(|&span| {
            let name = ema_name(span);
            let diff = frame.latest(&name).ok().flatten().map(|ema| close - ema);
            (name, diff)
        })
        .collect()
}

/// Run the pipeline over raw bars already fetched for `symbol`.
pub fn analyze_series(
    symbol: &str,
    bars: Vec<PriceBar>,
    config: &AnalysisConfig,
) -> Result<SymbolAnalysis, AnalysisError> {
    let series = PriceSeries::prepare(bars)?;
    let frame = IndicatorFrame::compute(series, &config.indicators);
    let signals = classify(&frame, &config.classifier);
    let alerts = assemble_alerts(&frame, &signals, &config.alerts);

    let series = frame.series();
    let report = SymbolReport {
        symbol: symbol.to_string(),
        first_date: series.first_date(),
        last_date: series.last_date(),
        bars: series.len(),
        price: PriceSummary::from_series(series),
        indicators: frame.snapshot(),
        ema_distance: ema_distance(&frame, &config.indicators.ema_spans),
        signals,
        alert_counts: count_by_type(&alerts),
        alerts,
    };

    debug!(
        symbol,
        bars = report.bars,
        last_date = %report.last_date,
        alerts = report.alerts.len(),
        recent = report.recent_alerts().count(),
        "symbol analysed"
    );

    Ok(SymbolAnalysis { report, frame })
}

/// Fetch `lookback_days` of history ending at `end` and analyse it.
pub fn analyze_symbol(
    source: &dyn PriceSource,
    symbol: &str,
    end: NaiveDate,
    config: &AnalysisConfig,
) -> Result<SymbolAnalysis, AnalysisError> {
    let start = end - Duration::days(config.lookback_days);
    let bars = source.fetch(symbol, start, end)?;
    analyze_series(symbol, bars, config)
}

// =============================================================================
// Batch
// =============================================================================

/// Result of one symbol within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SymbolOutcome {
    Analyzed(SymbolReport),
    Failed { symbol: String, error: String },
}

impl SymbolOutcome {
    pub fn from_result(symbol: &str, result: &Result<SymbolAnalysis, AnalysisError>) -> Self {
        match result {
            Ok(analysis) => Self::Analyzed(analysis.report.clone()),
            Err(e) => {
                warn!(symbol, error = %e, "symbol analysis failed");
                Self::Failed {
                    symbol: symbol.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Analyzed(report) => &report.symbol,
            Self::Failed { symbol, .. } => symbol,
        }
    }

    pub fn report(&self) -> Option<&SymbolReport> {
        match self {
            Self::Analyzed(report) => Some(report),
            Self::Failed { .. } => None,
        }
    }
}

/// Outcomes for every symbol of a run plus aggregate alert counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub end_date: NaiveDate,
    pub succeeded: usize,
    pub failed: usize,
    pub alert_counts: BTreeMap<AlertKind, usize>,
    pub recent_alert_counts: BTreeMap<AlertKind, usize>,
    pub outcomes: Vec<SymbolOutcome>,
}

impl BatchReport {
    pub fn from_outcomes(end_date: NaiveDate, outcomes: Vec<SymbolOutcome>) -> Self {
        let mut alert_counts = BTreeMap::new();
        let mut recent_alert_counts = BTreeMap::new();
        for report in outcomes.iter().filter_map(SymbolOutcome::report) {
            for (kind, n) in &report.alert_counts {
                *alert_counts.entry(*kind).or_insert(0) += n;
            }
            for alert in report.recent_alerts() {
                *recent_alert_counts.entry(alert.kind).or_insert(0) += 1;
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.report().is_some()).count();
        Self {
            generated_at: Utc::now(),
            end_date,
            succeeded,
            failed: outcomes.len() - succeeded,
            alert_counts,
            recent_alert_counts,
            outcomes,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// Analyse every symbol in `config.symbols` in order.
///
/// A failing symbol is recorded as [`SymbolOutcome::Failed`] and the batch
/// continues.
pub fn analyze_batch(source: &dyn PriceSource, end: NaiveDate, config: &AnalysisConfig) -> BatchReport {
    let outcomes = config
        .symbols
        .iter()
        .map(|symbol| {
            let result = analyze_symbol(source, symbol, end, config);
            SymbolOutcome::from_result(symbol, &result)
        })
        .collect();
    BatchReport::from_outcomes(end, outcomes)
}
