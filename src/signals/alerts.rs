// =============================================================================
// Alert Assembler
// =============================================================================
//
// Collects typed alert records for the latest state of one frame:
//
//   thresholds  : RSI extreme, close below an EMA, down day below a short EMA
//   crossovers  : latest event of every configured scan
//   classifier  : band breakout/breakdown, squeeze, MACD momentum, divergence
//
// Undated threshold alerts are never recent. Crossovers carry their own date,
// classifier flags and the down-day warning carry the last bar's date.
// Scans that cannot run on a short frame are logged and skipped.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classifier::{BandPosition, Divergence, Momentum, RsiRegime, SignalSummary};
use super::crossover::{
    scan_ema_pair, scan_macd_signal, scan_macd_zero, scan_price_ema, CrossKind, CrossoverEvent,
};
use crate::error::IndicatorError;
use crate::indicators::{ema_name, IndicatorFrame};

// =============================================================================
// Types
// =============================================================================

/// Alert category; serialised as a snake_case `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    RsiOverbought,
    RsiOversold,
    PriceBelowEma,
    DownDayBelowShortEma,
    GoldenCross,
    DeathCross,
    PriceUpCross,
    PriceDownCross,
    MacdBullCross,
    MacdBearCross,
    MacdZeroUp,
    MacdZeroDown,
    BollingerBreakout,
    BollingerBreakdown,
    BollingerSqueeze,
    MacdMomentumIncreasing,
    MacdMomentumDecreasing,
    MacdDivergenceBullish,
    MacdDivergenceBearish,
}

impl From<CrossKind> for AlertKind {
    fn from(kind: CrossKind) -> Self {
        match kind {
            CrossKind::GoldenCross => Self::GoldenCross,
            CrossKind::DeathCross => Self::DeathCross,
            CrossKind::PriceUpCross => Self::PriceUpCross,
            CrossKind::PriceDownCross => Self::PriceDownCross,
            CrossKind::MacdBullCross => Self::MacdBullCross,
            CrossKind::MacdBearCross => Self::MacdBearCross,
            CrossKind::MacdZeroUp => Self::MacdZeroUp,
            CrossKind::MacdZeroDown => Self::MacdZeroDown,
        }
    }
}

impl AlertKind {
    /// The snake_case tag also used in serialised records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RsiOverbought => "rsi_overbought",
            Self::RsiOversold => "rsi_oversold",
            Self::PriceBelowEma => "price_below_ema",
            Self::DownDayBelowShortEma => "down_day_below_short_ema",
            Self::GoldenCross => "golden_cross",
            Self::DeathCross => "death_cross",
            Self::PriceUpCross => "price_up_cross",
            Self::PriceDownCross => "price_down_cross",
            Self::MacdBullCross => "macd_bull_cross",
            Self::MacdBearCross => "macd_bear_cross",
            Self::MacdZeroUp => "macd_zero_up",
            Self::MacdZeroDown => "macd_zero_down",
            Self::BollingerBreakout => "bollinger_breakout",
            Self::BollingerBreakdown => "bollinger_breakdown",
            Self::BollingerSqueeze => "bollinger_squeeze",
            Self::MacdMomentumIncreasing => "macd_momentum_increasing",
            Self::MacdMomentumDecreasing => "macd_momentum_decreasing",
            Self::MacdDivergenceBullish => "macd_divergence_bullish",
            Self::MacdDivergenceBearish => "macd_divergence_bearish",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub event_date: Option<NaiveDate>,
    pub is_recent: bool,
}

fn default_ema_cross_pairs() -> Vec<(usize, usize)> {
    vec![(5, 10), (10, 20), (20, 50), (50, 200)]
}

fn default_price_cross_spans() -> Vec<usize> {
    vec![5, 10]
}

fn default_price_below_spans() -> Vec<usize> {
    vec![5, 10, 20, 50]
}

fn default_short_ema_spans() -> Vec<usize> {
    vec![5, 10, 20]
}

fn default_recency_window_days() -> i64 {
    10
}

/// Which scans to run and how recency is judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    /// (fast, slow) EMA spans scanned for golden / death crosses.
    #[serde(default = "default_ema_cross_pairs")]
    pub ema_cross_pairs: Vec<(usize, usize)>,

    /// EMA spans the close is scanned against.
    #[serde(default = "default_price_cross_spans")]
    pub price_cross_spans: Vec<usize>,

    #[serde(default = "default_price_below_spans")]
    pub price_below_spans: Vec<usize>,

    /// EMA spans for the down-day warning.
    #[serde(default = "default_short_ema_spans")]
    pub short_ema_spans: Vec<usize>,

    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            ema_cross_pairs: default_ema_cross_pairs(),
            price_cross_spans: default_price_cross_spans(),
            price_below_spans: default_price_below_spans(),
            short_ema_spans: default_short_ema_spans(),
            recency_window_days: default_recency_window_days(),
        }
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// `true` when `event` lies within `window_days` calendar days of `last`.
pub fn is_recent(last: NaiveDate, event: NaiveDate, window_days: i64) -> bool {
    (last - event).num_days() <= window_days
}

struct Collector {
    last_date: NaiveDate,
    window: i64,
    alerts: Vec<AlertRecord>,
}

impl Collector {
    fn push(&mut self, kind: AlertKind, message: String, event_date: Option<NaiveDate>) {
        let is_recent = event_date.is_some_and(|d| is_recent(self.last_date, d, self.window));
        self.alerts.push(AlertRecord {
            kind,
            message,
            event_date,
            is_recent,
        });
    }

    fn crossover(&mut self, scan: &str, found: Result<Option<CrossoverEvent>, IndicatorError>) {
        match found {
            Ok(Some(ev)) => {
                let message = format!("{} crossed {} ({})", ev.pair.0, ev.pair.1, ev.kind);
                self.push(ev.kind.into(), message, Some(ev.occurred_at));
            }
            Ok(None) => {}
            Err(e) => debug!(scan, error = %e, "crossover scan skipped"),
        }
    }
}

fn push_thresholds(
    frame: &IndicatorFrame,
    summary: &SignalSummary,
    settings: &AlertSettings,
    out: &mut Collector,
) {
    if let Some(rsi) = summary.rsi {
        match rsi.regime {
            RsiRegime::Overbought => out.push(
                AlertKind::RsiOverbought,
                format!("RSI overbought at {:.2}", rsi.value),
                None,
            ),
            RsiRegime::Oversold => out.push(
                AlertKind::RsiOversold,
                format!("RSI oversold at {:.2}", rsi.value),
                None,
            ),
            RsiRegime::Neutral => {}
        }
    }

    let series = frame.series();
    let close = series.last().close;

    for &span in &settings.price_below_spans {
        match frame.latest(&ema_name(span)) {
            Ok(Some(ema)) if close < ema => out.push(
                AlertKind::PriceBelowEma,
                format!("Close {close:.2} below {} ({ema:.2})", ema_name(span)),
                None,
            ),
            Ok(_) => {}
            Err(e) => debug!(ema_span = span, error = %e, "price/EMA check skipped"),
        }
    }

    if close < series.previous().close {
        let below: Vec<String> = settings
            .short_ema_spans
            .iter()
            .filter(|&&span| matches!(frame.latest(&ema_name(span)), Ok(Some(ema)) if close < ema))
            .map(|&span| ema_name(span))
            .collect();
        if !below.is_empty() {
            out.push(
                AlertKind::DownDayBelowShortEma,
                format!("Down day closing at {close:.2} below {}", below.join(", ")),
                Some(series.last_date()),
            );
        }
    }
}

fn push_classifier_flags(summary: &SignalSummary, out: &mut Collector) {
    let today = Some(out.last_date);

    if let Some(bb) = summary.bollinger {
        let pct = bb.percent_b.map_or_else(|| "n/a".to_string(), |p| format!("{p:.2}"));
        match bb.position {
            BandPosition::AboveUpper => out.push(
                AlertKind::BollingerBreakout,
                format!("Close above upper Bollinger band (%B {pct})"),
                today,
            ),
            BandPosition::BelowLower => out.push(
                AlertKind::BollingerBreakdown,
                format!("Close below lower Bollinger band (%B {pct})"),
                today,
            ),
            BandPosition::Inside => {}
        }
        if bb.squeeze == Some(true) {
            let width = bb.width.map_or_else(|| "n/a".to_string(), |w| format!("{w:.4}"));
            out.push(
                AlertKind::BollingerSqueeze,
                format!("Bollinger squeeze, band width {width}"),
                today,
            );
        }
    }

    match summary.momentum {
        Some(Momentum::Increasing) => out.push(
            AlertKind::MacdMomentumIncreasing,
            "MACD histogram increasing".to_string(),
            today,
        ),
        Some(Momentum::Decreasing) => out.push(
            AlertKind::MacdMomentumDecreasing,
            "MACD histogram decreasing".to_string(),
            today,
        ),
        None => {}
    }

    match summary.divergence {
        Some(Divergence::Bullish) => out.push(
            AlertKind::MacdDivergenceBullish,
            "Price falling while MACD rises".to_string(),
            today,
        ),
        Some(Divergence::Bearish) => out.push(
            AlertKind::MacdDivergenceBearish,
            "Price rising while MACD falls".to_string(),
            today,
        ),
        None => {}
    }
}

/// Build every alert for the latest state of `frame`.
///
/// `summary` is the classifier output for the same frame.
pub fn assemble_alerts(
    frame: &IndicatorFrame,
    summary: &SignalSummary,
    settings: &AlertSettings,
) -> Vec<AlertRecord> {
    let mut out = Collector {
        last_date: frame.series().last_date(),
        window: settings.recency_window_days,
        alerts: Vec::new(),
    };

    push_thresholds(frame, summary, settings, &mut out);

    for &(fast, slow) in &settings.ema_cross_pairs {
        out.crossover("ema_pair", scan_ema_pair(frame, fast, slow));
    }
    for &span in &settings.price_cross_spans {
        out.crossover("price_ema", scan_price_ema(frame, span));
    }
    out.crossover("macd_signal", scan_macd_signal(frame));
    out.crossover("macd_zero", scan_macd_zero(frame));

    push_classifier_flags(summary, &mut out);

    debug!(
        alerts = out.alerts.len(),
        recent = out.alerts.iter().filter(|a| a.is_recent).count(),
        "alerts assembled"
    );
    out.alerts
}

/// Number of alerts per kind.
pub fn count_by_type(alerts: &[AlertRecord]) -> BTreeMap<AlertKind, usize> {
    let mut counts = BTreeMap::new();
    for alert in alerts {
        *counts.entry(alert.kind).or_insert(0) += 1;
    }
    counts
}
