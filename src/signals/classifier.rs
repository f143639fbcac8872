// =============================================================================
// Signal Classifier
// =============================================================================
//
// Stateless classification of the latest sample of an indicator frame:
//
//   RSI regime   : >= overbought => OVERBOUGHT, <= oversold => OVERSOLD
//   Band position: close above upper / below lower / inside the envelope
//   Squeeze      : width <= tolerance × min(width over trailing window)
//   Momentum     : MACD histogram rising or falling on the last step
//   Divergence   : sign of mean close change vs sign of mean MACD-line change
//
// Every reader returns `Result<_, IndicatorError>`; `InsufficientData` means
// the latest sample (or its window) is undefined, never a panic.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IndicatorError;
use crate::indicators::frame::{
    IndicatorFrame, BB_LOWER, BB_PERCENT, BB_UPPER, BB_WIDTH, MACD_HIST, MACD_LINE,
};

// =============================================================================
// Settings
// =============================================================================

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_rsi_oversold() -> f64 {
    30.0
}

fn default_squeeze_lookback() -> usize {
    20
}

fn default_squeeze_tolerance() -> f64 {
    1.05
}

fn default_divergence_window() -> usize {
    20
}

/// Thresholds and windows used by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,

    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,

    /// Number of trailing samples (current included) for the squeeze minimum.
    #[serde(default = "default_squeeze_lookback")]
    pub squeeze_lookback: usize,

    /// Current width must be at or below `tolerance × min` to flag a squeeze.
    #[serde(default = "default_squeeze_tolerance")]
    pub squeeze_tolerance: f64,

    /// Number of trailing samples for the divergence heuristic.
    #[serde(default = "default_divergence_window")]
    pub divergence_window: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            rsi_overbought: default_rsi_overbought(),
            rsi_oversold: default_rsi_oversold(),
            squeeze_lookback: default_squeeze_lookback(),
            squeeze_tolerance: default_squeeze_tolerance(),
            divergence_window: default_divergence_window(),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiRegime {
    Overbought,
    Oversold,
    Neutral,
}

impl fmt::Display for RsiRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Oversold => write!(f, "OVERSOLD"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Latest RSI value with its regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiReading {
    pub value: f64,
    pub regime: RsiRegime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandPosition {
    AboveUpper,
    BelowLower,
    Inside,
}

impl fmt::Display for BandPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AboveUpper => write!(f, "BREAKOUT_ABOVE"),
            Self::BelowLower => write!(f, "BREAKDOWN_BELOW"),
            Self::Inside => write!(f, "INSIDE"),
        }
    }
}

/// Latest Bollinger state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerState {
    pub position: BandPosition,
    pub percent_b: Option<f64>,
    pub width: Option<f64>,
    /// `None` when the trailing width window is not fully defined.
    pub squeeze: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Momentum {
    Increasing,
    Decreasing,
}

impl fmt::Display for Momentum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increasing => write!(f, "INCREASING"),
            Self::Decreasing => write!(f, "DECREASING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Divergence {
    /// Price falling while MACD rises.
    Bullish,
    /// Price rising while MACD falls.
    Bearish,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// Everything the classifier could determine for the latest sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub rsi: Option<RsiReading>,
    pub bollinger: Option<BollingerState>,
    pub momentum: Option<Momentum>,
    pub divergence: Option<Divergence>,
}

// =============================================================================
// Readers
// =============================================================================

/// Map an RSI value to its regime.
pub fn classify_rsi(value: f64, overbought: f64, oversold: f64) -> RsiRegime {
    if value >= overbought {
        RsiRegime::Overbought
    } else if value <= oversold {
        RsiRegime::Oversold
    } else {
        RsiRegime::Neutral
    }
}

fn latest_defined(col: &[Option<f64>], name: &str, required: usize) -> Result<f64, IndicatorError> {
    col.last()
        .copied()
        .flatten()
        .ok_or_else(|| IndicatorError::insufficient(name, required, col.len()))
}

pub fn rsi_reading(
    frame: &IndicatorFrame,
    settings: &ClassifierSettings,
) -> Result<RsiReading, IndicatorError> {
    let col = frame.rsi()?;
    let required = frame.rsi_period().unwrap_or_default();
    let value = latest_defined(col, "RSI", required)?;
    Ok(RsiReading {
        value,
        regime: classify_rsi(value, settings.rsi_overbought, settings.rsi_oversold),
    })
}

/// `true` when the latest width sits within `tolerance` of the trailing
/// minimum over `lookback` samples (latest included).
pub fn is_squeeze(
    widths: &[Option<f64>],
    lookback: usize,
    tolerance: f64,
) -> Result<bool, IndicatorError> {
    if lookback == 0 || widths.len() < lookback {
        return Err(IndicatorError::insufficient(BB_WIDTH, lookback, widths.len()));
    }
    let window = &widths[widths.len() - lookback..];
    let defined: Vec<f64> = window.iter().flatten().copied().collect();
    if defined.len() < lookback {
        return Err(IndicatorError::insufficient(BB_WIDTH, lookback, defined.len()));
    }
    let current = defined[defined.len() - 1];
    let min = defined.iter().copied().fold(f64::INFINITY, f64::min);
    Ok(current <= tolerance * min)
}

pub fn bollinger_state(
    frame: &IndicatorFrame,
    settings: &ClassifierSettings,
) -> Result<BollingerState, IndicatorError> {
    let upper = latest_defined(frame.column(BB_UPPER)?, BB_UPPER, 2)?;
    let lower = latest_defined(frame.column(BB_LOWER)?, BB_LOWER, 2)?;
    let close = frame.series().last().close;

    let position = if close > upper {
        BandPosition::AboveUpper
    } else if close < lower {
        BandPosition::BelowLower
    } else {
        BandPosition::Inside
    };

    let widths = frame.column(BB_WIDTH)?;
    let squeeze = is_squeeze(widths, settings.squeeze_lookback, settings.squeeze_tolerance).ok();

    Ok(BollingerState {
        position,
        percent_b: frame.latest(BB_PERCENT)?,
        width: widths.last().copied().flatten(),
        squeeze,
    })
}

/// Direction of the last MACD histogram step.
pub fn histogram_trend(frame: &IndicatorFrame) -> Result<Momentum, IndicatorError> {
    let hist = frame.column(MACD_HIST)?;
    let n = hist.len();
    if n < 2 {
        return Err(IndicatorError::insufficient(MACD_HIST, 2, n));
    }
    match (hist[n - 2], hist[n - 1]) {
        (Some(prev), Some(last)) => Ok(if last > prev {
            Momentum::Increasing
        } else {
            Momentum::Decreasing
        }),
        _ => Err(IndicatorError::insufficient(MACD_HIST, 2, 0)),
    }
}

fn mean_step(values: &[f64]) -> f64 {
    let steps: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    steps.iter().sum::<f64>() / steps.len() as f64
}

/// Approximate price / MACD divergence over the trailing `window` samples.
///
/// Compares only the sign of the mean daily change of each series; it does
/// not match peaks and troughs. Returns `Ok(None)` when the signs agree or
/// either mean change is zero.
pub fn detect_divergence(
    closes: &[f64],
    macd_line: &[Option<f64>],
    window: usize,
) -> Result<Option<Divergence>, IndicatorError> {
    let n = closes.len().min(macd_line.len());
    if window < 2 || n < window {
        return Err(IndicatorError::insufficient("divergence", window.max(2), n));
    }
    let price = &closes[closes.len() - window..];
    let macd: Vec<f64> = macd_line[macd_line.len() - window..]
        .iter()
        .copied()
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| IndicatorError::insufficient(MACD_LINE, window, n))?;

    let price_step = mean_step(price);
    let macd_step = mean_step(&macd);

    Ok(if price_step > 0.0 && macd_step < 0.0 {
        Some(Divergence::Bearish)
    } else if price_step < 0.0 && macd_step > 0.0 {
        Some(Divergence::Bullish)
    } else {
        None
    })
}

/// Run every reader; anything that cannot be determined is left `None`.
pub fn classify(frame: &IndicatorFrame, settings: &ClassifierSettings) -> SignalSummary {
    fn keep<T>(what: &str, r: Result<T, IndicatorError>) -> Option<T> {
        r.map_err(|e| {
            debug!(classifier = what, error = %e, "classifier skipped");
        })
        .ok()
    }

    let divergence = frame
        .column(MACD_LINE)
        .and_then(|line| detect_divergence(frame.series().closes(), line, settings.divergence_window));

    let summary = SignalSummary {
        rsi: keep("rsi", rsi_reading(frame, settings)),
        bollinger: keep("bollinger", bollinger_state(frame, settings)),
        momentum: keep("momentum", histogram_trend(frame)),
        divergence: keep("divergence", divergence).flatten(),
    };

    debug!(
        rsi = ?summary.rsi.map(|r| r.regime),
        band = ?summary.bollinger.map(|b| b.position),
        momentum = ?summary.momentum,
        divergence = ?summary.divergence,
        "signals classified"
    );
    summary
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSettings;
    use crate::market_data::PriceSeries;
    use chrono::NaiveDate;

    fn frame(closes: &[f64]) -> IndicatorFrame {
        let series =
            PriceSeries::from_closes(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), closes).unwrap();
        IndicatorFrame::compute(series, &IndicatorSettings::default())
    }

    #[test]
    fn test_classify_rsi_thresholds() {
        assert_eq!(classify_rsi(70.0, 70.0, 30.0), RsiRegime::Overbought);
        assert_eq!(classify_rsi(30.0, 70.0, 30.0), RsiRegime::Oversold);
        assert_eq!(classify_rsi(50.0, 70.0, 30.0), RsiRegime::Neutral);
        assert_eq!(classify_rsi(65.0, 60.0, 40.0), RsiRegime::Overbought);
    }

    #[test]
    fn test_decreasing_series_is_oversold() {
        let closes: Vec<f64> = (1..=20).rev().map(|x| x as f64).collect();
        let r = rsi_reading(&frame(&closes), &ClassifierSettings::default()).unwrap();
        assert_eq!(r.regime, RsiRegime::Oversold);
        assert!(r.value <= 30.0);
    }

    #[test]
    fn test_rsi_insufficient() {
        let err = rsi_reading(&frame(&[1.0, 2.0, 3.0]), &ClassifierSettings::default()).unwrap_err();
        assert!(matches!(err, IndicatorError::InsufficientData { .. }));
    }

    #[test]
    fn test_breakout_above_upper_band() {
        let mut closes = vec![100.0, 101.0].repeat(15);
        closes.push(130.0);
        let state = bollinger_state(&frame(&closes), &ClassifierSettings::default()).unwrap();
        assert_eq!(state.position, BandPosition::AboveUpper);
        assert!(state.percent_b.unwrap() > 1.0);
    }

    #[test]
    fn test_breakdown_below_lower_band() {
        let mut closes = vec![100.0, 101.0].repeat(15);
        closes.push(70.0);
        let state = bollinger_state(&frame(&closes), &ClassifierSettings::default()).unwrap();
        assert_eq!(state.position, BandPosition::BelowLower);
    }

    #[test]
    fn test_squeeze_detection() {
        let mut widths: Vec<Option<f64>> = (0..19).map(|i| Some(0.10 - i as f64 * 0.001)).collect();
        widths.push(Some(0.0825));
        assert!(is_squeeze(&widths, 20, 1.05).unwrap());

        widths.push(Some(0.20));
        assert!(!is_squeeze(&widths, 20, 1.05).unwrap());
    }

    #[test]
    fn test_squeeze_needs_full_window() {
        let widths = vec![None, Some(0.1), Some(0.1)];
        assert!(is_squeeze(&widths, 3, 1.05).is_err());
        assert!(is_squeeze(&widths, 5, 1.05).is_err());
    }

    #[test]
    fn test_histogram_trend() {
        let mut closes = vec![100.0; 30];
        closes.push(110.0);
        assert_eq!(histogram_trend(&frame(&closes)).unwrap(), Momentum::Increasing);
        closes.push(90.0);
        assert_eq!(histogram_trend(&frame(&closes)).unwrap(), Momentum::Decreasing);
    }

    #[test]
    fn test_flat_histogram_is_decreasing() {
        assert_eq!(histogram_trend(&frame(&[5.0; 40])).unwrap(), Momentum::Decreasing);
    }

    #[test]
    fn test_divergence_signs() {
        let up: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let down_macd: Vec<Option<f64>> = (0..20).map(|i| Some(-(i as f64))).collect();
        let up_macd: Vec<Option<f64>> = (0..20).map(|i| Some(i as f64)).collect();
        let down: Vec<f64> = up.iter().rev().copied().collect();

        assert_eq!(detect_divergence(&up, &down_macd, 20).unwrap(), Some(Divergence::Bearish));
        assert_eq!(detect_divergence(&down, &up_macd, 20).unwrap(), Some(Divergence::Bullish));
        assert_eq!(detect_divergence(&up, &up_macd, 20).unwrap(), None);
    }

    #[test]
    fn test_divergence_insufficient() {
        let closes = vec![1.0; 5];
        let macd = vec![Some(0.0); 5];
        assert!(detect_divergence(&closes, &macd, 20).is_err());
    }

    #[test]
    fn test_classify_short_frame_degrades() {
        let summary = classify(&frame(&[1.0, 2.0, 3.0]), &ClassifierSettings::default());
        assert!(summary.rsi.is_none());
        assert!(summary.bollinger.is_none());
        assert_eq!(summary.momentum, Some(Momentum::Increasing));
        assert!(summary.divergence.is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(RsiRegime::Overbought.to_string(), "OVERBOUGHT");
        assert_eq!(BandPosition::AboveUpper.to_string(), "BREAKOUT_ABOVE");
        assert_eq!(Divergence::Bearish.to_string(), "BEARISH");
    }
}
