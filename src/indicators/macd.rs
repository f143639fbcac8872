// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   line      = EMA(close, fast) - EMA(close, slow)
//   signal    = EMA(line, signal_period)     (same recursive EMA)
//   histogram = line - signal
//
// Every output is aligned with the input closes.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::{calculate_ema, calculate_ema_column};

/// MACD periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// The three aligned MACD columns.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Compute MACD line, signal line and histogram for `closes`.
pub fn calculate_macd(closes: &[f64], params: MacdParams) -> MacdSeries {
    let fast = calculate_ema(closes, params.fast);
    let slow = calculate_ema(closes, params.slow);

    let line: Vec<Option<f64>> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = calculate_ema_column(&line, params.signal);
    let histogram = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}
