// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA(period), upper / lower = middle ± k·σ where σ is the rolling
// *sample* standard deviation. Derived columns:
//
//   width   = (upper - lower) / middle
//   percent = (close - lower) / (upper - lower)     (%B)
//
// Both ratios are `None` when their denominator is zero (flat price or a zero
// middle band) instead of propagating an infinity.

use serde::{Deserialize, Serialize};

use super::rolling::{rolling_mean, rolling_sample_std};

/// Bollinger parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerParams {
    pub period: usize,
    pub num_std: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: 20,
            num_std: 2.0,
        }
    }
}

/// Aligned Bollinger columns.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub width: Vec<Option<f64>>,
    pub percent_b: Vec<Option<f64>>,
}

/// Calculate Bollinger Bands for every index of `closes`.
///
/// Entries before index `period - 1` are `None`.
pub fn calculate_bollinger(closes: &[f64], params: BollingerParams) -> BollingerSeries {
    let middle = rolling_mean(closes, params.period);
    let std = rolling_sample_std(closes, params.period);
    let n = closes.len();

    let mut out = BollingerSeries {
        upper: vec![None; n],
        middle: middle.clone(),
        lower: vec![None; n],
        width: vec![None; n],
        percent_b: vec![None; n],
    };

    for i in 0..n {
        let (Some(mid), Some(sd)) = (middle[i], std[i]) else {
            continue;
        };
        let upper = mid + params.num_std * sd;
        let lower = mid - params.num_std * sd;
        let span = upper - lower;

        out.upper[i] = Some(upper);
        out.lower[i] = Some(lower);
        out.width[i] = guarded_ratio(span, mid);
        out.percent_b[i] = guarded_ratio(closes[i] - lower, span);
    }

    out
}

fn guarded_ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let r = num / den;
    r.is_finite().then_some(r)
}
