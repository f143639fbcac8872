// =============================================================================
// Relative Strength Index (RSI) — simple rolling averages
// =============================================================================
//
// Step 1 — delta_0 = 0, delta_t = close_t - close_{t-1}
// Step 2 — gain_t = max(delta_t, 0), loss_t = max(-delta_t, 0)
// Step 3 — avg_gain / avg_loss = simple mean over the last `period` samples
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// The first sample contributes a zero delta, so a series of exactly `period`
// closes yields a defined RSI on its last index.
// =============================================================================

use super::rolling::rolling_mean;

/// Default look-back.
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Compute the RSI series for `closes`, aligned with the input.
///
/// Entries before index `period - 1` are `None`.
///
/// # Edge cases
/// - `period == 0` => every value `None`
/// - average loss of zero with gains => 100.0
/// - no movement at all (0 / 0) => 50.0
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || closes.is_empty() {
        return vec![None; closes.len()];
    }

    let deltas: Vec<f64> = std::iter::once(0.0)
        .chain(closes.windows(2).map(|w| w[1] - w[0]))
        .collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(g, l)| rsi_from_averages(g?, l?))
        .collect()
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - If average loss is zero (only gains), RSI is 100.0.
/// - Returns `None` when the result is non-finite.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}
