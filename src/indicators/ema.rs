// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Recursive ("adjust = false") form, seeded with the first sample:
//
//   alpha  = 2 / (span + 1)
//   EMA_0  = x_0
//   EMA_t  = EMA_{t-1} + alpha * (x_t - EMA_{t-1})
//
// which is algebraically `alpha * x_t + (1 - alpha) * EMA_{t-1}`. The increment
// form keeps a constant input exactly constant in floating point.
//
// Alert thresholds downstream assume this recursion, not the weighted average
// over all history.
// =============================================================================

/// Compute the EMA series for `values` with the given `span`.
///
/// The output is aligned with the input and defined from index 0.
///
/// # Edge cases
/// - `span == 0` => every value `None`
/// - A non-finite input leaves that output `None`; the recursion re-seeds from
///   the next finite sample.
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<Option<f64>> {
    if span == 0 {
        return vec![None; values.len()];
    }
    let alpha = 2.0 / (span as f64 + 1.0);

    let mut prev: Option<f64> = None;
    values
        .iter()
        .map(|&x| {
            if !x.is_finite() {
                prev = None;
                return None;
            }
            let ema = match prev {
                Some(p) => p + alpha * (x - p),
                None => x,
            };
            prev = Some(ema);
            Some(ema)
        })
        .collect()
}

/// EMA of an aligned column with undefined entries (e.g. a derived series).
pub fn calculate_ema_column(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let raw: Vec<f64> = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    calculate_ema(&raw, span)
}
