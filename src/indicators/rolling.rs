// =============================================================================
// Rolling-window helpers
// =============================================================================
//
// Sample-count windows over an aligned series. Output has the same length as
// the input; the first `period - 1` entries are `None` because the window is
// not yet full. A window containing a non-finite value yields `None`.

/// Simple moving average over `period` samples.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |window| {
        Some(window.iter().sum::<f64>() / window.len() as f64)
    })
}

/// Sample standard deviation (n − 1 denominator) over `period` samples.
///
/// Undefined for `period < 2`.
pub fn rolling_sample_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period < 2 {
        return vec![None; values.len()];
    }
    rolling(values, period, |window| {
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let ss = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
        Some((ss / (n - 1.0)).sqrt())
    })
}

fn rolling<F>(values: &[f64], period: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for end in period..=values.len() {
        let window = &values[end - period..end];
        if window.iter().all(|v| v.is_finite()) {
            out[end - 1] = f(window).filter(|v| v.is_finite());
        }
    }
    out
}
