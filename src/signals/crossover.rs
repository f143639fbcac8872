// =============================================================================
// Crossover Scanner
// =============================================================================
//
// Finds sign changes of (a - b) between two aligned series. A cross at index i
// means a moved from below b to above it (Up) or the reverse (Down) between
// samples i-1 and i.
//
// Ties: a sample with a == b sits "on the line". Leaving the line counts as a
// cross into the new side unless the last strictly-signed sample before the
// tie run was already on that side, so a touch-and-return is not a cross while
// a flat pair that breaks apart is.
//
// A tie run with no signed sample before it (it starts the series or follows
// an undefined sample) must span at least two samples to count. A single tied
// seed sample, such as every EMA equalling close[0], is not a cross on exit.
//
// Undefined samples (`None` or NaN on either side) break the comparison: no
// cross is reported across them.
//
// `find_last_cross` walks backward and returns the most recent event only.
// `find_all_crosses` walks forward and returns every event.
// =============================================================================

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::indicators::frame::{ema_name, IndicatorFrame, MACD_LINE, MACD_SIGNAL};

/// Direction of a crossover of `a` relative to `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossDirection {
    Up,
    Down,
}

/// A raw crossover position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cross {
    pub direction: CrossDirection,
    pub index: usize,
    pub date: NaiveDate,
}

fn side(a: &[Option<f64>], b: &[Option<f64>], i: usize) -> Option<Ordering> {
    let (x, y) = (a[i]?, b[i]?);
    x.partial_cmp(&y)
}

fn direction_of(side: Ordering) -> Option<CrossDirection> {
    match side {
        Ordering::Greater => Some(CrossDirection::Up),
        Ordering::Less => Some(CrossDirection::Down),
        Ordering::Equal => None,
    }
}

/// Minimum length of an unsigned tie run for leaving it to count as a cross.
const MIN_UNSIGNED_TIE_RUN: usize = 2;

/// Walk back over the tie run ending at `end`: the strictly-signed side before
/// it (`None` at the series start or an undefined sample) and the run length.
fn before_tie_run(a: &[Option<f64>], b: &[Option<f64>], end: usize) -> (Option<Ordering>, usize) {
    let mut ties = 0;
    for j in (0..=end).rev() {
        match side(a, b, j) {
            Some(Ordering::Equal) => ties += 1,
            Some(s) => return (Some(s), ties),
            None => break,
        }
    }
    (None, ties)
}

fn crossed_at(a: &[Option<f64>], b: &[Option<f64>], i: usize) -> Option<CrossDirection> {
    let cur = side(a, b, i)?;
    let dir = direction_of(cur)?;
    let prev = side(a, b, i - 1)?;
    let crossed = if prev == cur.reverse() {
        true
    } else if prev == Ordering::Equal {
        match before_tie_run(a, b, i - 1) {
            (Some(before), _) => before != cur,
            (None, ties) => ties >= MIN_UNSIGNED_TIE_RUN,
        }
    } else {
        false
    };
    crossed.then_some(dir)
}

fn scan_len(dates: &[NaiveDate], a: &[Option<f64>], b: &[Option<f64>]) -> usize {
    dates.len().min(a.len()).min(b.len())
}

/// Scan backward from the latest sample and return the most recent cross.
///
/// Returns `None` when no cross exists, including when either input has fewer
/// than two defined samples.
pub fn find_last_cross(
    dates: &[NaiveDate],
    a: &[Option<f64>],
    b: &[Option<f64>],
) -> Option<Cross> {
    let n = scan_len(dates, a, b);
    (1..n).rev().find_map(|i| {
        crossed_at(a, b, i).map(|direction| Cross {
            direction,
            index: i,
            date: dates[i],
        })
    })
}

/// Every cross in chronological order.
pub fn find_all_crosses(dates: &[NaiveDate], a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Cross> {
    let n = scan_len(dates, a, b);
    let mut out = Vec::new();
    // Most recent strict side since the last undefined sample.
    let mut run_side: Option<Ordering> = None;
    let mut prev_defined = false;
    let mut ties = 0;

    for i in 0..n {
        match side(a, b, i) {
            None => {
                run_side = None;
                prev_defined = false;
                ties = 0;
            }
            Some(Ordering::Equal) => {
                prev_defined = true;
                ties += 1;
            }
            Some(cur) => {
                let crossed = prev_defined
                    && match run_side {
                        Some(before) => before != cur,
                        None => ties >= MIN_UNSIGNED_TIE_RUN,
                    };
                if crossed {
                    if let Some(direction) = direction_of(cur) {
                        out.push(Cross {
                            direction,
                            index: i,
                            date: dates[i],
                        });
                    }
                }
                run_side = Some(cur);
                prev_defined = true;
                ties = 0;
            }
        }
    }
    out
}

/// Most recent cross of `a` through the constant `level`.
pub fn cross_against_constant(dates: &[NaiveDate], a: &[Option<f64>], level: f64) -> Option<Cross> {
    let line = vec![Some(level); a.len()];
    find_last_cross(dates, a, &line)
}

// =============================================================================
// Named crossover events over an indicator frame
// =============================================================================

/// Kind of crossover event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossKind {
    GoldenCross,
    DeathCross,
    PriceUpCross,
    PriceDownCross,
    MacdBullCross,
    MacdBearCross,
    MacdZeroUp,
    MacdZeroDown,
}

impl CrossKind {
    /// Whether the event points upward.
    pub fn is_bullish(self) -> bool {
        matches!(
            self,
            Self::GoldenCross | Self::PriceUpCross | Self::MacdBullCross | Self::MacdZeroUp
        )
    }
}

impl fmt::Display for CrossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GoldenCross => "GOLDEN_CROSS",
            Self::DeathCross => "DEATH_CROSS",
            Self::PriceUpCross => "PRICE_UP_CROSS",
            Self::PriceDownCross => "PRICE_DOWN_CROSS",
            Self::MacdBullCross => "MACD_BULL_CROSS",
            Self::MacdBearCross => "MACD_BEAR_CROSS",
            Self::MacdZeroUp => "MACD_ZERO_UP",
            Self::MacdZeroDown => "MACD_ZERO_DOWN",
        };
        f.write_str(s)
    }
}

/// A crossover found between two named series of one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossoverEvent {
    pub kind: CrossKind,
    pub occurred_at: NaiveDate,
    pub index: usize,
    /// (fast, slow) series names; the slow side may be `"zero"`.
    pub pair: (String, String),
}

/// Name used for the close price in crossover pairs.
pub const CLOSE: &str = "Close";
/// Name used for the zero line in crossover pairs.
pub const ZERO_LINE: &str = "zero";

fn event(cross: Cross, up: CrossKind, down: CrossKind, fast: &str, slow: &str) -> CrossoverEvent {
    CrossoverEvent {
        kind: match cross.direction {
            CrossDirection::Up => up,
            CrossDirection::Down => down,
        },
        occurred_at: cross.date,
        index: cross.index,
        pair: (fast.to_string(), slow.to_string()),
    }
}

/// An EMA scan needs at least `span` bars before its crosses mean anything.
fn require_history(frame: &IndicatorFrame, scan: &str, span: usize) -> Result<(), IndicatorError> {
    if frame.len() < span {
        return Err(IndicatorError::insufficient(scan, span, frame.len()));
    }
    Ok(())
}

/// Latest golden / death cross between `EMA_fast` and `EMA_slow`.
///
/// `InsufficientData` when the frame is shorter than the slower span.
pub fn scan_ema_pair(
    frame: &IndicatorFrame,
    fast: usize,
    slow: usize,
) -> Result<Option<CrossoverEvent>, IndicatorError> {
    let (fast_name, slow_name) = (ema_name(fast), ema_name(slow));
    require_history(frame, &format!("{fast_name}/{slow_name}"), fast.max(slow))?;
    let cross = find_last_cross(
        frame.series().dates(),
        frame.column(&fast_name)?,
        frame.column(&slow_name)?,
    );
    Ok(cross.map(|c| {
        event(c, CrossKind::GoldenCross, CrossKind::DeathCross, &fast_name, &slow_name)
    }))
}

/// Latest cross of the close price through `EMA_span`.
///
/// `InsufficientData` when the frame is shorter than `span`.
pub fn scan_price_ema(
    frame: &IndicatorFrame,
    span: usize,
) -> Result<Option<CrossoverEvent>, IndicatorError> {
    let ema = ema_name(span);
    require_history(frame, &format!("{CLOSE}/{ema}"), span)?;
    let closes: Vec<Option<f64>> = frame.series().closes().iter().copied().map(Some).collect();
    let cross = find_last_cross(frame.series().dates(), &closes, frame.column(&ema)?);
    Ok(cross.map(|c| event(c, CrossKind::PriceUpCross, CrossKind::PriceDownCross, CLOSE, &ema)))
}

/// Latest cross of the MACD line through its signal line.
pub fn scan_macd_signal(frame: &IndicatorFrame) -> Result<Option<CrossoverEvent>, IndicatorError> {
    let cross = find_last_cross(
        frame.series().dates(),
        frame.column(MACD_LINE)?,
        frame.column(MACD_SIGNAL)?,
    );
    Ok(cross.map(|c| {
        event(c, CrossKind::MacdBullCross, CrossKind::MacdBearCross, MACD_LINE, MACD_SIGNAL)
    }))
}

/// Latest cross of the MACD line through zero.
pub fn scan_macd_zero(frame: &IndicatorFrame) -> Result<Option<CrossoverEvent>, IndicatorError> {
    let cross = cross_against_constant(frame.series().dates(), frame.column(MACD_LINE)?, 0.0);
    Ok(cross.map(|c| event(c, CrossKind::MacdZeroUp, CrossKind::MacdZeroDown, MACD_LINE, ZERO_LINE)))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::ema::calculate_ema;
    use crate::indicators::{IndicatorSettings, MacdParams};
    use crate::market_data::PriceSeries;

    fn dates(n: usize) -> Vec<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .iter_days()
            .take(n)
            .collect()
    }

    fn some(v: &[f64]) -> Vec<Option<f64>> {
        v.iter().copied().map(Some).collect()
    }

    // ---- find_last_cross -------------------------------------------------

    #[test]
    fn simple_up_cross() {
        let a = some(&[1.0, 1.0, 3.0]);
        let b = some(&[2.0, 2.0, 2.0]);
        let d = dates(3);
        let c = find_last_cross(&d, &a, &b).unwrap();
        assert_eq!(c.direction, CrossDirection::Up);
        assert_eq!(c.index, 2);
        assert_eq!(c.date, d[2]);
    }

    #[test]
    fn returns_most_recent_only() {
        let a = some(&[1.0, 3.0, 1.0, 1.0]);
        let b = some(&[2.0, 2.0, 2.0, 2.0]);
        let c = find_last_cross(&dates(4), &a, &b).unwrap();
        assert_eq!(c.direction, CrossDirection::Down);
        assert_eq!(c.index, 2);
    }

    #[test]
    fn no_event_with_fewer_than_two_valid_samples() {
        let d = dates(3);
        assert_eq!(find_last_cross(&d, &[None, None, Some(1.0)], &some(&[0.0, 2.0, 0.0])), None);
        assert_eq!(find_last_cross(&d[..1], &some(&[1.0]), &some(&[2.0])), None);
        assert_eq!(find_last_cross(&[], &[], &[]), None);
    }

    #[test]
    fn undefined_sample_blocks_cross() {
        let a = vec![Some(1.0), None, Some(3.0)];
        let b = some(&[2.0, 2.0, 2.0]);
        assert_eq!(find_last_cross(&dates(3), &a, &b), None);
    }

    #[test]
    fn self_cross_is_no_event() {
        let a = some(&[1.0, 5.0, 2.0, 8.0, 3.0]);
        assert_eq!(find_last_cross(&dates(5), &a, &a), None);
        assert!(find_all_crosses(&dates(5), &a, &a).is_empty());
    }

    #[test]
    fn touch_and_return_is_not_a_cross() {
        let a = some(&[3.0, 2.0, 3.0]);
        let b = some(&[2.0, 2.0, 2.0]);
        assert_eq!(find_last_cross(&dates(3), &a, &b), None);
    }

    #[test]
    fn cross_through_tie_is_reported_on_exit() {
        let a = some(&[1.0, 2.0, 2.0, 3.0]);
        let b = some(&[2.0, 2.0, 2.0, 2.0]);
        let c = find_last_cross(&dates(4), &a, &b).unwrap();
        assert_eq!(c.direction, CrossDirection::Up);
        assert_eq!(c.index, 3);
    }

    #[test]
    fn flat_then_jump_ema5_over_ema20() {
        let mut closes = vec![10.0; 19];
        closes.push(11.0);
        let d = dates(closes.len());
        let fast = calculate_ema(&closes, 5);
        let slow = calculate_ema(&closes, 20);
        let c = find_last_cross(&d, &fast, &slow).unwrap();
        assert_eq!(c.direction, CrossDirection::Up);
        assert_eq!(c.date, d[19]);
    }

    // ---- find_all_crosses ------------------------------------------------

    #[test]
    fn all_crosses_match_last_cross() {
        let a = some(&[1.0, 3.0, 1.0, 2.0, 2.0, 3.0, 3.0, 2.0, 3.0]);
        let b = some(&[2.0; 9]);
        let d = dates(9);
        let all = find_all_crosses(&d, &a, &b);
        let idx: Vec<usize> = all.iter().map(|c| c.index).collect();
        // 1: up, 2: down, 5: up out of the tie; 7 touches, 8 returns (no cross)
        assert_eq!(idx, vec![1, 2, 5]);
        assert_eq!(all.last().copied(), find_last_cross(&d, &a, &b));
    }

    #[test]
    fn constant_line_cross() {
        let a = some(&[-1.0, -0.5, 0.5]);
        let c = cross_against_constant(&dates(3), &a, 0.0).unwrap();
        assert_eq!(c.direction, CrossDirection::Up);
        assert_eq!(c.index, 2);
    }

    // ---- frame scans -----------------------------------------------------

    fn frame(closes: &[f64]) -> IndicatorFrame {
        let series = PriceSeries::from_closes(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), closes)
            .unwrap();
        IndicatorFrame::compute(series, &IndicatorSettings::default())
    }

    #[test]
    fn macd_zero_up_on_first_rising_day() {
        let mut closes = vec![100.0; 30];
        closes.extend((1..=20).map(|i| 100.0 + 2.0 * i as f64));
        let f = frame(&closes);
        let ev = scan_macd_zero(&f).unwrap().unwrap();
        assert_eq!(ev.kind, CrossKind::MacdZeroUp);
        assert_eq!(ev.index, 30);
        assert_eq!(ev.occurred_at, f.series().dates()[30]);
        assert_eq!(ev.pair, (MACD_LINE.to_string(), ZERO_LINE.to_string()));
    }

    #[test]
    fn ema_pair_death_cross() {
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..15).map(|i| 139.0 - 4.0 * i as f64));
        let f = frame(&closes);
        let ev = scan_ema_pair(&f, 5, 10).unwrap().unwrap();
        assert_eq!(ev.kind, CrossKind::DeathCross);
        assert!(!ev.kind.is_bullish());
        assert_eq!(ev.pair, ("EMA_5".to_string(), "EMA_10".to_string()));
    }

    #[test]
    fn price_ema_up_cross() {
        let mut closes = vec![50.0; 10];
        closes.push(55.0);
        let f = frame(&closes);
        let ev = scan_price_ema(&f, 5).unwrap().unwrap();
        assert_eq!(ev.kind, CrossKind::PriceUpCross);
        assert_eq!(ev.index, 10);
        assert_eq!(ev.pair.0, CLOSE);
    }

    #[test]
    fn macd_signal_cross_on_reversal() {
        let mut closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..20).map(|i| 159.0 - 3.0 * i as f64));
        let f = frame(&closes);
        let ev = scan_macd_signal(&f).unwrap().unwrap();
        assert_eq!(ev.kind, CrossKind::MacdBearCross);
        assert!(ev.index >= 60);
    }

    #[test]
    fn ema_scans_need_span_history() {
        let mut closes = vec![10.0; 19];
        closes.push(11.0);
        let f = frame(&closes);

        let err = scan_ema_pair(&f, 50, 200).unwrap_err();
        assert_eq!(err, IndicatorError::insufficient("EMA_50/EMA_200", 200, 20));
        assert!(scan_ema_pair(&f, 20, 50).is_err());
        assert!(scan_price_ema(&f, 50).is_err());

        let ev = scan_ema_pair(&f, 5, 20).unwrap().unwrap();
        assert_eq!(ev.kind, CrossKind::GoldenCross);
        assert_eq!(ev.index, 19);
        assert!(scan_price_ema(&f, 20).unwrap().is_some());
    }

    #[test]
    fn seed_tie_is_not_a_cross() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let f = frame(&closes);
        assert_eq!(scan_ema_pair(&f, 20, 30).unwrap(), None);
        assert_eq!(scan_ema_pair(&f, 5, 10).unwrap(), None);
        assert_eq!(scan_price_ema(&f, 10).unwrap(), None);

        let b = some(&[2.0, 2.0, 2.0]);
        let d = dates(3);
        let seeded = some(&[2.0, 3.0, 4.0]);
        assert_eq!(find_last_cross(&d, &seeded, &b), None);
        assert!(find_all_crosses(&d, &seeded, &b).is_empty());

        let flat_then_up = some(&[2.0, 2.0, 3.0]);
        assert_eq!(find_last_cross(&d, &flat_then_up, &b).unwrap().index, 2);
        assert_eq!(find_all_crosses(&d, &flat_then_up, &b).len(), 1);
    }

    #[test]
    fn missing_column_is_an_error() {
        let series = PriceSeries::from_closes(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), &[1.0, 2.0])
            .unwrap();
        let f = IndicatorFrame::new(series).with_macd(MacdParams::default());
        assert!(matches!(scan_ema_pair(&f, 5, 10), Err(IndicatorError::MissingColumn(_))));
        assert!(scan_macd_signal(&f).is_ok());
    }
}
