// =============================================================================
// Price Series — validated, date-ordered daily bars
// =============================================================================
//
// A `PriceSeries` can only be built through validation, so every value of the
// type holds these invariants:
//   - dates strictly increasing (no duplicates)
//   - every close is finite
//   - at least `MIN_BARS` bars
//
// Calendar gaps are preserved as-is. Windowed indicators count samples, not
// calendar days.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// A single daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Bar carrying only a close; open/high/low mirror it and volume is zero.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Validated daily price series, oldest bar first.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Minimum length for any differencing or crossover operation.
    pub const MIN_BARS: usize = 2;

    /// Normalise raw bars: sort ascending by date, then validate.
    ///
    /// Fails fast on duplicate dates or non-finite closes, and when fewer than
    /// [`MIN_BARS`](Self::MIN_BARS) bars remain.
    pub fn prepare(mut bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        bars.sort_by_key(|b| b.date);
        Self::validate(bars)
    }

    /// Build from bars that must already be in ascending date order.
    ///
    /// Unlike [`prepare`](Self::prepare) this never reorders; an out-of-order
    /// pair is reported as [`SeriesError::UnsortedSeries`].
    pub fn from_sorted(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        if let Some(w) = bars.windows(2).find(|w| w[1].date < w[0].date) {
            return Err(SeriesError::UnsortedSeries {
                previous: w[0].date,
                current: w[1].date,
            });
        }
        Self::validate(bars)
    }

    /// Convenience constructor for close-only data on consecutive indices.
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Result<Self, SeriesError> {
        let bars = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&c, d)| PriceBar::from_close(d, c))
            .collect();
        Self::from_sorted(bars)
    }

    fn validate(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        if let Some(w) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate(w[1].date));
        }
        if let Some(bad) = bars.iter().find(|b| !b.close.is_finite()) {
            return Err(SeriesError::InvalidClose(bad.date));
        }
        if bars.len() < Self::MIN_BARS {
            return Err(SeriesError::InsufficientData {
                required: Self::MIN_BARS,
                available: bars.len(),
            });
        }

        let dates = bars.iter().map(|b| b.date).collect();
        let closes = bars.iter().map(|b| b.close).collect();
        Ok(Self {
            bars,
            dates,
            closes,
        })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    /// The bar before the latest one. Exists because `len() >= MIN_BARS`.
    pub fn previous(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 2]
    }
}
