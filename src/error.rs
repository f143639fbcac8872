// =============================================================================
// Error types shared across the analysis engine
// =============================================================================
//
// Malformed input (duplicate or out-of-order dates, non-finite closes) fails
// fast. Merely short history is reported as `InsufficientData` so that callers
// can skip one indicator and keep the rest of the report.

use chrono::NaiveDate;
use thiserror::Error;

/// Raised while turning raw bars into a [`crate::market_data::PriceSeries`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("insufficient data: need at least {required} bars, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("duplicate bar for date {0}")]
    DuplicateDate(NaiveDate),

    #[error("bars out of order: {current} follows {previous}")]
    UnsortedSeries {
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("close price on {0} is missing or not finite")]
    InvalidClose(NaiveDate),
}

/// Raised by the classifier and alert stages when an indicator cannot be read.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("not enough data for {indicator}: need {required} samples, got {available}")]
    InsufficientData {
        indicator: String,
        required: usize,
        available: usize,
    },

    #[error("indicator column {0} was not computed")]
    MissingColumn(String),
}

impl IndicatorError {
    pub fn insufficient(indicator: impl Into<String>, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            indicator: indicator.into(),
            required,
            available,
        }
    }
}

/// Raised by a [`crate::market_data::PriceSource`] implementation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("no price data for {0} in the requested range")]
    NoData(String),
}

/// Everything that can stop the analysis of a single symbol.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("invalid price series: {0}")]
    Series(#[from] SeriesError),

    #[error("indicator failure: {0}")]
    Indicator(#[from] IndicatorError),
}
