// =============================================================================
// Market Data Module
// =============================================================================
//
// Raw bar supply (`PriceSource`) and the validated series the engine runs on.

pub mod csv_source;
pub mod price_series;

pub use csv_source::{CsvPriceSource, PriceSource};
pub use price_series::{PriceBar, PriceSeries};
