// =============================================================================
// ta-alerts — daily technical-analysis alert engine
// =============================================================================
//
// Library layout:
// - market_data     raw bars, validated price series, CSV price source
// - indicators      EMA / RSI / MACD / Bollinger columns in an IndicatorFrame
// - signals         crossover scanning, classification, alert assembly
// - analysis        per-symbol pipeline and batch runner
// - runtime_config  JSON configuration with env overrides
// - report          JSON / CSV output and console summary

pub mod analysis;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod report;
pub mod runtime_config;
pub mod signals;

pub use analysis::{analyze_batch, analyze_series, analyze_symbol, BatchReport, SymbolOutcome, SymbolReport};
pub use error::{AnalysisError, FetchError, IndicatorError, SeriesError};
pub use runtime_config::AnalysisConfig;
