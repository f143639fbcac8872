// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the alert
// engine. Every function returns a column aligned with its input, with `None`
// where the look-back window is not yet full or a ratio would divide by zero.

pub mod bollinger;
pub mod ema;
pub mod frame;
pub mod macd;
pub mod rolling;
pub mod rsi;

pub use bollinger::{calculate_bollinger, BollingerParams, BollingerSeries};
pub use ema::calculate_ema;
pub use frame::{ema_name, rsi_name, IndicatorFrame, IndicatorSettings};
pub use macd::{calculate_macd, MacdParams, MacdSeries};
pub use rsi::calculate_rsi;
