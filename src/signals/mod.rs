// =============================================================================
// Signals Module
// =============================================================================
//
// Everything that reads a finished indicator frame:
// - Crossover scanning (EMA pairs, price vs EMA, MACD vs signal / zero)
// - Latest-sample classification (RSI regime, bands, momentum, divergence)
// - Alert assembly with recency flags

pub mod alerts;
pub mod classifier;
pub mod crossover;

pub use alerts::{assemble_alerts, count_by_type, is_recent, AlertKind, AlertRecord, AlertSettings};
pub use classifier::{classify, ClassifierSettings, SignalSummary};
pub use crossover::{find_all_crosses, find_last_cross, CrossKind, CrossoverEvent};
