// =============================================================================
// Runtime Configuration — analysis settings with atomic save
// =============================================================================
//
// Every tunable parameter of a batch run lives here: the symbol list, where
// price files are read from and reports written to, the look-back window and
// the indicator / classifier / alert settings.
//
// Classifier and alert settings are flattened so their fields sit at the top
// level of the JSON file (`rsi_overbought`, `recency_window_days`, ...). All
// fields carry serde defaults, so `{}` is a valid config.
//
// Persistence uses an atomic tmp + rename pattern.
//
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::IndicatorSettings;
use crate::signals::{AlertSettings, ClassifierSettings};

/// Environment variable holding a comma-separated symbol list.
pub const SYMBOLS_ENV: &str = "TA_SYMBOLS";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    ["AAPL", "MSFT", "GOOGL", "AMZN", "META", "NVDA", "TSLA", "SOFI", "PLTR"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_lookback_days() -> i64 {
    365
}

fn default_true() -> bool {
    true
}

// =============================================================================
// AnalysisConfig
// =============================================================================

/// Top-level configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Symbols to analyse, upper-case.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Directory holding one `SYMBOL.csv` per symbol.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Parent directory for timestamped run folders.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Calendar days of history requested per symbol.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Write the per-symbol indicator frame as CSV alongside the report.
    #[serde(default = "default_true")]
    pub write_frame_csv: bool,

    #[serde(default)]
    pub indicators: IndicatorSettings,

    #[serde(flatten)]
    pub classifier: ClassifierSettings,

    #[serde(flatten)]
    pub alerts: AlertSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
            lookback_days: default_lookback_days(),
            write_frame_csv: true,
            indicators: IndicatorSettings::default(),
            classifier: ClassifierSettings::default(),
            alerts: AlertSettings::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read analysis config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse analysis config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            lookback_days = config.lookback_days,
            "analysis config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` (write `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise analysis config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "analysis config saved (atomic)");
        Ok(())
    }

    /// Replace `symbols` with a comma-separated list, if one is given.
    ///
    /// Entries are trimmed and upper-cased; an empty result leaves the
    /// current list untouched.
    pub fn apply_symbol_override(&mut self, raw: Option<&str>) {
        let Some(raw) = raw else {
            return;
        };
        let symbols: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !symbols.is_empty() {
            self.symbols = symbols;
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        let raw = std::env::var(SYMBOLS_ENV).ok();
        self.apply_symbol_override(raw.as_deref());
    }
}
