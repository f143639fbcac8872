use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ta_alerts::analysis::{BatchReport, SymbolOutcome};
use ta_alerts::market_data::CsvPriceSource;
use ta_alerts::report;
use ta_alerts::runtime_config::AnalysisConfig;

const DEFAULT_CONFIG_PATH: &str = "analysis_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TA_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = AnalysisConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AnalysisConfig::default()
    });
    config.apply_env_overrides();

    let now = Utc::now();
    let end = now.date_naive();
    info!(
        symbols = ?config.symbols,
        data_dir = %config.data_dir.display(),
        lookback_days = config.lookback_days,
        end = %end,
        "Starting technical analysis run"
    );

    let run_dir = report::create_run_dir(&config.output_dir, now)?;

    // ── 2. One blocking task per symbol ──────────────────────────────────
    let config = Arc::new(config);
    let source = Arc::new(CsvPriceSource::new(config.data_dir.clone()));

    let mut handles = Vec::with_capacity(config.symbols.len());
    for symbol in config.symbols.iter().cloned() {
        let config = config.clone();
        let source = source.clone();
        let run_dir = run_dir.clone();
        let task_symbol = symbol.clone();
        let handle = tokio::task::spawn_blocking(move || {
            report::analyze_and_write(source.as_ref(), &task_symbol, end, &config, &run_dir)
        });
        handles.push((symbol, handle));
    }

    // ── 3. Collect, in configured order ──────────────────────────────────
    let mut outcomes = Vec::with_capacity(handles.len());
    for (symbol, handle) in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Analysis task panicked");
                outcomes.push(SymbolOutcome::Failed {
                    symbol,
                    error: format!("task failed: {e}"),
                });
            }
        }
    }

    // ── 4. Report ────────────────────────────────────────────────────────
    let batch = BatchReport::from_outcomes(end, outcomes);
    let path = report::write_batch_report(&run_dir, &batch)?;
    report::log_summary(&batch);
    info!(dir = %run_dir.display(), report = %path.display(), "Results saved");

    Ok(())
}
