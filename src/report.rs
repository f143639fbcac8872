// =============================================================================
// Report Output — batch JSON, per-symbol CSVs, console summary
// =============================================================================
//
// Every run writes into its own `<output_dir>/<YYYYMMDD_HHMMSS>` folder:
//
//   batch_report.json       : the whole BatchReport (atomic tmp + rename)
//   <SYMBOL>_analysis.csv   : bars, every indicator column, close − EMA
//   <SYMBOL>_alerts.csv     : alert records, only when there are any
//
// Undefined indicator values are written as empty CSV cells.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info};

use crate::analysis::{analyze_symbol, BatchReport, SymbolOutcome};
use crate::indicators::IndicatorFrame;
use crate::market_data::PriceSource;
use crate::runtime_config::AnalysisConfig;
use crate::signals::AlertRecord;

pub const BATCH_REPORT_FILE: &str = "batch_report.json";

/// Create `<output_dir>/<timestamp>` and return its path.
pub fn create_run_dir(output_dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    let dir = output_dir.join(now.format("%Y%m%d_%H%M%S").to_string());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    Ok(dir)
}

/// Write the batch report as pretty JSON (write `.tmp`, then rename).
pub fn write_batch_report(dir: &Path, report: &BatchReport) -> Result<PathBuf> {
    let path = dir.join(BATCH_REPORT_FILE);
    let content =
        serde_json::to_string_pretty(report).context("failed to serialise batch report to JSON")?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &content)
        .with_context(|| format!("failed to write tmp report to {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path)
        .with_context(|| format!("failed to rename tmp report to {}", path.display()))?;

    info!(path = %path.display(), symbols = report.total(), "batch report written");
    Ok(path)
}

fn cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Write the full indicator frame of one symbol.
///
/// Columns: `date,open,high,low,close,volume`, every indicator column in name
/// order, then one `EMA_n_diff` (close − EMA) per EMA column.
pub fn write_frame_csv(dir: &Path, symbol: &str, frame: &IndicatorFrame) -> Result<PathBuf> {
    let path = dir.join(format!("{symbol}_analysis.csv"));
    let mut wtr = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let names: Vec<&str> = frame.column_names().collect();
    let emas: Vec<&str> = names.iter().copied().filter(|n| n.starts_with("EMA_")).collect();
    let columns = names
        .iter()
        .map(|n| frame.column(n))
        .collect::<Result<Vec<_>, _>>()?;
    let ema_columns = emas
        .iter()
        .map(|n| frame.column(n))
        .collect::<Result<Vec<_>, _>>()?;

    let mut header: Vec<String> = ["date", "open", "high", "low", "close", "volume"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(names.iter().map(|n| n.to_string()));
    header.extend(emas.iter().map(|n| format!("{n}_diff")));
    wtr.write_record(&header)?;

    for (i, bar) in frame.series().bars().iter().enumerate() {
        let mut row = vec![
            bar.date.to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ];
        row.extend(columns.iter().map(|col| cell(col[i])));
        row.extend(ema_columns.iter().map(|col| cell(col[i].map(|ema| bar.close - ema))));
        wtr.write_record(&row)?;
    }

    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(path)
}

/// Write the alert records of one symbol; nothing is written for no alerts.
pub fn write_alerts_csv(dir: &Path, symbol: &str, alerts: &[AlertRecord]) -> Result<Option<PathBuf>> {
    if alerts.is_empty() {
        return Ok(None);
    }
    let path = dir.join(format!("{symbol}_alerts.csv"));
    let mut wtr = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for alert in alerts {
        wtr.serialize(alert)?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(Some(path))
}

/// Analyse one symbol and write its CSV files into `run_dir`.
///
/// Write failures are logged; they do not turn a successful analysis into a
/// failed outcome.
pub fn analyze_and_write(
    source: &dyn PriceSource,
    symbol: &str,
    end: NaiveDate,
    config: &AnalysisConfig,
    run_dir: &Path,
) -> SymbolOutcome {
    let result = analyze_symbol(source, symbol, end, config);
    if let Ok(analysis) = &result {
        if config.write_frame_csv {
            if let Err(e) = write_frame_csv(run_dir, symbol, &analysis.frame) {
                error!(symbol, error = %e, "failed to write analysis CSV");
            }
        }
        if let Err(e) = write_alerts_csv(run_dir, symbol, &analysis.report.alerts) {
            error!(symbol, error = %e, "failed to write alerts CSV");
        }
    }
    SymbolOutcome::from_result(symbol, &result)
}

/// Log a per-symbol line plus the aggregate counts of a batch.
pub fn log_summary(report: &BatchReport) {
    for outcome in &report.outcomes {
        match outcome {
            SymbolOutcome::Analyzed(r) => {
                let recent: Vec<String> =
                    r.recent_alerts().map(|a| a.kind.to_string()).collect();
                info!(
                    symbol = %r.symbol,
                    last_date = %r.last_date,
                    close = format!("{:.2}", r.price.close),
                    change_pct = r.price.change_pct.map(|p| format!("{p:+.2}%")).unwrap_or_default(),
                    alerts = r.alerts.len(),
                    recent = ?recent,
                    "symbol summary"
                );
            }
            SymbolOutcome::Failed { symbol, error } => {
                info!(symbol = %symbol, error = %error, "symbol skipped");
            }
        }
    }

    for (kind, n) in &report.alert_counts {
        let recent = report.recent_alert_counts.get(kind).copied().unwrap_or(0);
        info!(alert = %kind, total = n, recent, "alert count");
    }
    info!(
        succeeded = report.succeeded,
        total = report.total(),
        "analysis complete"
    );
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_series;
    use crate::market_data::PriceBar;
    use crate::runtime_config::AnalysisConfig;
    use chrono::TimeZone;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ta-alerts-report-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .iter_days()
            .zip(closes)
            .map(|(d, &c)| PriceBar::from_close(d, c))
            .collect()
    }

    #[test]
    fn run_dir_is_timestamped() {
        let base = scratch_dir("run");
        let now = Utc.with_ymd_and_hms(2024, 6, 7, 8, 9, 10).unwrap();
        let dir = create_run_dir(&base, now).unwrap();
        assert!(dir.ends_with("20240607_080910"));
        assert!(dir.is_dir());
    }

    #[test]
    fn batch_report_written_atomically() {
        let dir = scratch_dir("batch");
        let config = AnalysisConfig::default();
        let result = analyze_series("AAA", bars(&[1.0, 2.0, 3.0]), &config);
        let outcome = SymbolOutcome::from_result("AAA", &result);
        let report = BatchReport::from_outcomes(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(), vec![outcome]);

        let path = write_batch_report(&dir, &report).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let text = std::fs::read_to_string(&path).unwrap();
        let back: BatchReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.succeeded, 1);
        assert_eq!(back.outcomes[0].symbol(), "AAA");
    }

    #[test]
    fn frame_csv_has_diff_columns() {
        let dir = scratch_dir("frame");
        let config = AnalysisConfig::default();
        let analysis = analyze_series("FRM", bars(&[10.0, 11.0, 12.0, 13.0]), &config).unwrap();

        let path = write_frame_csv(&dir, "FRM", &analysis.frame).unwrap();
        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(&header[..6], &["date", "open", "high", "low", "close", "volume"]);
        assert!(header.contains(&"EMA_5".to_string()));
        assert!(header.contains(&"EMA_5_diff".to_string()));
        assert!(header.contains(&"BB_width".to_string()));

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        let diff_idx = header.iter().position(|h| h == "EMA_5_diff").unwrap();
        let bb_idx = header.iter().position(|h| h == "BB_middle").unwrap();
        assert_eq!(&rows[0][diff_idx], "0");
        assert_eq!(&rows[3][bb_idx], "");
    }

    #[test]
    fn alerts_csv_only_when_alerts_exist() {
        let dir = scratch_dir("alerts");
        assert!(write_alerts_csv(&dir, "NONE", &[]).unwrap().is_none());

        let analysis = analyze_series(
            "DOWN",
            bars(&(0..30).map(|i| 100.0 - i as f64).collect::<Vec<_>>()),
            &AnalysisConfig::default(),
        )
        .unwrap();
        let path = write_alerts_csv(&dir, "DOWN", &analysis.report.alerts)
            .unwrap()
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("type,message,event_date,is_recent"));
        assert!(text.contains("price_below_ema"));
    }
}
