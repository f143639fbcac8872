// End-to-end: CSV directory -> batch analysis -> written report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use ta_alerts::analysis::{analyze_batch, BatchReport, SymbolOutcome};
use ta_alerts::market_data::CsvPriceSource;
use ta_alerts::report;
use ta_alerts::signals::AlertKind;
use ta_alerts::AnalysisConfig;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ta-alerts-it-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_csv(dir: &Path, symbol: &str, start: NaiveDate, closes: &[f64]) {
    let mut text = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n");
    for (i, c) in closes.iter().enumerate() {
        let d = start + Duration::days(i as i64);
        text.push_str(&format!("{d},{c},{c},{c},{c},{c},1000\n"));
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), text).unwrap();
}

#[test]
fn batch_over_csv_directory() {
    let data = scratch_dir("data");
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    // 19 flat days then a jump: every pair with 20 bars of history turns up
    // on the last day.
    let mut breakout = vec![10.0; 19];
    breakout.push(11.0);
    write_csv(&data, "JUMP", start, &breakout);

    let falling: Vec<f64> = (0..20).map(|i| 50.0 - i as f64).collect();
    write_csv(&data, "FALL", start, &falling);

    // Duplicate date: must fail without stopping the batch.
    std::fs::write(
        data.join("BAD.csv"),
        "date,close\n2024-01-01,1\n2024-01-01,2\n2024-01-02,3\n",
    )
    .unwrap();

    let mut config = AnalysisConfig::default();
    config.data_dir = data.clone();
    config.symbols = vec!["JUMP".into(), "BAD".into(), "FALL".into(), "GONE".into()];

    let end = start + Duration::days(19);
    let source = CsvPriceSource::new(&config.data_dir);
    let batch = analyze_batch(&source, end, &config);

    assert_eq!(batch.succeeded, 2);
    assert_eq!(batch.failed, 2);
    assert!(matches!(&batch.outcomes[1], SymbolOutcome::Failed { error, .. } if error.contains("duplicate")));
    assert!(matches!(&batch.outcomes[3], SymbolOutcome::Failed { symbol, .. } if symbol == "GONE"));

    let jump = batch.outcomes[0].report().unwrap();
    assert_eq!(jump.last_date, end);
    let golden: Vec<_> = jump
        .alerts
        .iter()
        .filter(|a| a.kind == AlertKind::GoldenCross)
        .collect();
    assert!(!golden.is_empty());
    assert!(golden.iter().all(|a| a.event_date == Some(end) && a.is_recent));

    let fall = batch.outcomes[2].report().unwrap();
    assert!(fall.alert_counts.contains_key(&AlertKind::RsiOversold));
    assert!(fall.signals.rsi.unwrap().value <= 30.0);

    let total: usize = jump.alerts.len() + fall.alerts.len();
    assert_eq!(batch.alert_counts.values().sum::<usize>(), total);

    let out = report::create_run_dir(&scratch_dir("out"), Utc::now()).unwrap();
    let path = report::write_batch_report(&out, &batch).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["succeeded"], 2);
    assert_eq!(json["outcomes"][1]["status"], "failed");
    assert_eq!(json["outcomes"][0]["symbol"], "JUMP");
}

#[tokio::test]
async fn blocking_task_per_symbol_keeps_configured_order() {
    let data = scratch_dir("tasks-data");
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let rising: Vec<f64> = (0..30).map(|i| 20.0 + i as f64).collect();
    write_csv(&data, "RISE", start, &rising);
    write_csv(&data, "FLAT", start, &[5.0; 30]);

    let mut config = AnalysisConfig::default();
    config.data_dir = data.clone();
    config.symbols = vec!["RISE".into(), "NONE".into(), "FLAT".into()];
    let config = Arc::new(config);
    let source = Arc::new(CsvPriceSource::new(&config.data_dir));
    let run_dir = report::create_run_dir(&scratch_dir("tasks-out"), Utc::now()).unwrap();
    let end = start + Duration::days(29);

    let mut handles = Vec::new();
    for symbol in config.symbols.iter().cloned() {
        let (config, source, run_dir) = (config.clone(), source.clone(), run_dir.clone());
        let task_symbol = symbol.clone();
        let handle = tokio::task::spawn_blocking(move || {
            report::analyze_and_write(source.as_ref(), &task_symbol, end, &config, &run_dir)
        });
        handles.push((symbol, handle));
    }

    let mut outcomes = Vec::new();
    for (symbol, handle) in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.symbol(), symbol);
        outcomes.push(outcome);
    }

    let batch = BatchReport::from_outcomes(end, outcomes);
    assert_eq!(batch.succeeded, 2);
    assert_eq!(batch.failed, 1);
    assert!(run_dir.join("RISE_analysis.csv").exists());
    assert!(run_dir.join("FLAT_analysis.csv").exists());
    assert!(!run_dir.join("NONE_analysis.csv").exists());
}
