//! Full pipeline: engine run → report, checking the derived statistics agree
//! with the raw result.

use chrono::{DateTime, TimeZone, Utc};
use ladderlab_core::domain::{Bar, Direction, EntryQuality, PlanConfig, Signal};
use ladderlab_core::engine::{run_backtest, EngineConfig};
use ladderlab_core::execution::ExecutionModel;
use ladderlab_core::exits::HoldRules;
use ladderlab_core::signals::SignalSource;
use ladderlab_core::stream::BarStream;
use ladderlab_runner::BacktestReport;
use std::collections::HashMap;

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 21, 0, 0).unwrap()
}

fn bar(day: u32, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        symbol: "TEST".into(),
        timestamp: ts(day),
        open: close,
        high,
        low,
        close,
        volume: 1_000_000.0,
        features: HashMap::from([
            ("atr".to_string(), 1.0),
            ("atr_percentage".to_string(), 2.0),
        ]),
    }
}

struct SignalOnDayOne;

impl SignalSource for SignalOnDayOne {
    fn evaluate(&self, symbol: &str, history: &[Bar]) -> Option<Signal> {
        if history.len() != 1 {
            return None;
        }
        let current = history.last()?;
        Some(Signal {
            symbol: symbol.into(),
            timestamp: current.timestamp,
            direction: Direction::Long,
            strength: 72,
            quality: EntryQuality::FullEntry,
            reference_price: current.close,
            context: HashMap::new(),
        })
    }
}

fn winning_run_report() -> BacktestReport {
    // Entry at 100 on bar 1, bar 3 sweeps the whole 1R..4R ladder.
    let bars = vec![
        bar(1, 101.0, 99.0, 100.0),
        bar(2, 101.0, 99.0, 100.0),
        bar(3, 110.0, 99.0, 100.0),
        bar(4, 101.0, 99.0, 100.0),
    ];
    let mut map = HashMap::new();
    map.insert("TEST".to_string(), bars);
    let stream = BarStream::new(map).unwrap();

    let mut config = EngineConfig::new(10_000.0, vec!["TEST".into()]);
    config.execution = ExecutionModel::frictionless();
    config.plan = PlanConfig {
        risk_per_trade_pct: 0.01,
        entry_ladder_fractions: [1.0, 0.0, 0.0],
        entry_spacing_atr_multiples: [0.5, 1.0],
        stop_loss_atr_multiple: 2.0,
        ..PlanConfig::default()
    };

    let result = run_backtest(&stream, &SignalOnDayOne, &HoldRules, &config).unwrap();
    BacktestReport::new(result)
}

#[test]
fn report_metrics_agree_with_the_result() {
    let report = winning_run_report();

    assert_eq!(report.metrics.total_trades, 1);
    assert_eq!(report.metrics.winning_trades, 1);
    assert_eq!(report.metrics.win_rate, 100.0);
    // One winner, no losers.
    assert!(report.metrics.profit_factor.is_infinite());
    assert!(report.metrics.total_return_pct > 0.0);
    assert!(
        (report.metrics.total_return_pct - report.result.total_return_pct()).abs() < 1e-12
    );
    assert_eq!(report.metrics.total_commissions, 0.0);
}

#[test]
fn report_breakdowns_cover_the_trade() {
    let report = winning_run_report();

    assert_eq!(report.per_symbol.len(), 1);
    assert_eq!(report.per_symbol[0].key, "TEST");
    assert_eq!(report.per_symbol[0].trades, 1);
    assert!((report.per_symbol[0].total_pnl - report.metrics.largest_win).abs() < 1e-9);

    // Strength 72 lands in the 65-74 bucket.
    assert_eq!(report.per_strength.len(), 1);
    assert_eq!(report.per_strength[0].key, "65-74");
}

#[test]
fn report_serializes_with_infinite_profit_factor() {
    let report = winning_run_report();
    // serde_json renders non-finite floats as null; the report must still
    // serialize cleanly.
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"profit_factor\":null"));
}
