//! Parameter sweeps — the one sanctioned form of parallelism.
//!
//! Each configuration runs a complete, independent backtest against the same
//! (shared, immutable) bar stream. Parallelism never crosses into a single
//! run: one run, one thread, deterministic replay.

use crate::report::BacktestReport;
use ladderlab_core::engine::{run_backtest, EngineConfig};
use ladderlab_core::error::EngineError;
use ladderlab_core::exits::ExitManagerRules;
use ladderlab_core::signals::SignalSource;
use ladderlab_core::stream::BarStream;
use rayon::prelude::*;

/// Run every config against the stream, in parallel, preserving input order.
pub fn run_sweep(
    stream: &BarStream,
    signal_source: &dyn SignalSource,
    exit_rules: &dyn ExitManagerRules,
    configs: &[EngineConfig],
) -> Vec<Result<BacktestReport, EngineError>> {
    tracing::info!(runs = configs.len(), "sweep starting");
    configs
        .par_iter()
        .map(|config| {
            run_backtest(stream, signal_source, exit_rules, config).map(BacktestReport::new)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::flat_stream;
    use ladderlab_core::exits::HoldRules;
    use ladderlab_core::signals::NullSignalSource;

    #[test]
    fn sweep_preserves_config_order() {
        let stream = flat_stream("SPY", 10, 100.0);
        let configs: Vec<EngineConfig> = [5_000.0, 10_000.0, 20_000.0]
            .iter()
            .map(|&capital| EngineConfig::new(capital, vec!["SPY".into()]))
            .collect();

        let reports = run_sweep(&stream, &NullSignalSource, &HoldRules, &configs);
        assert_eq!(reports.len(), 3);
        let capitals: Vec<f64> = reports
            .iter()
            .map(|r| r.as_ref().unwrap().result.initial_capital)
            .collect();
        assert_eq!(capitals, vec![5_000.0, 10_000.0, 20_000.0]);
    }

    #[test]
    fn sweep_surfaces_config_errors_per_run() {
        let stream = flat_stream("SPY", 10, 100.0);
        let good = EngineConfig::new(10_000.0, vec!["SPY".into()]);
        let mut bad = EngineConfig::new(10_000.0, vec!["SPY".into()]);
        bad.max_concurrent_positions = 0;

        let reports = run_sweep(&stream, &NullSignalSource, &HoldRules, &[good, bad]);
        assert!(reports[0].is_ok());
        assert!(reports[1].is_err());
    }

    #[test]
    fn sweep_runs_match_a_serial_run() {
        let stream = flat_stream("SPY", 10, 100.0);
        let config = EngineConfig::new(10_000.0, vec!["SPY".into()]);

        let serial = run_backtest(&stream, &NullSignalSource, &HoldRules, &config).unwrap();
        let swept = run_sweep(&stream, &NullSignalSource, &HoldRules, &[config]);
        let parallel = &swept[0].as_ref().unwrap().result;

        assert_eq!(
            serde_json::to_string(&serial).unwrap(),
            serde_json::to_string(parallel).unwrap()
        );
    }
}
