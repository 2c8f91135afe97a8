//! The combined run report: raw result plus derived statistics.

use crate::breakdown::{by_strength_bucket, by_symbol, BreakdownRow};
use crate::metrics::PerformanceMetrics;
use ladderlab_core::engine::RunResult;
use serde::Serialize;

/// A `RunResult` bundled with everything the analysis layer derives from it.
/// This is the unit handed to downstream consumers (export, comparison,
/// leaderboards).
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub result: RunResult,
    pub metrics: PerformanceMetrics,
    pub per_symbol: Vec<BreakdownRow>,
    pub per_strength: Vec<BreakdownRow>,
}

impl BacktestReport {
    pub fn new(result: RunResult) -> Self {
        let records = result.closed_records();
        let metrics = PerformanceMetrics::compute(
            &result.equity_curve,
            &records,
            result.initial_capital,
            result.final_capital,
            result.config.risk_free_rate,
        );
        let per_symbol = by_symbol(&records);
        let per_strength = by_strength_bucket(&records);
        tracing::info!(
            return_pct = metrics.total_return_pct,
            trades = metrics.total_trades,
            win_rate = metrics.win_rate,
            "report built"
        );
        Self {
            result,
            metrics,
            per_symbol,
            per_strength,
        }
    }
}
