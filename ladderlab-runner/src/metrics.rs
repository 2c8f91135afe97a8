//! Performance metrics — pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve and/or closed-trade list in,
//! scalar out. No dependencies on the engine loop.

use ladderlab_core::engine::EquityPoint;
use ladderlab_core::trade::TradeRecord;
use serde::{Deserialize, Serialize};

/// Aggregate performance metrics for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with positive total P&L.
    pub win_rate: f64,
    /// Gross winner P&L over absolute gross loser P&L; infinite with no losers.
    pub profit_factor: f64,
    pub avg_win: f64,
    /// Average loss magnitude (positive number).
    pub avg_loss: f64,
    pub largest_win: f64,
    /// Most negative single-trade P&L (non-positive number).
    pub largest_loss: f64,
    /// Largest peak-to-trough equity decline, percent of the peak, in [0, 100].
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub total_commissions: f64,
    pub avg_bars_held: f64,
}

impl PerformanceMetrics {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[TradeRecord],
        initial_capital: f64,
        final_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        let winners = trades.iter().filter(|t| t.is_winner()).count();
        Self {
            total_return_pct: total_return_pct(initial_capital, final_capital),
            total_trades: trades.len(),
            winning_trades: winners,
            losing_trades: trades.len() - winners,
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            largest_win: largest_win(trades),
            largest_loss: largest_loss(trades),
            max_drawdown_pct: max_drawdown_pct(equity_curve),
            sharpe_ratio: sharpe_ratio(equity_curve, risk_free_rate),
            total_commissions: trades.iter().map(|t| t.total_commissions).sum(),
            avg_bars_held: avg_bars_held(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Net return as a percentage of initial capital.
pub fn total_return_pct(initial_capital: f64, final_capital: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    (final_capital - initial_capital) / initial_capital * 100.0
}

/// Percent of trades that were winners (total P&L strictly positive).
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Gross profits over gross losses. Infinite when there are profits and no
/// losses, 0.0 for an empty or all-flat trade list.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.total_pnl > 0.0)
        .map(|t| t.total_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.total_pnl < 0.0)
        .map(|t| t.total_pnl.abs())
        .sum();

    if gross_loss == 0.0 {
        return if gross_profit > 0.0 { f64::INFINITY } else { 0.0 };
    }
    gross_profit / gross_loss
}

pub fn avg_win(trades: &[TradeRecord]) -> f64 {
    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_winner())
        .map(|t| t.total_pnl)
        .collect();
    if wins.is_empty() {
        return 0.0;
    }
    wins.iter().sum::<f64>() / wins.len() as f64
}

/// Average loss magnitude, reported positive.
pub fn avg_loss(trades: &[TradeRecord]) -> f64 {
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| !t.is_winner())
        .map(|t| t.total_pnl.abs())
        .collect();
    if losses.is_empty() {
        return 0.0;
    }
    losses.iter().sum::<f64>() / losses.len() as f64
}

pub fn largest_win(trades: &[TradeRecord]) -> f64 {
    trades
        .iter()
        .filter(|t| t.is_winner())
        .map(|t| t.total_pnl)
        .fold(0.0, f64::max)
}

/// Most negative single-trade P&L; 0.0 when every trade was flat or positive.
pub fn largest_loss(trades: &[TradeRecord]) -> f64 {
    trades
        .iter()
        .filter(|t| t.total_pnl < 0.0)
        .map(|t| t.total_pnl)
        .fold(0.0, f64::min)
}

/// Largest peak-to-trough decline over the equity curve, as a percent of the
/// running peak. Always in [0, 100].
pub fn max_drawdown_pct(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let dd = (peak - point.equity) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized Sharpe ratio from per-step equity returns.
///
/// `(mean(r) - rf/252) / std(r) * sqrt(252)`; 0.0 when the curve has fewer
/// than two points or zero variance.
pub fn sharpe_ratio(equity_curve: &[EquityPoint], risk_free_rate: f64) -> f64 {
    let returns = step_returns(equity_curve);
    if returns.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean - risk_free_rate / 252.0) / std * (252.0_f64).sqrt()
}

pub fn avg_bars_held(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.bars_held as f64).sum::<f64>() / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-step fractional returns of the equity curve.
pub fn step_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                (w[1].equity - w[0].equity) / w[0].equity
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
