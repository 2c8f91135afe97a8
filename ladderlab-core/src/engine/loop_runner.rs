//! The event loop — chronological bar-by-bar simulation.
//!
//! Per event, the pipeline runs in a fixed order:
//!
//! 1. Mark-to-market the symbol's active trade
//! 2. Evaluate pending limit entries (levels 2–3)
//! 3. Stop-loss check
//! 4. Exit-manager check
//! 5. Take-profit ladder
//! 6. New-signal evaluation
//! 7. Equity update
//!
//! Stop-loss precedence is an invariant: a bar that crosses both the stop and
//! a take-profit resolves as a stop-out. Step 2 runs before step 3 so fills
//! that change the average entry are reflected in same-bar exits. The loop is
//! single-threaded and strictly sequential; identical inputs produce
//! identical results.

use crate::domain::{build_plan, Bar, Direction, TradeId};
use crate::engine::account::{Account, EquityPoint};
use crate::engine::config::EngineConfig;
use crate::error::{EngineError, TradeError};
use crate::execution::ExecutionModel;
use crate::exits::ExitManagerRules;
use crate::fingerprint::ConfigHash;
use crate::manager::TradeManager;
use crate::signals::SignalSource;
use crate::stream::{BarEvent, BarStream};
use crate::trade::{ExitKind, ExitReason, Trade, TradeRecord};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Everything a run produces. No files, no console output — this structure is
/// the complete record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub equity_curve: Vec<EquityPoint>,
    /// Every trade, each with its full execution list. All are closed by the
    /// end-of-stream sweep.
    pub trades: Vec<Trade>,
    /// Exact snapshot of the configuration that produced this result.
    pub config: EngineConfig,
    pub config_hash: ConfigHash,
}

impl RunResult {
    pub fn closed_records(&self) -> Vec<TradeRecord> {
        self.trades
            .iter()
            .filter(|trade| trade.is_closed())
            .map(Trade::record)
            .collect()
    }

    pub fn total_return_pct(&self) -> f64 {
        (self.final_capital - self.initial_capital) / self.initial_capital * 100.0
    }
}

/// Run a backtest over a validated stream.
///
/// The stream supplies chronology; the signal source and exit rules supply
/// strategy; the config supplies policy. Load and config errors refuse the
/// run before the first bar; trade-level precondition violations abort it
/// with the offending bar's timestamp and symbol.
pub fn run_backtest(
    stream: &BarStream,
    signal_source: &dyn SignalSource,
    exit_rules: &dyn ExitManagerRules,
    config: &EngineConfig,
) -> Result<RunResult, EngineError> {
    config.validate()?;

    let universe: HashSet<&str> = config.symbols.iter().map(String::as_str).collect();
    let model = config.execution.clone();
    let mut account = Account::new(config.initial_capital);
    let mut manager = TradeManager::new(model.clone());
    let mut last_timestamp: Option<DateTime<Utc>> = None;

    tracing::info!(
        symbols = config.symbols.len(),
        events = stream.event_count(),
        capital = config.initial_capital,
        "backtest starting"
    );

    for event in stream.iter() {
        let bar = stream.bar(event);
        let symbol = stream.symbol(event.symbol_index);
        let timestamp = event.timestamp;
        last_timestamp = Some(timestamp);

        if let Some(trade_id) = manager.active_trade_id(symbol) {
            // Step 1: mark-to-market.
            manager.mark_trade(trade_id, bar.close);

            // Step 2: pending limit entries.
            fill_pending_entries(&mut manager, &mut account, trade_id, bar, &model, timestamp)
                .map_err(at(timestamp, symbol))?;

            // Step 3: stop loss, ahead of everything else.
            check_stop_loss(&mut manager, &mut account, trade_id, bar, &model, timestamp)
                .map_err(at(timestamp, symbol))?;

            // Step 4: exit manager.
            if config.enable_exit_manager {
                check_exit_manager(
                    &mut manager,
                    &mut account,
                    trade_id,
                    bar,
                    exit_rules,
                    &model,
                    timestamp,
                )
                .map_err(at(timestamp, symbol))?;
            }

            // Step 5: take-profit ladder, in order.
            check_take_profits(&mut manager, &mut account, trade_id, bar, &model, timestamp)
                .map_err(at(timestamp, symbol))?;
        }

        // Step 6: new-signal evaluation.
        if universe.contains(symbol)
            && !manager.has_active(symbol)
            && manager.active_count() < config.max_concurrent_positions
        {
            evaluate_new_signal(
                &mut manager,
                &mut account,
                stream,
                event,
                signal_source,
                config,
                &model,
            )?;
        }

        // Step 7: equity update.
        account.record_equity(timestamp, manager.open_unrealized_pnl());
    }

    // End of stream: flatten whatever is still open at each symbol's last
    // close, then sample equity once more so the curve ends at final capital.
    let swept = close_remaining(&mut manager, &mut account, stream, &model)?;
    if swept > 0 {
        if let Some(timestamp) = last_timestamp {
            account.record_equity(timestamp, manager.open_unrealized_pnl());
        }
    }

    let final_capital = account.current_capital;
    tracing::info!(
        final_capital,
        trades = manager.trades().len(),
        "backtest complete"
    );

    Ok(RunResult {
        initial_capital: account.initial_capital,
        final_capital,
        equity_curve: account.equity_curve,
        trades: manager.into_trades(),
        config: config.clone(),
        config_hash: ConfigHash::of(config),
    })
}

/// Attach bar context to a trade-level precondition failure.
fn at(
    timestamp: DateTime<Utc>,
    symbol: &str,
) -> impl FnOnce(TradeError) -> EngineError + '_ {
    move |source| EngineError::Trade {
        timestamp,
        symbol: symbol.to_string(),
        source,
    }
}

/// Step 2: execute entry levels 2–3 whose limit prices the bar traded
/// through. Longs fill when the low reaches the level, shorts when the high
/// does. A fill this bar counts toward exits evaluated later this bar.
fn fill_pending_entries(
    manager: &mut TradeManager,
    account: &mut Account,
    trade_id: TradeId,
    bar: &Bar,
    model: &ExecutionModel,
    timestamp: DateTime<Utc>,
) -> Result<(), TradeError> {
    for level in 2..=3u8 {
        let (direction, target, ready) = {
            let trade = match manager.get_trade(trade_id) {
                Some(trade) => trade,
                None => return Ok(()),
            };
            if trade.is_closed() {
                return Ok(());
            }
            let index = (level - 1) as usize;
            let ready = !trade.entries[index].executed && trade.entries[index - 1].executed;
            (trade.direction, trade.plan.entries[index].price, ready)
        };
        if !ready {
            continue;
        }

        let crossed = match direction {
            Direction::Long => bar.low <= target,
            Direction::Short => bar.high >= target,
        };
        if !crossed {
            continue;
        }

        let slippage = model.slippage(target, bar);
        let fill = model.entry_fill(target, direction, slippage);
        if let Some(receipt) =
            manager.execute_entry(trade_id, level, fill, timestamp, slippage, None)?
        {
            account.debit_commission(receipt.commission);
        }
    }
    Ok(())
}

/// Step 3: the highest-priority exit. Fills at the stop price itself (plus
/// adverse slippage), not the bar extreme.
fn check_stop_loss(
    manager: &mut TradeManager,
    account: &mut Account,
    trade_id: TradeId,
    bar: &Bar,
    model: &ExecutionModel,
    timestamp: DateTime<Utc>,
) -> Result<(), TradeError> {
    let (direction, stop_price, open) = {
        let trade = match manager.get_trade(trade_id) {
            Some(trade) => trade,
            None => return Ok(()),
        };
        (trade.direction, trade.plan.stop_loss, !trade.is_closed())
    };
    if !open {
        return Ok(());
    }

    let crossed = match direction {
        Direction::Long => bar.low <= stop_price,
        Direction::Short => bar.high >= stop_price,
    };
    if !crossed {
        return Ok(());
    }

    let slippage = model.slippage_flat(stop_price);
    let fill = model.exit_fill(stop_price, direction, slippage);
    if let Some(receipt) = manager.execute_exit(
        trade_id,
        ExitKind::StopLoss,
        fill,
        timestamp,
        ExitReason::StopLoss,
        slippage,
    )? {
        account.apply_realized(receipt.pnl);
    }
    Ok(())
}

/// Step 4: ask the exit rules whether the position has deteriorated. Acts on
/// `Recommended` and `Urgent`; `Watch` is recorded on the trade but ignored.
fn check_exit_manager(
    manager: &mut TradeManager,
    account: &mut Account,
    trade_id: TradeId,
    bar: &Bar,
    exit_rules: &dyn ExitManagerRules,
    model: &ExecutionModel,
    timestamp: DateTime<Utc>,
) -> Result<(), TradeError> {
    let decision = {
        let trade = match manager.get_trade(trade_id) {
            Some(trade) => trade,
            None => return Ok(()),
        };
        if trade.is_closed() {
            return Ok(());
        }
        exit_rules.evaluate(
            &trade.signal,
            bar,
            trade.avg_entry_price,
            bar.close,
            trade.bars_held,
        )
    };

    if decision.should_exit {
        if let Some(trade) = manager.get_trade_mut(trade_id) {
            trade.exit_manager_urgency = Some(decision.urgency);
            trade.exit_manager_score = decision.score;
            trade.exit_manager_reason = decision.reason.clone();
        }
    }
    if !decision.is_actionable() {
        return Ok(());
    }

    let direction = match manager.get_trade(trade_id) {
        Some(trade) => trade.direction,
        None => return Ok(()),
    };
    let slippage = model.slippage(bar.close, bar);
    let fill = model.exit_fill(bar.close, direction, slippage);
    if let Some(receipt) = manager.execute_exit(
        trade_id,
        ExitKind::ExitManager,
        fill,
        timestamp,
        ExitReason::ExitManager,
        slippage,
    )? {
        account.apply_realized(receipt.pnl);
    }
    Ok(())
}

/// Step 5: walk the ladder TP1 → TP4. A level fires only when its
/// predecessor has executed and the bar traded through its price; one wide
/// bar can sweep several levels, each at its own target. Levels fill at the
/// target price, not the extreme.
fn check_take_profits(
    manager: &mut TradeManager,
    account: &mut Account,
    trade_id: TradeId,
    bar: &Bar,
    model: &ExecutionModel,
    timestamp: DateTime<Utc>,
) -> Result<(), TradeError> {
    const LADDER: [(ExitKind, ExitReason); 4] = [
        (ExitKind::TakeProfit1, ExitReason::TakeProfit1),
        (ExitKind::TakeProfit2, ExitReason::TakeProfit2),
        (ExitKind::TakeProfit3, ExitReason::TakeProfit3),
        (ExitKind::TakeProfit4, ExitReason::TakeProfit4),
    ];

    for (index, (kind, reason)) in LADDER.iter().enumerate() {
        let (direction, target, already_done, prerequisite_met) = {
            let trade = match manager.get_trade(trade_id) {
                Some(trade) => trade,
                None => return Ok(()),
            };
            if trade.is_closed() {
                return Ok(());
            }
            (
                trade.direction,
                trade.plan.exits[index].price,
                trade.exits[index].executed,
                index == 0 || trade.exits[index - 1].executed,
            )
        };
        if already_done {
            // Filled on an earlier bar; the next rung is the live one.
            continue;
        }
        if !prerequisite_met {
            return Ok(());
        }

        let crossed = match direction {
            Direction::Long => bar.high >= target,
            Direction::Short => bar.low <= target,
        };
        if !crossed {
            // Targets are monotone; higher levels cannot have crossed either.
            return Ok(());
        }

        let slippage = model.slippage_flat(target);
        let fill = model.exit_fill(target, direction, slippage);
        if let Some(receipt) =
            manager.execute_exit(trade_id, *kind, fill, timestamp, *reason, slippage)?
        {
            account.apply_realized(receipt.pnl);
        }
    }
    Ok(())
}

/// Step 6: run the signal source over the history ending at this bar, gate on
/// strength and quality, size a plan, and open with an immediate level-1 fill
/// at the close.
fn evaluate_new_signal(
    manager: &mut TradeManager,
    account: &mut Account,
    stream: &BarStream,
    event: BarEvent,
    signal_source: &dyn SignalSource,
    config: &EngineConfig,
    model: &ExecutionModel,
) -> Result<(), EngineError> {
    let bar = stream.bar(event);
    let symbol = stream.symbol(event.symbol_index);
    let timestamp = event.timestamp;

    let signal = match signal_source.evaluate(symbol, stream.history(event)) {
        Some(signal) => signal,
        None => return Ok(()),
    };

    // Soft gates: weak or low-quality signals are simply ignored.
    if signal.strength < config.min_signal_strength || signal.quality < config.min_entry_quality {
        return Ok(());
    }

    let atr = bar
        .feature("atr")
        .ok_or_else(|| EngineError::MissingFeature {
            timestamp,
            symbol: symbol.to_string(),
            feature: "atr".to_string(),
        })?;

    let plan = match build_plan(&signal, account.current_capital, atr, &config.plan) {
        Some(plan) if plan.total_shares > 0 => plan,
        _ => return Ok(()),
    };

    let direction = signal.direction;
    let trade_id = manager
        .open_trade(signal, plan)
        .map_err(at(timestamp, symbol))?;

    let slippage = model.slippage(bar.close, bar);
    let fill = model.entry_fill(bar.close, direction, slippage);
    if let Some(receipt) = manager
        .execute_entry(trade_id, 1, fill, timestamp, slippage, None)
        .map_err(at(timestamp, symbol))?
    {
        account.debit_commission(receipt.commission);
    }
    Ok(())
}

/// End-of-stream sweep: every remaining active trade closes at its symbol's
/// last seen close with reason `EndOfBacktest`. Returns how many were swept.
fn close_remaining(
    manager: &mut TradeManager,
    account: &mut Account,
    stream: &BarStream,
    model: &ExecutionModel,
) -> Result<usize, EngineError> {
    let open_ids: Vec<TradeId> = manager
        .active_trades()
        .map(|trade| trade.id)
        .collect();

    let mut swept = 0;
    for trade_id in open_ids {
        let (symbol, direction) = {
            let trade = match manager.get_trade(trade_id) {
                Some(trade) => trade,
                None => continue,
            };
            (trade.symbol.clone(), trade.direction)
        };
        let last_bar = match stream.bars(&symbol).and_then(|bars| bars.last()) {
            Some(bar) => bar,
            None => continue,
        };

        let slippage = model.slippage(last_bar.close, last_bar);
        let fill = model.exit_fill(last_bar.close, direction, slippage);
        let receipt = manager
            .execute_exit(
                trade_id,
                ExitKind::TakeProfit4,
                fill,
                last_bar.timestamp,
                ExitReason::EndOfBacktest,
                slippage,
            )
            .map_err(at(last_bar.timestamp, &symbol))?;
        if let Some(receipt) = receipt {
            account.apply_realized(receipt.pnl);
            swept += 1;
            tracing::debug!(%symbol, pnl = receipt.pnl, "swept open position at end of stream");
        }
    }
    Ok(swept)
}
