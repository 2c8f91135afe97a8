//! Trade — the state machine for one scaled position.
//!
//! A trade walks `Pending → Partial → Active → Closing → Closed*`. Entries
//! execute strictly in ladder order; exits follow the take-profit ladder, the
//! stop, or the exit manager. Every fill appends an immutable `Execution`,
//! re-derives the cost-weighted average entry, and keeps the realized /
//! unrealized split current.
//!
//! Operations on a closed trade are silent no-ops (`Ok(None)`), so
//! end-of-stream sweeps can over-request closure safely. Out-of-order level
//! operations are hard `TradeError`s: they mean a driver bug, not a market
//! condition.

use crate::domain::{Direction, Execution, PositionPlan, Signal, TradeAction, TradeId};
use crate::error::TradeError;
use crate::execution::ExecutionModel;
use crate::exits::ExitUrgency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    /// Created, no entry filled yet.
    Pending,
    /// At least one entry filled, ladder not complete.
    Partial,
    /// All three entry levels filled.
    Active,
    /// Some holdings exited, remainder still open.
    Closing,
    ClosedWin,
    ClosedLoss,
    ClosedExitManager,
    ClosedEnd,
}

impl TradeStatus {
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            TradeStatus::ClosedWin
                | TradeStatus::ClosedLoss
                | TradeStatus::ClosedExitManager
                | TradeStatus::ClosedEnd
        )
    }
}

/// Why the trade ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    None,
    StopLoss,
    TakeProfit1,
    TakeProfit2,
    TakeProfit3,
    TakeProfit4,
    ExitManager,
    EndOfBacktest,
}

/// Which exit rule is firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitKind {
    TakeProfit1,
    TakeProfit2,
    TakeProfit3,
    TakeProfit4,
    StopLoss,
    ExitManager,
}

impl ExitKind {
    fn tp_index(&self) -> Option<usize> {
        match self {
            ExitKind::TakeProfit1 => Some(0),
            ExitKind::TakeProfit2 => Some(1),
            ExitKind::TakeProfit3 => Some(2),
            ExitKind::TakeProfit4 => Some(3),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ExitKind::TakeProfit1 => "TP1",
            ExitKind::TakeProfit2 => "TP2",
            ExitKind::TakeProfit3 => "TP3",
            ExitKind::TakeProfit4 => "TP4",
            ExitKind::StopLoss => "SL",
            ExitKind::ExitManager => "EXIT_MANAGER",
        }
    }
}

/// Bookkeeping for one entry level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EntryFill {
    pub executed: bool,
    pub price: f64,
    pub shares: u64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Bookkeeping for one exit level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExitFill {
    pub executed: bool,
    pub price: f64,
    pub shares: u64,
    /// Commission-net P&L realized by this level.
    pub pnl: f64,
}

/// What an accepted entry did, for the caller's cash ledger.
#[derive(Debug, Clone, Copy)]
pub struct EntryReceipt {
    pub shares: u64,
    pub commission: f64,
}

/// What an accepted exit did. `pnl` is net of this fill's commission.
#[derive(Debug, Clone, Copy)]
pub struct ExitReceipt {
    pub shares: u64,
    pub pnl: f64,
    pub commission: f64,
    pub closed_trade: bool,
}

/// One in-flight scaled position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: String,
    pub direction: Direction,
    pub signal: Signal,
    pub plan: PositionPlan,

    pub signal_time: DateTime<Utc>,
    pub first_entry_time: Option<DateTime<Utc>>,
    pub last_exit_time: Option<DateTime<Utc>>,

    pub status: TradeStatus,
    pub entries: [EntryFill; 3],
    pub exits: [ExitFill; 4],

    pub stop_loss_hit: bool,
    pub stop_loss_price: Option<f64>,
    pub stop_loss_pnl: f64,

    pub exit_manager_triggered: bool,
    pub exit_manager_urgency: Option<ExitUrgency>,
    pub exit_manager_score: f64,
    pub exit_manager_reason: String,

    /// Signed: positive long, negative short.
    pub current_shares: i64,
    pub avg_entry_price: f64,

    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_commissions: f64,
    pub total_slippage: f64,

    /// Best in-trade move, percent of average entry.
    pub max_favorable_excursion: f64,
    /// Worst in-trade move, percent of average entry (non-positive).
    pub max_adverse_excursion: f64,
    pub bars_held: u64,

    pub exit_reason: ExitReason,
    pub executions: Vec<Execution>,
}

impl Trade {
    pub fn new(id: TradeId, signal: Signal, plan: PositionPlan) -> Self {
        Self {
            id,
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            signal_time: signal.timestamp,
            signal,
            plan,
            first_entry_time: None,
            last_exit_time: None,
            status: TradeStatus::Pending,
            entries: [EntryFill::default(); 3],
            exits: [ExitFill::default(); 4],
            stop_loss_hit: false,
            stop_loss_price: None,
            stop_loss_pnl: 0.0,
            exit_manager_triggered: false,
            exit_manager_urgency: None,
            exit_manager_score: 0.0,
            exit_manager_reason: String::new(),
            current_shares: 0,
            avg_entry_price: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_commissions: 0.0,
            total_slippage: 0.0,
            max_favorable_excursion: 0.0,
            max_adverse_excursion: 0.0,
            bars_held: 0,
            exit_reason: ExitReason::None,
            executions: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Unsigned share count currently held.
    pub fn held_shares(&self) -> u64 {
        self.current_shares.unsigned_abs()
    }

    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl
    }

    /// Execute an entry ladder level.
    ///
    /// Accepted only when the level has not executed and the prior level has;
    /// a skipped prior level is a driver bug and errors. Returns `Ok(None)`
    /// when the trade is closed, the level already executed, or the level has
    /// no shares allocated.
    pub fn execute_entry(
        &mut self,
        level: u8,
        price: f64,
        timestamp: DateTime<Utc>,
        slippage: f64,
        model: &ExecutionModel,
        shares_override: Option<u64>,
    ) -> Result<Option<EntryReceipt>, TradeError> {
        if self.is_closed() {
            return Ok(None);
        }
        let index = match level {
            1..=3 => (level - 1) as usize,
            _ => {
                return Err(TradeError::EntryOutOfOrder {
                    level,
                    required: 1,
                })
            }
        };
        if self.entries[index].executed {
            return Ok(None);
        }
        if index > 0 && !self.entries[index - 1].executed {
            return Err(TradeError::EntryOutOfOrder {
                level,
                required: level - 1,
            });
        }

        let shares = shares_override.unwrap_or(self.plan.entries[index].shares);
        if shares == 0 {
            return Ok(None);
        }

        let commission = model.commission(shares);
        let action = match self.direction {
            Direction::Long => TradeAction::Buy,
            Direction::Short => TradeAction::SellShort,
        };
        self.executions.push(Execution {
            timestamp,
            action,
            price,
            shares,
            commission,
            slippage,
        });
        self.total_commissions += commission;
        self.total_slippage += slippage * shares as f64;

        let held_before = self.held_shares();
        self.current_shares += self.direction.sign() * shares as i64;
        let held_after = self.held_shares();
        self.avg_entry_price =
            (held_before as f64 * self.avg_entry_price + shares as f64 * price) / held_after as f64;

        self.entries[index] = EntryFill {
            executed: true,
            price,
            shares,
            timestamp: Some(timestamp),
        };
        if self.first_entry_time.is_none() {
            self.first_entry_time = Some(timestamp);
        }

        self.status = if self.entries.iter().all(|entry| entry.executed) {
            TradeStatus::Active
        } else {
            TradeStatus::Partial
        };

        tracing::debug!(
            trade = %self.id,
            symbol = %self.symbol,
            level,
            price,
            shares,
            avg = self.avg_entry_price,
            "entry executed"
        );
        Ok(Some(EntryReceipt { shares, commission }))
    }

    /// Shares the given exit kind would close right now, before clamping.
    fn exit_shares(&self, kind: ExitKind) -> u64 {
        let held = self.held_shares();
        match kind.tp_index() {
            // The last rung and forced exits flatten whatever remains.
            Some(3) | None => held,
            Some(index) => {
                let fraction = self.plan.exits[index].fraction;
                let shares = (held as f64 * fraction).floor() as u64;
                if shares == 0 && held > 0 {
                    1
                } else {
                    shares
                }
            }
        }
    }

    /// Execute an exit.
    ///
    /// TP2 and TP3 require their predecessor; violating that is a driver bug.
    /// Returns `Ok(None)` for a closed trade or an already-executed level.
    pub fn execute_exit(
        &mut self,
        kind: ExitKind,
        price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
        slippage: f64,
        model: &ExecutionModel,
    ) -> Result<Option<ExitReceipt>, TradeError> {
        if self.is_closed() || self.current_shares == 0 {
            return Ok(None);
        }

        if let Some(index) = kind.tp_index() {
            if self.exits[index].executed {
                return Ok(None);
            }
            // TP4 has no prerequisite: it is also the forced-flatten path.
            if index > 0 && index < 3 && !self.exits[index - 1].executed {
                return Err(TradeError::ExitOutOfOrder {
                    kind: kind.as_str(),
                });
            }
        }

        let shares = self.exit_shares(kind).min(self.held_shares());
        if shares == 0 {
            return Ok(None);
        }

        let sign = self.direction.sign() as f64;
        let gross = (price - self.avg_entry_price) * shares as f64 * sign;
        let commission = model.commission(shares);
        let pnl = gross - commission;

        let action = match self.direction {
            Direction::Long => TradeAction::Sell,
            Direction::Short => TradeAction::BuyCover,
        };
        self.executions.push(Execution {
            timestamp,
            action,
            price,
            shares,
            commission,
            slippage,
        });
        self.total_commissions += commission;
        self.total_slippage += slippage * shares as f64;

        self.current_shares -= self.direction.sign() * shares as i64;
        self.realized_pnl += pnl;

        match kind {
            ExitKind::StopLoss => {
                self.stop_loss_hit = true;
                self.stop_loss_price = Some(price);
                self.stop_loss_pnl = pnl;
            }
            ExitKind::ExitManager => {
                self.exit_manager_triggered = true;
            }
            _ => {
                let index = kind.tp_index().unwrap_or(3);
                self.exits[index] = ExitFill {
                    executed: true,
                    price,
                    shares,
                    pnl,
                };
            }
        }

        let closed = self.current_shares == 0;
        if closed {
            self.unrealized_pnl = 0.0;
            self.last_exit_time = Some(timestamp);
            self.exit_reason = reason;
            self.status = match (reason, kind) {
                (ExitReason::EndOfBacktest, _) => TradeStatus::ClosedEnd,
                (_, ExitKind::ExitManager) => TradeStatus::ClosedExitManager,
                _ if self.realized_pnl > 0.0 => TradeStatus::ClosedWin,
                _ => TradeStatus::ClosedLoss,
            };
            tracing::debug!(
                trade = %self.id,
                symbol = %self.symbol,
                kind = kind.as_str(),
                pnl = self.realized_pnl,
                status = ?self.status,
                "trade closed"
            );
        } else {
            self.status = TradeStatus::Closing;
        }

        Ok(Some(ExitReceipt {
            shares,
            pnl,
            commission,
            closed_trade: closed,
        }))
    }

    /// Mark-to-market: unrealized P&L net of an estimated closing commission.
    pub fn update_unrealized(&mut self, current_price: f64, model: &ExecutionModel) {
        if self.current_shares == 0 {
            self.unrealized_pnl = 0.0;
            return;
        }
        let gross = (current_price - self.avg_entry_price) * self.current_shares as f64;
        self.unrealized_pnl = gross - model.commission(self.held_shares());
    }

    /// Track the best and worst percentage move relative to average entry.
    pub fn update_excursions(&mut self, current_price: f64) {
        if self.avg_entry_price == 0.0 || self.current_shares == 0 {
            return;
        }
        let sign = self.direction.sign() as f64;
        let move_pct = (current_price - self.avg_entry_price) / self.avg_entry_price * 100.0 * sign;
        if move_pct > self.max_favorable_excursion {
            self.max_favorable_excursion = move_pct;
        }
        if move_pct < self.max_adverse_excursion {
            self.max_adverse_excursion = move_pct;
        }
    }

    pub fn tick_bar(&mut self) {
        self.bars_held += 1;
    }

    /// Flattened export for downstream analysis.
    pub fn record(&self) -> TradeRecord {
        TradeRecord {
            trade_id: self.id,
            symbol: self.symbol.clone(),
            direction: self.direction,
            signal_strength: self.signal.strength,
            signal_time: self.signal_time,
            first_entry_time: self.first_entry_time,
            last_exit_time: self.last_exit_time,
            status: self.status,
            entries: self.entries,
            exits: self.exits,
            avg_entry_price: self.avg_entry_price,
            stop_loss_hit: self.stop_loss_hit,
            stop_loss_pnl: self.stop_loss_pnl,
            exit_manager_triggered: self.exit_manager_triggered,
            realized_pnl: self.realized_pnl,
            total_pnl: self.total_pnl(),
            total_commissions: self.total_commissions,
            total_slippage: self.total_slippage,
            max_favorable_excursion: self.max_favorable_excursion,
            max_adverse_excursion: self.max_adverse_excursion,
            bars_held: self.bars_held,
            exit_reason: self.exit_reason,
        }
    }
}

/// The analysis-facing subset of a trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: TradeId,
    pub symbol: String,
    pub direction: Direction,
    pub signal_strength: u8,
    pub signal_time: DateTime<Utc>,
    pub first_entry_time: Option<DateTime<Utc>>,
    pub last_exit_time: Option<DateTime<Utc>>,
    pub status: TradeStatus,
    pub entries: [EntryFill; 3],
    pub exits: [ExitFill; 4],
    pub avg_entry_price: f64,
    pub stop_loss_hit: bool,
    pub stop_loss_pnl: f64,
    pub exit_manager_triggered: bool,
    pub realized_pnl: f64,
    pub total_pnl: f64,
    pub total_commissions: f64,
    pub total_slippage: f64,
    pub max_favorable_excursion: f64,
    pub max_adverse_excursion: f64,
    pub bars_held: u64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.total_pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{build_plan, EntryQuality, PlanConfig};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 21, 0, 0).unwrap()
    }

    fn signal(direction: Direction) -> Signal {
        Signal {
            symbol: "AAPL".into(),
            timestamp: ts(2),
            direction,
            strength: 70,
            quality: EntryQuality::FullEntry,
            reference_price: 100.0,
            context: HashMap::new(),
        }
    }

    fn long_trade() -> Trade {
        // equity 10_000, risk 1.5%, atr 2.0 -> 50 shares split 20/15/15,
        // stop 97, exits 103/106/109/112
        let sig = signal(Direction::Long);
        let plan = build_plan(&sig, 10_000.0, 2.0, &PlanConfig::default()).unwrap();
        Trade::new(TradeId(0), sig, plan)
    }

    fn short_trade() -> Trade {
        let sig = signal(Direction::Short);
        let plan = build_plan(&sig, 10_000.0, 2.0, &PlanConfig::default()).unwrap();
        Trade::new(TradeId(1), sig, plan)
    }

    fn free() -> ExecutionModel {
        ExecutionModel::frictionless()
    }

    #[test]
    fn entry_ladder_walks_pending_partial_active() {
        let mut trade = long_trade();
        assert_eq!(trade.status, TradeStatus::Pending);

        let receipt = trade
            .execute_entry(1, 100.0, ts(2), 0.0, &free(), None)
            .unwrap()
            .unwrap();
        assert_eq!(receipt.shares, 20);
        assert_eq!(trade.status, TradeStatus::Partial);
        assert_eq!(trade.current_shares, 20);
        assert_eq!(trade.first_entry_time, Some(ts(2)));

        trade.execute_entry(2, 99.0, ts(3), 0.0, &free(), None).unwrap();
        assert_eq!(trade.status, TradeStatus::Partial);

        trade.execute_entry(3, 98.0, ts(4), 0.0, &free(), None).unwrap();
        assert_eq!(trade.status, TradeStatus::Active);
        assert_eq!(trade.current_shares, 50);
    }

    #[test]
    fn avg_entry_is_cost_weighted() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        trade.execute_entry(2, 98.0, ts(3), 0.0, &free(), None).unwrap();
        // (20*100 + 15*98) / 35
        let expected = (20.0 * 100.0 + 15.0 * 98.0) / 35.0;
        assert!((trade.avg_entry_price - expected).abs() < 1e-10);
    }

    #[test]
    fn entry_out_of_order_is_an_error() {
        let mut trade = long_trade();
        assert!(matches!(
            trade.execute_entry(2, 99.0, ts(2), 0.0, &free(), None),
            Err(TradeError::EntryOutOfOrder { level: 2, .. })
        ));
    }

    #[test]
    fn repeated_entry_is_rejected_quietly() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        let second = trade
            .execute_entry(1, 100.0, ts(3), 0.0, &free(), None)
            .unwrap();
        assert!(second.is_none());
        assert_eq!(trade.current_shares, 20);
    }

    #[test]
    fn tp1_takes_quarter_of_current_holdings() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        let receipt = trade
            .execute_exit(ExitKind::TakeProfit1, 103.0, ts(3), ExitReason::TakeProfit1, 0.0, &free())
            .unwrap()
            .unwrap();
        assert_eq!(receipt.shares, 5); // 25% of 20
        assert!((receipt.pnl - 5.0 * 3.0).abs() < 1e-10);
        assert_eq!(trade.status, TradeStatus::Closing);
        assert_eq!(trade.current_shares, 15);
        assert_eq!(trade.exits[0].shares, 5);
    }

    #[test]
    fn tp_ladder_closes_out_through_tp4() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        for (kind, reason, price) in [
            (ExitKind::TakeProfit1, ExitReason::TakeProfit1, 103.0),
            (ExitKind::TakeProfit2, ExitReason::TakeProfit2, 106.0),
            (ExitKind::TakeProfit3, ExitReason::TakeProfit3, 109.0),
            (ExitKind::TakeProfit4, ExitReason::TakeProfit4, 112.0),
        ] {
            trade
                .execute_exit(kind, price, ts(5), reason, 0.0, &free())
                .unwrap()
                .unwrap();
        }
        assert_eq!(trade.current_shares, 0);
        assert_eq!(trade.status, TradeStatus::ClosedWin);
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit4);
        assert!(trade.realized_pnl > 0.0);
    }

    #[test]
    fn tp2_before_tp1_is_an_error() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        assert!(matches!(
            trade.execute_exit(ExitKind::TakeProfit2, 106.0, ts(3), ExitReason::TakeProfit2, 0.0, &free()),
            Err(TradeError::ExitOutOfOrder { kind: "TP2" })
        ));
    }

    #[test]
    fn minimum_one_share_per_partial_exit() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), Some(2)).unwrap();
        let receipt = trade
            .execute_exit(ExitKind::TakeProfit1, 103.0, ts(3), ExitReason::TakeProfit1, 0.0, &free())
            .unwrap()
            .unwrap();
        // 25% of 2 floors to 0, bumped to 1
        assert_eq!(receipt.shares, 1);
    }

    #[test]
    fn stop_loss_flattens_and_marks_loss() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        let receipt = trade
            .execute_exit(ExitKind::StopLoss, 97.0, ts(3), ExitReason::StopLoss, 0.0, &free())
            .unwrap()
            .unwrap();
        assert_eq!(receipt.shares, 20);
        assert!(receipt.closed_trade);
        assert_eq!(trade.status, TradeStatus::ClosedLoss);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!(trade.stop_loss_hit);
        assert!((trade.stop_loss_pnl - (97.0 - 100.0) * 20.0).abs() < 1e-10);
    }

    #[test]
    fn stop_loss_in_profit_closes_as_win() {
        // Partial profit first, then a stop above break-even overall.
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        trade
            .execute_exit(ExitKind::TakeProfit1, 110.0, ts(3), ExitReason::TakeProfit1, 0.0, &free())
            .unwrap();
        trade
            .execute_exit(ExitKind::StopLoss, 99.9, ts(4), ExitReason::StopLoss, 0.0, &free())
            .unwrap();
        // +50 from TP1, -1.5 from the stop: net positive
        assert_eq!(trade.status, TradeStatus::ClosedWin);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn exit_manager_close_has_its_own_state() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        trade
            .execute_exit(ExitKind::ExitManager, 101.0, ts(3), ExitReason::ExitManager, 0.0, &free())
            .unwrap();
        assert_eq!(trade.status, TradeStatus::ClosedExitManager);
        assert!(trade.exit_manager_triggered);
    }

    #[test]
    fn end_of_backtest_close() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        trade
            .execute_exit(ExitKind::TakeProfit4, 100.0, ts(9), ExitReason::EndOfBacktest, 0.0, &free())
            .unwrap();
        assert_eq!(trade.status, TradeStatus::ClosedEnd);
        assert_eq!(trade.exit_reason, ExitReason::EndOfBacktest);
    }

    #[test]
    fn closed_trade_ignores_further_operations() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        trade
            .execute_exit(ExitKind::StopLoss, 97.0, ts(3), ExitReason::StopLoss, 0.0, &free())
            .unwrap();
        assert!(trade
            .execute_exit(ExitKind::TakeProfit4, 112.0, ts(4), ExitReason::TakeProfit4, 0.0, &free())
            .unwrap()
            .is_none());
        assert!(trade
            .execute_entry(2, 99.0, ts(4), 0.0, &free(), None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn short_trade_pnl_is_sign_flipped() {
        let mut trade = short_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        assert_eq!(trade.current_shares, -20);
        let receipt = trade
            .execute_exit(ExitKind::TakeProfit1, 97.0, ts(3), ExitReason::TakeProfit1, 0.0, &free())
            .unwrap()
            .unwrap();
        // Short from 100, covered at 97: +3/share on 5 shares
        assert!((receipt.pnl - 15.0).abs() < 1e-10);
        assert_eq!(trade.current_shares, -15);
    }

    #[test]
    fn commission_nets_out_of_realized_pnl() {
        let model = ExecutionModel {
            commission_per_share: 0.01,
            min_commission: 0.0,
            ..ExecutionModel::frictionless()
        };
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &model, None).unwrap();
        let receipt = trade
            .execute_exit(ExitKind::TakeProfit1, 103.0, ts(3), ExitReason::TakeProfit1, 0.0, &model)
            .unwrap()
            .unwrap();
        assert!((receipt.pnl - (15.0 - 0.05)).abs() < 1e-10);
        // Entry commission (0.20) + exit commission (0.05)
        assert!((trade.total_commissions - 0.25).abs() < 1e-10);
    }

    #[test]
    fn unrealized_pnl_subtracts_estimated_close_commission() {
        let model = ExecutionModel {
            commission_per_share: 0.01,
            min_commission: 0.0,
            ..ExecutionModel::frictionless()
        };
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &model, None).unwrap();
        trade.update_unrealized(105.0, &model);
        assert!((trade.unrealized_pnl - (100.0 - 0.20)).abs() < 1e-10);
    }

    #[test]
    fn excursions_track_best_and_worst_move() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        trade.update_excursions(104.0);
        trade.update_excursions(98.0);
        trade.update_excursions(102.0);
        assert!((trade.max_favorable_excursion - 4.0).abs() < 1e-10);
        assert!((trade.max_adverse_excursion - (-2.0)).abs() < 1e-10);
    }

    #[test]
    fn share_conservation_across_fills() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        trade.execute_entry(2, 99.0, ts(3), 0.0, &free(), None).unwrap();
        trade
            .execute_exit(ExitKind::TakeProfit1, 103.0, ts(4), ExitReason::TakeProfit1, 0.0, &free())
            .unwrap();

        let bought: i64 = trade
            .executions
            .iter()
            .filter(|e| matches!(e.action, TradeAction::Buy))
            .map(|e| e.shares as i64)
            .sum();
        let sold: i64 = trade
            .executions
            .iter()
            .filter(|e| matches!(e.action, TradeAction::Sell))
            .map(|e| e.shares as i64)
            .sum();
        assert_eq!(bought - sold, trade.current_shares);
    }

    #[test]
    fn record_exports_the_analysis_subset() {
        let mut trade = long_trade();
        trade.execute_entry(1, 100.0, ts(2), 0.0, &free(), None).unwrap();
        trade
            .execute_exit(ExitKind::TakeProfit4, 112.0, ts(5), ExitReason::TakeProfit4, 0.0, &free())
            .unwrap();
        let record = trade.record();
        assert_eq!(record.symbol, "AAPL");
        assert!(record.is_winner());
        assert_eq!(record.exit_reason, ExitReason::TakeProfit4);
        let json = serde_json::to_string(&record).unwrap();
        let deser: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deser.signal_strength, 70);
    }
}
