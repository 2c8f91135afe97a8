//! Trade manager — owns every trade, active and closed.
//!
//! Trades live in an append-only vector indexed by `TradeId`; the
//! symbol-to-active-trade map stores ids only, never references. At most one
//! active trade per symbol. Entry and exit executions are dispatched through
//! here so the index stays consistent with trade state.

use crate::domain::{IdGen, PositionPlan, Signal, TradeId};
use crate::error::TradeError;
use crate::execution::ExecutionModel;
use crate::trade::{
    EntryReceipt, ExitKind, ExitReason, ExitReceipt, Trade, TradeRecord,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

pub struct TradeManager {
    execution_model: ExecutionModel,
    trades: Vec<Trade>,
    /// Symbol-ordered so that every iteration over active trades (marking,
    /// unrealized sums, the end-of-stream sweep) is deterministic.
    active: BTreeMap<String, TradeId>,
    id_gen: IdGen,
}

impl TradeManager {
    pub fn new(execution_model: ExecutionModel) -> Self {
        Self {
            execution_model,
            trades: Vec::new(),
            active: BTreeMap::new(),
            id_gen: IdGen::default(),
        }
    }

    pub fn execution_model(&self) -> &ExecutionModel {
        &self.execution_model
    }

    /// Create a trade in `Pending` state. Fails if the symbol already has an
    /// active trade — the engine checks first, so hitting this is a bug.
    pub fn open_trade(&mut self, signal: Signal, plan: PositionPlan) -> Result<TradeId, TradeError> {
        if self.active.contains_key(&signal.symbol) {
            return Err(TradeError::DuplicateActiveTrade(signal.symbol));
        }
        let id = self.id_gen.next_trade_id();
        let symbol = signal.symbol.clone();
        tracing::debug!(trade = %id, %symbol, strength = signal.strength, "trade opened");
        self.trades.push(Trade::new(id, signal, plan));
        self.active.insert(symbol, id);
        Ok(id)
    }

    pub fn execute_entry(
        &mut self,
        id: TradeId,
        level: u8,
        price: f64,
        timestamp: DateTime<Utc>,
        slippage: f64,
        shares_override: Option<u64>,
    ) -> Result<Option<EntryReceipt>, TradeError> {
        let model = self.execution_model.clone();
        let trade = self.trade_mut(id)?;
        trade.execute_entry(level, price, timestamp, slippage, &model, shares_override)
    }

    /// Dispatch an exit; if it flattens the trade, drop the active index entry.
    pub fn execute_exit(
        &mut self,
        id: TradeId,
        kind: ExitKind,
        price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
        slippage: f64,
    ) -> Result<Option<ExitReceipt>, TradeError> {
        let model = self.execution_model.clone();
        let trade = self.trade_mut(id)?;
        let receipt = trade.execute_exit(kind, price, timestamp, reason, slippage, &model)?;
        if let Some(receipt) = &receipt {
            if receipt.closed_trade {
                let symbol = self.trades[id.0 as usize].symbol.clone();
                self.active.remove(&symbol);
            }
        }
        Ok(receipt)
    }

    pub fn has_active(&self, symbol: &str) -> bool {
        self.active.contains_key(symbol)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_trade_id(&self, symbol: &str) -> Option<TradeId> {
        self.active.get(symbol).copied()
    }

    pub fn get_trade(&self, id: TradeId) -> Option<&Trade> {
        self.trades.get(id.0 as usize)
    }

    pub fn get_trade_mut(&mut self, id: TradeId) -> Option<&mut Trade> {
        self.trades.get_mut(id.0 as usize)
    }

    pub fn active_trade(&self, symbol: &str) -> Option<&Trade> {
        self.active_trade_id(symbol).and_then(|id| self.get_trade(id))
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn active_trades(&self) -> impl Iterator<Item = &Trade> {
        self.active.values().map(|id| &self.trades[id.0 as usize])
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|trade| trade.is_closed())
    }

    pub fn closed_records(&self) -> Vec<TradeRecord> {
        self.closed_trades().map(Trade::record).collect()
    }

    /// Sum of unrealized P&L over active trades (the equity adjustment).
    pub fn open_unrealized_pnl(&self) -> f64 {
        self.active_trades().map(|trade| trade.unrealized_pnl).sum()
    }

    /// Mark one trade to market and tick its bar counter.
    pub fn mark_trade(&mut self, id: TradeId, price: f64) {
        let model = self.execution_model.clone();
        if let Some(trade) = self.trades.get_mut(id.0 as usize) {
            trade.update_unrealized(price, &model);
            trade.update_excursions(price);
            trade.tick_bar();
        }
    }

    /// Mark all active trades to market and tick their bar counters.
    pub fn update_all(&mut self, current_prices: &HashMap<String, f64>) {
        let model = self.execution_model.clone();
        for id in self.active.values() {
            let trade = &mut self.trades[id.0 as usize];
            if let Some(&price) = current_prices.get(&trade.symbol) {
                trade.update_unrealized(price, &model);
                trade.update_excursions(price);
                trade.tick_bar();
            }
        }
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    fn trade_mut(&mut self, id: TradeId) -> Result<&mut Trade, TradeError> {
        self.trades
            .get_mut(id.0 as usize)
            .ok_or(TradeError::UnknownTrade(id.0))
    }
}
