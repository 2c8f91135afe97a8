//! Account — the cash and equity ledger for one run.
//!
//! `current_capital` moves only through realized P&L and commissions; share
//! notional is not escrowed (the leverage cap in planning bounds exposure
//! instead). Equity at any instant is capital plus the open trades'
//! unrealized P&L, and `peak_capital` ratchets over recorded equity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sample of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub initial_capital: f64,
    pub current_capital: f64,
    pub peak_capital: f64,
    pub equity_curve: Vec<EquityPoint>,
}

impl Account {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            current_capital: initial_capital,
            peak_capital: initial_capital,
            equity_curve: Vec::new(),
        }
    }

    /// Credit (or debit, if negative) realized P&L.
    pub fn apply_realized(&mut self, pnl: f64) {
        self.current_capital += pnl;
    }

    pub fn debit_commission(&mut self, commission: f64) {
        self.current_capital -= commission;
    }

    pub fn equity(&self, open_unrealized_pnl: f64) -> f64 {
        self.current_capital + open_unrealized_pnl
    }

    /// Append an equity sample and ratchet the peak.
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, open_unrealized_pnl: f64) -> f64 {
        let equity = self.equity(open_unrealized_pnl);
        self.equity_curve.push(EquityPoint { timestamp, equity });
        if equity > self.peak_capital {
            self.peak_capital = equity;
        }
        equity
    }
}
