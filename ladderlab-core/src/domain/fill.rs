//! Execution records — one immutable entry per fill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire-level action of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    /// Open or add to a long.
    Buy,
    /// Reduce or close a long.
    Sell,
    /// Open or add to a short.
    SellShort,
    /// Reduce or close a short.
    BuyCover,
}

/// One fill against a trade. Appended to the owning trade, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub timestamp: DateTime<Utc>,
    pub action: TradeAction,
    pub price: f64,
    pub shares: u64,
    pub commission: f64,
    /// Per-share slippage baked into `price`, recorded for cost attribution.
    pub slippage: f64,
}

impl Execution {
    /// Notional value of the fill, commission excluded.
    pub fn notional(&self) -> f64 {
        self.price * self.shares as f64
    }
}
