//! Execution model: slippage and commission.
//!
//! Fills always move in the adverse direction — buys fill above the target,
//! sells below (mirrored for shorts). Slippage scales with the bar's
//! volatility via the `"atr_percentage"` feature and is capped at a fraction
//! of price. Commission is per-share with a floor.

use crate::domain::{Bar, Direction};
use serde::{Deserialize, Serialize};

/// Feature key for the volatility multiplier input.
const ATR_PERCENTAGE_KEY: &str = "atr_percentage";

/// Fallback ATR% when the bar does not carry the feature.
const DEFAULT_ATR_PERCENTAGE: f64 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionModel {
    /// Base slippage as a fraction of price (0.0005 = 5 bps).
    pub base_slippage_pct: f64,
    /// Hard cap on slippage as a fraction of price.
    pub max_slippage_pct: f64,
    pub commission_per_share: f64,
    pub min_commission: f64,
}

impl Default for ExecutionModel {
    fn default() -> Self {
        Self {
            base_slippage_pct: 0.0005,
            max_slippage_pct: 0.002,
            commission_per_share: 0.005,
            min_commission: 1.0,
        }
    }
}

impl ExecutionModel {
    /// Frictionless variant for tests and baselines.
    pub fn frictionless() -> Self {
        Self {
            base_slippage_pct: 0.0,
            max_slippage_pct: 0.0,
            commission_per_share: 0.0,
            min_commission: 0.0,
        }
    }

    /// Slippage in dollars for a fill near `price` on this bar.
    ///
    /// `base * (1 + atr% / 10)`, capped at `price * max_slippage_pct`.
    pub fn slippage(&self, price: f64, bar: &Bar) -> f64 {
        let atr_pct = bar.feature_or(ATR_PERCENTAGE_KEY, DEFAULT_ATR_PERCENTAGE);
        let base = price * self.base_slippage_pct;
        let volatility_multiplier = 1.0 + atr_pct / 10.0;
        (base * volatility_multiplier).min(price * self.max_slippage_pct)
    }

    /// Slippage when no bar is at hand (end-of-stream sweeps): base rate only.
    pub fn slippage_flat(&self, price: f64) -> f64 {
        price * self.base_slippage_pct
    }

    /// Fill price for an entry: longs buy higher, shorts sell lower.
    pub fn entry_fill(&self, target: f64, direction: Direction, slippage: f64) -> f64 {
        match direction {
            Direction::Long => target + slippage,
            Direction::Short => target - slippage,
        }
    }

    /// Fill price for an exit: longs sell lower, shorts cover higher.
    pub fn exit_fill(&self, target: f64, direction: Direction, slippage: f64) -> f64 {
        match direction {
            Direction::Long => target - slippage,
            Direction::Short => target + slippage,
        }
    }

    /// Commission for one execution.
    pub fn commission(&self, shares: u64) -> f64 {
        (shares as f64 * self.commission_per_share).max(self.min_commission)
    }
}
