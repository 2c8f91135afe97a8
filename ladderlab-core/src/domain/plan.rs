//! Position planning — entry ladder, stop, exit ladder, risk-based sizing.
//!
//! A plan is derived once, at signal time, and never mutated. Sizing follows
//! fixed fractional risk: the share count is chosen so that a stop-out at the
//! planned stop price loses `risk_per_trade_pct` of equity, clamped by a
//! leverage cap on notional exposure.

use super::signal::{Direction, Signal};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// One rung of the entry ladder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryLevel {
    pub price: f64,
    pub shares: u64,
}

/// One rung of the exit ladder. `fraction` applies to the holdings at the
/// moment the rung executes, not the original size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExitLevel {
    pub price: f64,
    pub fraction: f64,
}

/// Planning knobs. Defaults reproduce the classic 40/30/30 entry split and
/// the 1R/2R/3R/4R exit ladder taking 25%, 33%, 50%, then everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Fraction of equity risked per trade (stop-out loss target).
    pub risk_per_trade_pct: f64,
    /// Upper bound on `shares * price / equity`.
    pub max_leverage: f64,
    /// Share split across the three entry levels; must sum to 1.0.
    pub entry_ladder_fractions: [f64; 3],
    /// ATR multiples below (long) / above (short) entry 1 for levels 2 and 3.
    pub entry_spacing_atr_multiples: [f64; 2],
    /// ATR multiple from entry 1 to the stop.
    pub stop_loss_atr_multiple: f64,
    /// Four `(r_multiple, fraction_of_current_holdings)` rungs.
    pub exit_ladder: [(f64, f64); 4],
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 0.015,
            max_leverage: 1.0,
            entry_ladder_fractions: [0.4, 0.3, 0.3],
            entry_spacing_atr_multiples: [0.5, 1.0],
            stop_loss_atr_multiple: 1.5,
            exit_ladder: [(1.0, 0.25), (2.0, 0.33), (3.0, 0.50), (4.0, 1.0)],
        }
    }
}

impl PlanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.risk_per_trade_pct > 0.0 && self.risk_per_trade_pct < 1.0) {
            return Err(ConfigError::RiskPerTrade(self.risk_per_trade_pct));
        }
        if self.max_leverage <= 0.0 {
            return Err(ConfigError::NegativeCost {
                name: "max_leverage",
                value: self.max_leverage,
            });
        }
        let sum: f64 = self.entry_ladder_fractions.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::EntryLadderSum(sum));
        }
        let [m2, m3] = self.entry_spacing_atr_multiples;
        if !(0.0 < m2 && m2 < m3 && m3 < self.stop_loss_atr_multiple) {
            return Err(ConfigError::EntrySpacingOrder);
        }
        let mut prev = 0.0;
        for &(r_mult, fraction) in &self.exit_ladder {
            if r_mult <= prev || !(0.0 < fraction && fraction <= 1.0) {
                return Err(ConfigError::ExitLadderOrder);
            }
            prev = r_mult;
        }
        Ok(())
    }
}

/// The full plan for one prospective trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionPlan {
    pub direction: Direction,
    /// Up to three levels; level 1 fills at market at signal time, levels 2–3
    /// are resting limits at progressively better prices.
    pub entries: Vec<EntryLevel>,
    pub stop_loss: f64,
    /// Four take-profit rungs at increasing R-multiples.
    pub exits: Vec<ExitLevel>,
    pub total_shares: u64,
    /// Entry-1-to-stop distance in dollars (the R unit).
    pub risk_per_share: f64,
}

impl PositionPlan {
    /// Price-ordering invariant: for longs, entries descend toward the stop
    /// and exits ascend; mirrored for shorts.
    pub fn prices_ordered(&self) -> bool {
        let sign = self.direction.sign() as f64;
        let entries_ok = self
            .entries
            .windows(2)
            .all(|w| (w[0].price - w[1].price) * sign > 0.0);
        let last_entry = match self.entries.last() {
            Some(level) => level.price,
            None => return false,
        };
        let stop_ok = (last_entry - self.stop_loss) * sign > 0.0;
        let exits_ok = self
            .exits
            .windows(2)
            .all(|w| (w[1].price - w[0].price) * sign > 0.0);
        entries_ok && stop_ok && exits_ok
    }
}

/// Derive a plan from a signal. Returns `None` on soft rejection: degenerate
/// risk distance, no equity, or a position that rounds to zero shares.
pub fn build_plan(signal: &Signal, equity: f64, atr: f64, cfg: &PlanConfig) -> Option<PositionPlan> {
    if equity <= 0.0 || atr <= 0.0 {
        return None;
    }

    let sign = signal.direction.sign() as f64;
    let entry_1 = signal.reference_price;
    let [m2, m3] = cfg.entry_spacing_atr_multiples;
    let entry_2 = entry_1 - sign * m2 * atr;
    let entry_3 = entry_1 - sign * m3 * atr;
    let stop_loss = entry_1 - sign * cfg.stop_loss_atr_multiple * atr;

    let risk_per_share = (entry_1 - stop_loss).abs();
    if risk_per_share <= 0.0 {
        return None;
    }

    let target_risk_dollars = equity * cfg.risk_per_trade_pct;
    let mut shares = (target_risk_dollars / risk_per_share).floor() as u64;

    let max_margin_shares = (cfg.max_leverage * equity / entry_1).floor() as u64;
    if shares > max_margin_shares {
        tracing::debug!(symbol = %signal.symbol, shares, max_margin_shares, "sizing capped by leverage");
        shares = max_margin_shares;
    }

    // Minimum participation: one share, if there is capital for it.
    if shares == 0 && equity >= entry_1 {
        shares = 1;
    }
    if shares == 0 {
        return None;
    }

    // Ladder allocation; rounding residuals go to level 1.
    let shares_2 = (shares as f64 * cfg.entry_ladder_fractions[1]).floor() as u64;
    let shares_3 = (shares as f64 * cfg.entry_ladder_fractions[2]).floor() as u64;
    let shares_1 = shares - shares_2 - shares_3;

    let entries = vec![
        EntryLevel {
            price: entry_1,
            shares: shares_1,
        },
        EntryLevel {
            price: entry_2,
            shares: shares_2,
        },
        EntryLevel {
            price: entry_3,
            shares: shares_3,
        },
    ];

    let exits = cfg
        .exit_ladder
        .iter()
        .map(|&(r_mult, fraction)| ExitLevel {
            price: entry_1 + sign * r_mult * risk_per_share,
            fraction,
        })
        .collect();

    let plan = PositionPlan {
        direction: signal.direction,
        entries,
        stop_loss,
        exits,
        total_shares: shares,
        risk_per_share,
    };
    debug_assert!(plan.prices_ordered(), "plan prices out of order: {plan:?}");
    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::EntryQuality;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn long_signal(price: f64) -> Signal {
        Signal {
            symbol: "AAPL".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 15, 0, 0).unwrap(),
            direction: Direction::Long,
            strength: 70,
            quality: EntryQuality::FullEntry,
            reference_price: price,
            context: HashMap::new(),
        }
    }

    fn short_signal(price: f64) -> Signal {
        Signal {
            direction: Direction::Short,
            ..long_signal(price)
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(PlanConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_ladder_sum_rejected() {
        let cfg = PlanConfig {
            entry_ladder_fractions: [0.5, 0.3, 0.3],
            ..PlanConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::EntryLadderSum(_))
        ));
    }

    #[test]
    fn spacing_must_stay_inside_stop() {
        let cfg = PlanConfig {
            entry_spacing_atr_multiples: [0.5, 2.0], // level 3 beyond the 1.5 ATR stop
            ..PlanConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::EntrySpacingOrder)));
    }

    #[test]
    fn long_plan_sizes_by_risk() {
        // equity 10_000, risk 1.5% = $150; atr 2.0 -> risk/share = 3.0 -> 50 shares
        let plan = build_plan(&long_signal(100.0), 10_000.0, 2.0, &PlanConfig::default()).unwrap();
        assert_eq!(plan.total_shares, 50);
        assert_eq!(plan.stop_loss, 97.0);
        assert!((plan.risk_per_share - 3.0).abs() < 1e-12);
        // 40/30/30 split with residual to level 1: 20/15/15
        assert_eq!(plan.entries[0].shares, 20);
        assert_eq!(plan.entries[1].shares, 15);
        assert_eq!(plan.entries[2].shares, 15);
        assert_eq!(
            plan.entries.iter().map(|e| e.shares).sum::<u64>(),
            plan.total_shares
        );
    }

    #[test]
    fn long_plan_prices_descend_to_stop_and_exits_ascend() {
        let plan = build_plan(&long_signal(100.0), 10_000.0, 2.0, &PlanConfig::default()).unwrap();
        assert!(plan.prices_ordered());
        assert_eq!(plan.entries[0].price, 100.0);
        assert_eq!(plan.entries[1].price, 99.0);
        assert_eq!(plan.entries[2].price, 98.0);
        // Exits at 1R..4R with R = 3.0
        assert_eq!(plan.exits[0].price, 103.0);
        assert_eq!(plan.exits[3].price, 112.0);
    }

    #[test]
    fn short_plan_mirrors_long() {
        let plan = build_plan(&short_signal(100.0), 10_000.0, 2.0, &PlanConfig::default()).unwrap();
        assert!(plan.prices_ordered());
        assert_eq!(plan.stop_loss, 103.0);
        assert_eq!(plan.entries[1].price, 101.0);
        assert_eq!(plan.exits[0].price, 97.0);
        assert_eq!(plan.exits[3].price, 88.0);
    }

    #[test]
    fn leverage_clamps_tight_stops() {
        // atr 0.02 -> risk/share 0.03 -> raw shares 5000, but 1x leverage on
        // $10k at $100/share caps at 100.
        let plan = build_plan(&long_signal(100.0), 10_000.0, 0.02, &PlanConfig::default()).unwrap();
        assert_eq!(plan.total_shares, 100);
    }

    #[test]
    fn minimum_one_share_when_affordable() {
        // Risk budget too small for one share at this volatility, but equity
        // covers the price: forced to 1.
        let plan = build_plan(&long_signal(100.0), 150.0, 10.0, &PlanConfig::default()).unwrap();
        assert_eq!(plan.total_shares, 1);
        assert_eq!(plan.entries[0].shares, 1);
    }

    #[test]
    fn rejects_no_equity_and_bad_atr() {
        assert!(build_plan(&long_signal(100.0), 0.0, 2.0, &PlanConfig::default()).is_none());
        assert!(build_plan(&long_signal(100.0), 10_000.0, 0.0, &PlanConfig::default()).is_none());
    }

    #[test]
    fn rejects_unaffordable_single_share() {
        // equity below one share's price and risk budget under one share
        assert!(build_plan(&long_signal(100.0), 50.0, 10.0, &PlanConfig::default()).is_none());
    }
}
