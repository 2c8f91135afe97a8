//! Grouped trade statistics: per symbol and per signal-strength bucket.

use crate::metrics::{profit_factor, win_rate};
use ladderlab_core::trade::TradeRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate row for one group of trades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub key: String,
    pub trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub profit_factor: f64,
}

fn summarize_group(key: String, trades: &[&TradeRecord]) -> BreakdownRow {
    let owned: Vec<TradeRecord> = trades.iter().map(|t| (*t).clone()).collect();
    BreakdownRow {
        key,
        trades: owned.len(),
        win_rate: win_rate(&owned),
        total_pnl: owned.iter().map(|t| t.total_pnl).sum(),
        profit_factor: profit_factor(&owned),
    }
}

/// Group closed trades by symbol, sorted by symbol.
pub fn by_symbol(trades: &[TradeRecord]) -> Vec<BreakdownRow> {
    let mut groups: BTreeMap<&str, Vec<&TradeRecord>> = BTreeMap::new();
    for trade in trades {
        groups.entry(trade.symbol.as_str()).or_default().push(trade);
    }
    groups
        .into_iter()
        .map(|(symbol, group)| summarize_group(symbol.to_string(), &group))
        .collect()
}

/// Signal-strength buckets used for the strength breakdown.
const STRENGTH_BUCKETS: [(u8, u8); 4] = [(55, 64), (65, 74), (75, 84), (85, 100)];

fn bucket_label(strength: u8) -> String {
    for (lo, hi) in STRENGTH_BUCKETS {
        if (lo..=hi).contains(&strength) {
            return format!("{lo}-{hi}");
        }
    }
    "under-55".to_string()
}

/// Group closed trades by signal-strength bucket, weakest bucket first.
/// Trades below the lowest bucket (possible with a permissive strength gate)
/// land in a catch-all row.
pub fn by_strength_bucket(trades: &[TradeRecord]) -> Vec<BreakdownRow> {
    let mut groups: BTreeMap<u8, Vec<&TradeRecord>> = BTreeMap::new();
    for trade in trades {
        let bucket_key = STRENGTH_BUCKETS
            .iter()
            .position(|(lo, hi)| (*lo..=*hi).contains(&trade.signal_strength))
            .map(|i| i as u8 + 1)
            .unwrap_or(0);
        groups.entry(bucket_key).or_default().push(trade);
    }
    groups
        .into_values()
        .map(|group| summarize_group(bucket_label(group[0].signal_strength), &group))
        .collect()
}
