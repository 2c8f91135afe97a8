//! Entry signals emitted by a signal source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short. Used wherever arithmetic is sign-aware.
    pub fn sign(&self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

/// Entry quality gate. Ordered: `NoTrade < PartialEntry < FullEntry`, so the
/// config's minimum-quality filter is a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryQuality {
    NoTrade,
    PartialEntry,
    FullEntry,
}

/// An entry signal at a specific (symbol, timestamp). Immutable once emitted.
///
/// `context` is an opaque snapshot of whatever indicator state produced the
/// signal; the engine preserves it through the trade untouched so downstream
/// analysis can correlate outcomes with entry conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    /// Strength score, 0–100.
    pub strength: u8,
    pub quality: EntryQuality,
    /// Close of the signaling bar; anchor for the entry ladder.
    pub reference_price: f64,
    #[serde(default)]
    pub context: HashMap<String, f64>,
}
