//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OHLCV bar for a single symbol at a single timestamp, plus pre-computed
/// indicator values in `features`.
///
/// Indicator computation is upstream of the engine; whatever the signal
/// source and execution model need (`"atr"`, `"atr_percentage"`, `"rsi"`, …)
/// must already be present in the map. Consumers read by key and fail loudly
/// when a required key is missing for the bar under evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub features: HashMap<String, f64>,
}

impl Bar {
    /// Returns true if any OHLC field is NaN. Such bars are rejected at load time.
    pub fn has_nan_ohlc(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLCV sanity check: low <= open/close <= high, non-negative volume.
    pub fn is_sane(&self) -> bool {
        if self.has_nan_ohlc() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }

    /// Look up a pre-computed feature value.
    pub fn feature(&self, key: &str) -> Option<f64> {
        self.features.get(key).copied()
    }

    /// Feature lookup with a fallback, for features with a documented default
    /// (e.g. `"atr_percentage"` in the slippage model).
    pub fn feature_or(&self, key: &str, default: f64) -> f64 {
        self.feature(key).unwrap_or(default)
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
