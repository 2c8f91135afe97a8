//! Error families for the engine.
//!
//! Three families, matching how failures surface:
//! - `LoadError` / `ConfigError`: fatal before the loop starts — the run is refused.
//! - `TradeError`: a collaborator violated an operation precondition mid-run.
//!   These indicate a bug and abort the run.
//! - `EngineError`: umbrella returned by `run_backtest`, carrying the bar
//!   timestamp and symbol where the run died.
//!
//! Soft rejections (signal below the strength gate, zero-share plan, exit
//! level not crossed) are not errors — they surface as "no action".

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors detected while constructing a bar stream.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{symbol}: timestamps not strictly increasing at index {index} ({timestamp})")]
    NonMonotonicTimestamps {
        symbol: String,
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("{symbol}: invalid OHLC at {timestamp} (open={open}, high={high}, low={low}, close={close})")]
    InvalidBar {
        symbol: String,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("no symbols provided")]
    EmptySymbolSet,

    #[error("no bars for symbol {0}")]
    EmptySeries(String),

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
}

/// Configuration values out of range. Checked once, before the loop.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("initial_capital must be > 0, got {0}")]
    InitialCapital(f64),

    #[error("risk_per_trade_pct must be in (0, 1), got {0}")]
    RiskPerTrade(f64),

    #[error("max_concurrent_positions must be >= 1")]
    MaxConcurrentPositions,

    #[error("{name} must be >= 0, got {value}")]
    NegativeCost { name: &'static str, value: f64 },

    #[error("base_slippage_pct ({base}) exceeds max_slippage_pct ({max})")]
    SlippageBounds { base: f64, max: f64 },

    #[error("min_signal_strength must be <= 100, got {0}")]
    SignalStrength(u8),

    #[error("entry_ladder_fractions must sum to 1.0, got {0}")]
    EntryLadderSum(f64),

    #[error("entry spacing and stop multiples must satisfy 0 < level2 < level3 < stop")]
    EntrySpacingOrder,

    #[error("exit ladder R-multiples must be positive and strictly increasing")]
    ExitLadderOrder,

    #[error("symbols must be non-empty")]
    EmptySymbols,
}

/// Precondition violations on trade operations. These are collaborator bugs,
/// not market conditions, and abort the run.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("entry level {level} requires level {required} to execute first")]
    EntryOutOfOrder { level: u8, required: u8 },

    #[error("exit {kind} requires the preceding take-profit to execute first")]
    ExitOutOfOrder { kind: &'static str },

    #[error("symbol {0} already has an active trade")]
    DuplicateActiveTrade(String),

    #[error("unknown trade id {0}")]
    UnknownTrade(u64),
}

/// Fatal diagnostic for a run. The `RunResult` is not produced; this carries
/// the bar where the invariant died.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("at {timestamp} [{symbol}]: {source}")]
    Trade {
        timestamp: DateTime<Utc>,
        symbol: String,
        source: TradeError,
    },

    #[error("at {timestamp} [{symbol}]: required feature \"{feature}\" missing from bar")]
    MissingFeature {
        timestamp: DateTime<Utc>,
        symbol: String,
        feature: String,
    },
}
