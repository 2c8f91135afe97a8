//! LadderLab Core — event-driven backtesting for scaled-entry/exit strategies.
//!
//! This crate contains the simulation engine:
//! - Domain types (bars, signals, plans, fills, trades)
//! - Chronological multi-symbol bar stream with no-look-ahead history views
//! - Risk-based position planning (laddered entries, stop, R-multiple exits)
//! - Trade state machine with partial fills and hierarchical exits
//! - Trade manager (one active trade per symbol, shared cash account)
//! - Slippage/commission execution model
//! - The bar-by-bar event loop and its `RunResult`
//!
//! Strategy logic (signal scoring, exit deterioration rules) plugs in through
//! the `SignalSource` and `ExitManagerRules` traits; the engine fixes only
//! the contracts and the order in which it consults them.

pub mod domain;
pub mod engine;
pub mod error;
pub mod execution;
pub mod exits;
pub mod fingerprint;
pub mod manager;
pub mod signals;
pub mod stream;
pub mod trade;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types that cross the sweep boundary are
    /// Send + Sync, so independent runs can execute on worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::PositionPlan>();
        require_sync::<domain::PositionPlan>();
        require_send::<trade::Trade>();
        require_sync::<trade::Trade>();
        require_send::<trade::TradeRecord>();
        require_sync::<trade::TradeRecord>();
        require_send::<stream::BarStream>();
        require_sync::<stream::BarStream>();
        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();
        require_send::<fingerprint::ConfigHash>();
        require_sync::<fingerprint::ConfigHash>();
    }

    /// Architecture contract: `SignalSource` cannot see account or portfolio
    /// state — its inputs are the symbol and its bar history, nothing else.
    /// The type system enforces the no-look-ahead/no-feedback boundary; this
    /// test documents it and breaks loudly if the signature ever grows.
    #[test]
    fn signal_source_sees_only_history() {
        fn _check_trait_object_builds(
            source: &dyn signals::SignalSource,
            bars: &[domain::Bar],
        ) -> Option<domain::Signal> {
            source.evaluate("SPY", bars)
        }
    }
}
