//! Signal source contract.
//!
//! The engine treats strategy logic as a plug-in: per bar it hands the source
//! the symbol's history up to and including the current bar, and the source
//! returns at most one signal. The slice boundary is the no-look-ahead
//! guarantee — future bars are not reachable from the arguments.

use crate::domain::{Bar, Signal};

/// Strategy plug-in evaluated once per (symbol, bar).
///
/// `history.last()` is the bar being evaluated. Implementations must be pure
/// with respect to the engine: no visibility into portfolio or account state.
pub trait SignalSource: Send + Sync {
    fn evaluate(&self, symbol: &str, history: &[Bar]) -> Option<Signal>;

    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Signal source that never fires. Baseline for wiring tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSignalSource;

impl SignalSource for NullSignalSource {
    fn evaluate(&self, _symbol: &str, _history: &[Bar]) -> Option<Signal> {
        None
    }

    fn name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_source_never_fires() {
        let source = NullSignalSource;
        assert!(source.evaluate("SPY", &[]).is_none());
        assert_eq!(source.name(), "null");
    }
}
