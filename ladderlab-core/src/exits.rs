//! Exit manager contract — dynamic, signal-deterioration-driven exits.
//!
//! The rule set that scores deterioration lives outside the engine. The
//! engine only fixes the interface and its own reaction: `Recommended` and
//! `Urgent` close the position at the bar's close; `Watch` is advisory and
//! recorded but not acted on.

use crate::domain::{Bar, Signal};
use serde::{Deserialize, Serialize};

/// How badly the rules want out. Ordered so thresholds are comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitUrgency {
    None,
    Watch,
    Recommended,
    Urgent,
}

/// Verdict for one active trade on one bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitDecision {
    pub should_exit: bool,
    pub urgency: ExitUrgency,
    /// Deterioration score the rules computed; carried onto the trade record.
    pub score: f64,
    pub reason: String,
}

impl ExitDecision {
    pub fn hold() -> Self {
        Self {
            should_exit: false,
            urgency: ExitUrgency::None,
            score: 0.0,
            reason: String::new(),
        }
    }

    /// True when the engine must act: an exit was requested at a level the
    /// engine is committed to honoring.
    pub fn is_actionable(&self) -> bool {
        self.should_exit && self.urgency >= ExitUrgency::Recommended
    }
}

/// Per-bar evaluation of an active trade's health.
pub trait ExitManagerRules: Send + Sync {
    fn evaluate(
        &self,
        original_signal: &Signal,
        current_bar: &Bar,
        avg_entry_price: f64,
        current_price: f64,
        bars_held: u64,
    ) -> ExitDecision;

    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Rules that never ask for an exit. Used when the exit manager is disabled
/// and as the baseline in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldRules;

impl ExitManagerRules for HoldRules {
    fn evaluate(
        &self,
        _original_signal: &Signal,
        _current_bar: &Bar,
        _avg_entry_price: f64,
        _current_price: f64,
        _bars_held: u64,
    ) -> ExitDecision {
        ExitDecision::hold()
    }

    fn name(&self) -> &str {
        "hold"
    }
}
