//! Engine configuration for a single run.

use crate::domain::{EntryQuality, PlanConfig};
use crate::error::ConfigError;
use crate::execution::ExecutionModel;
use serde::{Deserialize, Serialize};

/// Every knob a run needs, threaded explicitly — no process-wide state.
/// Serializable so a `RunResult` can carry an exact snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Universe of symbols eligible for new signals.
    pub symbols: Vec<String>,
    pub max_concurrent_positions: usize,
    /// Slippage and commission policy.
    pub execution: ExecutionModel,
    /// Sizing and ladder policy.
    pub plan: PlanConfig,
    /// Signals below this strength are ignored.
    pub min_signal_strength: u8,
    /// Signals below this quality are ignored.
    pub min_entry_quality: EntryQuality,
    pub enable_exit_manager: bool,
    /// Annualized, for Sharpe computation downstream.
    pub risk_free_rate: f64,
}

impl EngineConfig {
    pub fn new(initial_capital: f64, symbols: Vec<String>) -> Self {
        Self {
            initial_capital,
            symbols,
            max_concurrent_positions: 5,
            execution: ExecutionModel::default(),
            plan: PlanConfig::default(),
            min_signal_strength: 55,
            min_entry_quality: EntryQuality::PartialEntry,
            enable_exit_manager: true,
            risk_free_rate: 0.02,
        }
    }

    /// Range-check every option. Called once before the loop; failures refuse
    /// the run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capital <= 0.0 {
            return Err(ConfigError::InitialCapital(self.initial_capital));
        }
        if self.symbols.is_empty() {
            return Err(ConfigError::EmptySymbols);
        }
        if self.max_concurrent_positions < 1 {
            return Err(ConfigError::MaxConcurrentPositions);
        }
        for (name, value) in [
            ("commission_per_share", self.execution.commission_per_share),
            ("min_commission", self.execution.min_commission),
            ("base_slippage_pct", self.execution.base_slippage_pct),
            ("max_slippage_pct", self.execution.max_slippage_pct),
            ("risk_free_rate", self.risk_free_rate),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeCost { name, value });
            }
        }
        if self.execution.base_slippage_pct > self.execution.max_slippage_pct {
            return Err(ConfigError::SlippageBounds {
                base: self.execution.base_slippage_pct,
                max: self.execution.max_slippage_pct,
            });
        }
        if self.min_signal_strength > 100 {
            return Err(ConfigError::SignalStrength(self.min_signal_strength));
        }
        self.plan.validate()
    }
}
