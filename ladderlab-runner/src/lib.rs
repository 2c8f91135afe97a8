//! LadderLab Runner — post-run analysis and orchestration.
//!
//! Consumes `RunResult`s from the core engine and derives performance
//! metrics, per-symbol and per-strength breakdowns, and combined reports.
//! Also hosts the rayon-parallel parameter sweep (many independent runs,
//! never parallelism inside one run) and a bounded leaderboard for ranking
//! sweep results by a chosen fitness metric.

pub mod breakdown;
pub mod leaderboard;
pub mod metrics;
pub mod report;
pub mod sweep;

pub use breakdown::{by_strength_bucket, by_symbol, BreakdownRow};
pub use leaderboard::{FitnessMetric, Leaderboard};
pub use metrics::PerformanceMetrics;
pub use report::BacktestReport;
pub use sweep::run_sweep;
