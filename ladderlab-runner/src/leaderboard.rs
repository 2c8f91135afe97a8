//! Leaderboard — bounded, deduplicated ranking of sweep results.
//!
//! Deduplication key: the run's `ConfigHash`. A re-run of the same config
//! replaces its entry only with a better fitness score. Entries with
//! non-finite fitness are rejected up front, so an infinite profit factor
//! cannot pin the top slot forever.

use crate::metrics::PerformanceMetrics;
use crate::report::BacktestReport;
use ladderlab_core::fingerprint::ConfigHash;
use serde::{Deserialize, Serialize};

/// Which metric to rank by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    TotalReturn,
    ProfitFactor,
    WinRate,
    /// Ranked inverted: smaller drawdowns score higher.
    MaxDrawdown,
}

impl FitnessMetric {
    /// Extract the score from a metrics struct, oriented so that higher is
    /// always better.
    pub fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe_ratio,
            Self::TotalReturn => metrics.total_return_pct,
            Self::ProfitFactor => metrics.profit_factor,
            Self::WinRate => metrics.win_rate,
            Self::MaxDrawdown => -metrics.max_drawdown_pct,
        }
    }
}

/// One ranked run.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub config_hash: ConfigHash,
    pub fitness_score: f64,
    pub report: BacktestReport,
}

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    /// Same config arrived with a better score.
    Replaced,
    /// Duplicate with a worse score, non-finite fitness, or below the cut.
    Skipped,
}

/// Top-N runs by fitness, best first.
#[derive(Debug)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
    max_size: usize,
    fitness_metric: FitnessMetric,
}

impl Leaderboard {
    pub fn new(max_size: usize, fitness_metric: FitnessMetric) -> Self {
        Self {
            entries: Vec::with_capacity(max_size.min(1024)),
            max_size,
            fitness_metric,
        }
    }

    pub fn insert(&mut self, report: BacktestReport) -> InsertResult {
        let fitness_score = self.fitness_metric.score(&report.metrics);
        if !fitness_score.is_finite() {
            return InsertResult::Skipped;
        }
        let config_hash = report.result.config_hash;

        if let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.config_hash == config_hash)
        {
            if fitness_score > self.entries[index].fitness_score {
                self.entries[index] = LeaderboardEntry {
                    config_hash,
                    fitness_score,
                    report,
                };
                self.sort_entries();
                return InsertResult::Replaced;
            }
            return InsertResult::Skipped;
        }

        if self.entries.len() == self.max_size {
            let worst = self
                .entries
                .last()
                .map(|entry| entry.fitness_score)
                .unwrap_or(f64::NEG_INFINITY);
            if fitness_score <= worst {
                return InsertResult::Skipped;
            }
            self.entries.pop();
        }

        self.entries.push(LeaderboardEntry {
            config_hash,
            fitness_score,
            report,
        });
        self.sort_entries();
        InsertResult::Inserted
    }

    /// Fold an entire sweep's successful runs in.
    pub fn extend_from_sweep(
        &mut self,
        reports: impl IntoIterator<Item = BacktestReport>,
    ) -> usize {
        let mut accepted = 0;
        for report in reports {
            if self.insert(report) != InsertResult::Skipped {
                accepted += 1;
            }
        }
        accepted
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn best(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sort_entries(&mut self) {
        // total_cmp keeps the order total even though scores are floats;
        // non-finite scores were rejected at insert.
        self.entries
            .sort_by(|a, b| b.fitness_score.total_cmp(&a.fitness_score));
    }
}
