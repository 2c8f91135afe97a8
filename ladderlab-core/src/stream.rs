//! Chronological bar stream over many symbols.
//!
//! Per-symbol series are validated once at construction (strict timestamp
//! monotonicity, OHLC sanity) and then merged into a single forward iterator
//! of `(timestamp, symbol, bar)` events in non-decreasing timestamp order.
//! Ties at the same timestamp break by symbol, lexicographically, which keeps
//! multi-symbol runs deterministic. The stream is memory-resident; no I/O
//! happens during iteration.

use crate::domain::Bar;
use crate::error::LoadError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Source of historical bars. The engine consumes this interface only; where
/// the bars come from (database, parquet, fixtures) is a caller concern.
pub trait HistoricalDataSource {
    fn symbols(&self) -> Vec<String>;
    fn bars_for(&self, symbol: &str) -> Result<Vec<Bar>, LoadError>;
}

/// In-memory data source, used by tests and parameter sweeps.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataSource {
    bars: HashMap<String, Vec<Bar>>,
}

impl MemoryDataSource {
    pub fn new(bars: HashMap<String, Vec<Bar>>) -> Self {
        Self { bars }
    }

    pub fn insert(&mut self, symbol: impl Into<String>, bars: Vec<Bar>) {
        self.bars.insert(symbol.into(), bars);
    }
}

impl HistoricalDataSource for MemoryDataSource {
    fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.bars.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    fn bars_for(&self, symbol: &str) -> Result<Vec<Bar>, LoadError> {
        self.bars
            .get(symbol)
            .cloned()
            .ok_or_else(|| LoadError::UnknownSymbol(symbol.to_string()))
    }
}

/// One event from the merged stream. Indices refer back into the stream, so
/// the engine can slice out a no-look-ahead history view.
#[derive(Debug, Clone, Copy)]
pub struct BarEvent {
    pub timestamp: DateTime<Utc>,
    pub symbol_index: usize,
    pub bar_index: usize,
}

/// Validated, symbol-sorted multi-series bar container.
#[derive(Debug, Clone)]
pub struct BarStream {
    series: Vec<(String, Vec<Bar>)>,
}

impl BarStream {
    /// Build a stream from per-symbol series. Fails on an empty symbol set,
    /// an empty series, out-of-order timestamps, or an insane bar.
    pub fn new(bars_by_symbol: HashMap<String, Vec<Bar>>) -> Result<Self, LoadError> {
        if bars_by_symbol.is_empty() {
            return Err(LoadError::EmptySymbolSet);
        }

        let mut series: Vec<(String, Vec<Bar>)> = bars_by_symbol.into_iter().collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));

        for (symbol, bars) in &series {
            if bars.is_empty() {
                return Err(LoadError::EmptySeries(symbol.clone()));
            }
            for (index, bar) in bars.iter().enumerate() {
                if !bar.is_sane() {
                    return Err(LoadError::InvalidBar {
                        symbol: symbol.clone(),
                        timestamp: bar.timestamp,
                        open: bar.open,
                        high: bar.high,
                        low: bar.low,
                        close: bar.close,
                    });
                }
                if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                    return Err(LoadError::NonMonotonicTimestamps {
                        symbol: symbol.clone(),
                        index,
                        timestamp: bar.timestamp,
                    });
                }
            }
        }

        let total: usize = series.iter().map(|(_, bars)| bars.len()).sum();
        tracing::debug!(symbols = series.len(), bars = total, "bar stream ready");
        Ok(Self { series })
    }

    /// Build from a data source, pulling every symbol it advertises.
    pub fn from_source(source: &dyn HistoricalDataSource) -> Result<Self, LoadError> {
        let mut map = HashMap::new();
        for symbol in source.symbols() {
            let bars = source.bars_for(&symbol)?;
            map.insert(symbol, bars);
        }
        Self::new(map)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|(symbol, _)| symbol.as_str())
    }

    pub fn symbol(&self, symbol_index: usize) -> &str {
        &self.series[symbol_index].0
    }

    pub fn bar(&self, event: BarEvent) -> &Bar {
        &self.series[event.symbol_index].1[event.bar_index]
    }

    /// All bars for the event's symbol up to and including the event's bar —
    /// the only view a signal source ever sees.
    pub fn history(&self, event: BarEvent) -> &[Bar] {
        &self.series[event.symbol_index].1[..=event.bar_index]
    }

    pub fn bars(&self, symbol: &str) -> Option<&[Bar]> {
        self.series
            .iter()
            .find(|(name, _)| name == symbol)
            .map(|(_, bars)| bars.as_slice())
    }

    /// Total number of events the iterator will yield.
    pub fn event_count(&self) -> usize {
        self.series.iter().map(|(_, bars)| bars.len()).sum()
    }

    /// Single-pass chronological iterator over all events.
    pub fn iter(&self) -> EventIter<'_> {
        EventIter {
            stream: self,
            cursors: vec![0; self.series.len()],
        }
    }
}

/// Forward merge iterator. At each step it yields the earliest pending bar;
/// timestamp ties resolve to the lowest symbol index (lexicographic order).
pub struct EventIter<'a> {
    stream: &'a BarStream,
    cursors: Vec<usize>,
}

impl Iterator for EventIter<'_> {
    type Item = BarEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let mut best: Option<(DateTime<Utc>, usize)> = None;
        for (symbol_index, (_, bars)) in self.stream.series.iter().enumerate() {
            let cursor = self.cursors[symbol_index];
            if cursor >= bars.len() {
                continue;
            }
            let timestamp = bars[cursor].timestamp;
            match best {
                Some((best_ts, _)) if best_ts <= timestamp => {}
                _ => best = Some((timestamp, symbol_index)),
            }
        }

        let (timestamp, symbol_index) = best?;
        let bar_index = self.cursors[symbol_index];
        self.cursors[symbol_index] += 1;
        Some(BarEvent {
            timestamp,
            symbol_index,
            bar_index,
        })
    }
}
