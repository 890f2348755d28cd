//! In-memory time-series store.
//!
//! Holds bars per symbol, sorted by timestamp. Writers take the lock
//! exclusively; readers may run concurrently between writes. On a
//! timestamp tie the last write wins.

use crate::domain::time::{TimestampNs, NANOS_PER_SEC};
use crate::domain::{Bar, MarketEvent, Tick};
use crate::feed::source::{DataSource, EventStream, FeedError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Program-held bar storage, shareable across threads behind `Arc`.
#[derive(Default)]
pub struct MemoryTimeSeriesStore {
    inner: RwLock<HashMap<String, Vec<Bar>>>,
}

impl MemoryTimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a single bar, keeping the symbol's series sorted.
    pub fn write_bar(&self, bar: Bar) {
        let mut inner = self.inner.write();
        let bars = inner.entry(bar.symbol.clone()).or_default();
        match bars.binary_search_by_key(&bar.timestamp, |b| b.timestamp) {
            Ok(i) => bars[i] = bar,
            Err(i) => bars.insert(i, bar),
        }
    }

    /// Store a tick as a degenerate one-second bar.
    pub fn write_tick(&self, tick: &Tick) {
        self.write_bar(Bar {
            symbol: tick.symbol.clone(),
            timestamp: tick.timestamp,
            open: tick.last,
            high: tick.last,
            low: tick.last,
            close: tick.last,
            volume: (tick.bid_size + tick.ask_size) as f64,
            period: NANOS_PER_SEC,
        });
    }

    /// Bulk insert: merge-sort-deduplicate per symbol, last write wins on
    /// timestamp ties.
    pub fn write_batch(&self, bars: Vec<Bar>) {
        if bars.is_empty() {
            return;
        }

        let mut grouped: HashMap<String, Vec<Bar>> = HashMap::new();
        for bar in bars {
            grouped.entry(bar.symbol.clone()).or_default().push(bar);
        }

        let mut inner = self.inner.write();
        for (symbol, mut incoming) in grouped {
            incoming.sort_by_key(|b| b.timestamp);
            // Within a batch the last row for a timestamp wins, so dedup
            // from the back.
            incoming.reverse();
            incoming.dedup_by_key(|b| b.timestamp);
            incoming.reverse();
            let existing = inner.entry(symbol).or_default();

            let mut merged: Vec<Bar> = Vec::with_capacity(existing.len() + incoming.len());
            let mut i = 0;
            let mut j = 0;
            while i < existing.len() && j < incoming.len() {
                if existing[i].timestamp < incoming[j].timestamp {
                    merged.push(existing[i].clone());
                    i += 1;
                } else if existing[i].timestamp > incoming[j].timestamp {
                    merged.push(incoming[j].clone());
                    j += 1;
                } else {
                    // Tie: the incoming write replaces the stored bar.
                    merged.push(incoming[j].clone());
                    i += 1;
                    j += 1;
                }
            }
            merged.extend_from_slice(&existing[i..]);
            merged.extend_from_slice(&incoming[j..]);
            merged.dedup_by_key(|b| b.timestamp);

            *existing = merged;
        }
    }

    /// All bars for `symbol` with `start <= timestamp <= end`.
    pub fn read_bars(&self, symbol: &str, start: TimestampNs, end: TimestampNs) -> Vec<Bar> {
        let inner = self.inner.read();
        let Some(bars) = inner.get(symbol) else {
            return Vec::new();
        };
        let lo = bars.partition_point(|b| b.timestamp < start);
        let hi = bars.partition_point(|b| b.timestamp <= end);
        bars[lo..hi].to_vec()
    }

    pub fn read_latest_bar(&self, symbol: &str) -> Option<Bar> {
        self.inner.read().get(symbol).and_then(|bars| bars.last().cloned())
    }

    pub fn list_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.inner.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn first_timestamp(&self, symbol: &str) -> Option<TimestampNs> {
        self.inner.read().get(symbol).and_then(|bars| bars.first().map(|b| b.timestamp))
    }

    pub fn last_timestamp(&self, symbol: &str) -> Option<TimestampNs> {
        self.inner.read().get(symbol).and_then(|bars| bars.last().map(|b| b.timestamp))
    }

    pub fn bar_count(&self, symbol: &str) -> usize {
        self.inner.read().get(symbol).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

/// Snapshot stream over one symbol's stored bars.
struct StoreBarStream {
    bars: std::vec::IntoIter<Bar>,
}

impl EventStream for StoreBarStream {
    fn next_event(&mut self) -> Result<Option<MarketEvent>, FeedError> {
        Ok(self.bars.next().map(MarketEvent::Bar))
    }
}

impl DataSource for Arc<MemoryTimeSeriesStore> {
    fn symbols(&self) -> Result<Vec<String>, FeedError> {
        Ok(self.list_symbols())
    }

    fn open(&self, symbol: &str) -> Result<Box<dyn EventStream>, FeedError> {
        let inner = self.inner.read();
        let bars = inner
            .get(symbol)
            .ok_or_else(|| FeedError::SourceNotFound { symbol: symbol.to_string() })?;
        Ok(Box::new(StoreBarStream { bars: bars.clone().into_iter() }))
    }
}

/// Owned adapter so a scheduler can hold store data without borrowing.
pub struct StoreSnapshotSource {
    data: HashMap<String, Vec<Bar>>,
}

impl StoreSnapshotSource {
    pub fn from_store(store: &MemoryTimeSeriesStore) -> Self {
        Self { data: store.inner.read().clone() }
    }

    pub fn from_bars(bars: Vec<Bar>) -> Self {
        let mut data: HashMap<String, Vec<Bar>> = HashMap::new();
        for bar in bars {
            data.entry(bar.symbol.clone()).or_default().push(bar);
        }
        for series in data.values_mut() {
            series.sort_by_key(|b| b.timestamp);
        }
        Self { data }
    }
}

impl DataSource for StoreSnapshotSource {
    fn symbols(&self) -> Result<Vec<String>, FeedError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn open(&self, symbol: &str) -> Result<Box<dyn EventStream>, FeedError> {
        let bars = self
            .data
            .get(symbol)
            .ok_or_else(|| FeedError::SourceNotFound { symbol: symbol.to_string() })?;
        Ok(Box::new(StoreBarStream { bars: bars.clone().into_iter() }))
    }
}
