//! Data source traits and feed errors.
//!
//! A `DataSource` can enumerate symbols and open one lazy `EventStream` per
//! symbol. Streams yield events in non-decreasing timestamp order; the
//! replay scheduler merges them into a single timeline.

use crate::domain::MarketEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no backing data for symbol '{symbol}'")]
    SourceNotFound { symbol: String },

    #[error("feed I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lazily yields events for one symbol, cheapest-first.
///
/// Malformed records are the stream's problem: skip them, count them, keep
/// going. Only I/O failures surface as errors.
pub trait EventStream: Send {
    /// The next in-window event, or `None` at end of stream.
    fn next_event(&mut self) -> Result<Option<MarketEvent>, FeedError>;

    /// Records skipped so far because they failed to parse or validate.
    fn skipped_records(&self) -> u64 {
        0
    }
}

/// A collection of per-symbol streams that can be (re-)opened on demand.
///
/// Re-opening is what makes `seek` possible: the scheduler discards live
/// streams and asks the source for fresh ones.
pub trait DataSource: Send {
    /// All symbols this source can serve.
    fn symbols(&self) -> Result<Vec<String>, FeedError>;

    /// Open a stream for one symbol, starting from the beginning.
    fn open(&self, symbol: &str) -> Result<Box<dyn EventStream>, FeedError>;
}
