//! Replay scheduler — merges per-symbol lazy streams into one monotonic
//! timeline, optionally paced against the wall clock.
//!
//! The frontier heap holds at most one event per subscribed symbol, so the
//! merge is O(log N) per event and bounded in memory regardless of stream
//! length. Timestamp ties resolve by subscription order, which makes the
//! merge stable across runs.

use crate::config::FeedConfig;
use crate::domain::time::TimestampNs;
use crate::domain::MarketEvent;
use crate::feed::source::{DataSource, EventStream, FeedError};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// One frontier entry: the next undelivered event of one stream.
struct Frontier {
    timestamp: TimestampNs,
    sub_index: usize,
    event: MarketEvent,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.sub_index == other.sub_index
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.timestamp, self.sub_index).cmp(&(other.timestamp, other.sub_index))
    }
}

struct Subscription {
    symbol: String,
    stream: Box<dyn EventStream>,
    /// Skipped-record count carried over from streams discarded by `seek`.
    skipped_before_seek: u64,
}

/// Merges N per-symbol streams into a single non-decreasing event sequence.
pub struct ReplayScheduler {
    source: Box<dyn DataSource>,
    config: FeedConfig,
    subscriptions: Vec<Subscription>,
    heap: BinaryHeap<Reverse<Frontier>>,
    current_time: TimestampNs,
    /// Pacing reference points, set on the first paced delivery.
    sim_start: Option<TimestampNs>,
    wall_start: Option<Instant>,
}

impl ReplayScheduler {
    pub fn new(source: Box<dyn DataSource>, config: FeedConfig) -> Self {
        let current_time = config.start_time;
        Self {
            source,
            config,
            subscriptions: Vec::new(),
            heap: BinaryHeap::new(),
            current_time,
            sim_start: None,
            wall_start: None,
        }
    }

    /// Open a lazy stream for `symbol` and add it to the merge.
    ///
    /// Subscription order is the timestamp tiebreak, so subscribe in the
    /// order you want equal-timestamp events delivered.
    pub fn subscribe(&mut self, symbol: &str) -> Result<(), FeedError> {
        if self.subscriptions.iter().any(|s| s.symbol == symbol) {
            return Ok(());
        }

        let mut stream = self.source.open(symbol)?;
        let sub_index = self.subscriptions.len();
        if let Some(event) = stream.next_event()? {
            self.heap.push(Reverse(Frontier {
                timestamp: event.timestamp(),
                sub_index,
                event,
            }));
        }
        self.subscriptions.push(Subscription {
            symbol: symbol.to_string(),
            stream,
            skipped_before_seek: 0,
        });
        debug!(symbol, sub_index, "subscribed");
        Ok(())
    }

    /// Subscribe to every symbol the source offers. Returns the symbols in
    /// subscription order.
    pub fn subscribe_all(&mut self) -> Result<Vec<String>, FeedError> {
        let symbols = self.source.symbols()?;
        for symbol in &symbols {
            self.subscribe(symbol)?;
        }
        Ok(symbols)
    }

    /// Reposition all streams so the next delivered event has
    /// `timestamp >= ts`. Clears queued frontier events and resets pacing.
    pub fn seek(&mut self, ts: TimestampNs) -> Result<(), FeedError> {
        self.heap.clear();
        self.sim_start = None;
        self.wall_start = None;

        for (sub_index, sub) in self.subscriptions.iter_mut().enumerate() {
            sub.skipped_before_seek += sub.stream.skipped_records();
            let mut stream = self.source.open(&sub.symbol)?;
            loop {
                match stream.next_event()? {
                    Some(event) if event.timestamp() < ts => continue,
                    Some(event) => {
                        self.heap.push(Reverse(Frontier {
                            timestamp: event.timestamp(),
                            sub_index,
                            event,
                        }));
                        break;
                    }
                    None => break,
                }
            }
            sub.stream = stream;
        }

        self.current_time = ts;
        debug!(ts, "seek complete");
        Ok(())
    }

    /// Pop the next event in timeline order, refilling the popped symbol's
    /// frontier slot. Returns `None` once every stream is exhausted (unless
    /// looping is configured).
    pub fn next_event(&mut self) -> Result<Option<MarketEvent>, FeedError> {
        loop {
            let Some(Reverse(frontier)) = self.heap.pop() else {
                if self.config.loop_replay && !self.subscriptions.is_empty() {
                    self.seek(self.config.start_time)?;
                    if self.heap.is_empty() {
                        return Ok(None);
                    }
                    continue;
                }
                return Ok(None);
            };

            // Refill the frontier from the stream that produced this event.
            let sub = &mut self.subscriptions[frontier.sub_index];
            if let Some(next) = sub.stream.next_event()? {
                self.heap.push(Reverse(Frontier {
                    timestamp: next.timestamp(),
                    sub_index: frontier.sub_index,
                    event: next,
                }));
            }

            self.pace(frontier.timestamp);
            self.current_time = frontier.timestamp;
            trace!(ts = frontier.timestamp, symbol = frontier.event.symbol(), "event");
            return Ok(Some(frontier.event));
        }
    }

    /// Sleep so simulated time divided by the speed multiplier tracks the
    /// wall clock. Never re-orders events, only delays delivery.
    fn pace(&mut self, ts: TimestampNs) {
        if self.config.replay_speed <= 0.0 {
            return;
        }
        let sim_start = *self.sim_start.get_or_insert(ts);
        let wall_start = *self.wall_start.get_or_insert_with(Instant::now);

        let sim_elapsed = (ts - sim_start).max(0) as f64;
        let target_real = Duration::from_nanos((sim_elapsed / self.config.replay_speed) as u64);
        let wall_elapsed = wall_start.elapsed();
        if wall_elapsed < target_real {
            std::thread::sleep(target_real - wall_elapsed);
        }
    }

    /// Change the pacing multiplier. 0 disables pacing.
    pub fn set_speed(&mut self, multiplier: f64) {
        self.config.replay_speed = multiplier;
        self.sim_start = None;
        self.wall_start = None;
    }

    /// Timestamp of the most recently delivered event.
    pub fn current_time(&self) -> TimestampNs {
        self.current_time
    }

    /// Fraction of the configured window already replayed; 0 when the
    /// window is unbounded.
    pub fn progress(&self) -> f64 {
        let span = self.config.end_time - self.config.start_time;
        if span <= 0 {
            return 0.0;
        }
        (self.current_time - self.config.start_time) as f64 / span as f64
    }

    pub fn num_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn subscribed_symbols(&self) -> Vec<String> {
        self.subscriptions.iter().map(|s| s.symbol.clone()).collect()
    }

    /// Total records skipped as malformed across all streams, including
    /// streams replaced by `seek`.
    pub fn skipped_records(&self) -> u64 {
        self.subscriptions
            .iter()
            .map(|s| s.skipped_before_seek + s.stream.skipped_records())
            .sum()
    }
}
