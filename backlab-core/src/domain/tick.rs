use crate::domain::time::TimestampNs;
use serde::{Deserialize, Serialize};

/// Top-of-book quote and last trade for a symbol at an instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub timestamp: TimestampNs,
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: u32,
    pub ask_size: u32,
}

impl Tick {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    pub fn spread_bps(&self) -> f64 {
        let mid = self.mid();
        if mid <= 0.0 {
            return 0.0;
        }
        (self.spread() / mid) * 10_000.0
    }
}
