//! Market event — the tagged union the replay scheduler merges on.

use crate::domain::{Bar, Tick, TimestampNs};
use serde::{Deserialize, Serialize};

/// One observation from a data source.
///
/// The scheduler orders events purely by `timestamp()`; everything else is
/// payload for the driver's dispatch match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MarketEvent {
    Bar(Bar),
    Tick(Tick),
}

impl MarketEvent {
    pub fn timestamp(&self) -> TimestampNs {
        match self {
            MarketEvent::Bar(bar) => bar.timestamp,
            MarketEvent::Tick(tick) => tick.timestamp,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Bar(bar) => &bar.symbol,
            MarketEvent::Tick(tick) => &tick.symbol,
        }
    }
}
