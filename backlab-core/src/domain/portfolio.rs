use crate::domain::position::Position;
use crate::domain::time::TimestampNs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Portfolio state: cash plus positions, marked to market.
///
/// The accountant is the only writer; strategies see it read-only through
/// the context. Positions live in a `BTreeMap` so equity sums over them in
/// a fixed order and replays stay bitwise reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub equity: f64,
    pub positions: BTreeMap<String, Position>,
    pub last_updated: TimestampNs,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            equity: initial_cash,
            positions: BTreeMap::new(),
            last_updated: 0,
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Sum of signed position market values.
    pub fn positions_value(&self) -> f64 {
        self.positions.values().map(Position::market_value).sum()
    }

    /// Positions with nonzero quantity.
    pub fn num_open_positions(&self) -> usize {
        self.positions.values().filter(|p| !p.is_flat()).count()
    }
}
