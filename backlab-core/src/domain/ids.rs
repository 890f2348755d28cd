//! Dense integer identifiers for orders and fills.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order ID, dense and starting at 1 within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fill ID, dense and starting at 1 within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FillId(pub u64);

impl fmt::Display for FillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out order and fill IDs for a single run.
///
/// IDs are allocated in submission order, which doubles as the tiebreak
/// used when the execution simulator walks pending orders.
#[derive(Debug, Clone)]
pub struct IdGen {
    next_order: u64,
    next_fill: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self { next_order: 1, next_fill: 1 }
    }

    pub fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order);
        self.next_order += 1;
        id
    }

    pub fn next_fill_id(&mut self) -> FillId {
        let id = FillId(self.next_fill);
        self.next_fill += 1;
        id
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}
