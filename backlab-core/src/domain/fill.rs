//! Fill — a realization of an order, in whole or part.

use crate::domain::ids::{FillId, OrderId};
use crate::domain::order::OrderSide;
use crate::domain::time::TimestampNs;
use serde::{Deserialize, Serialize};

/// Record of an order execution. Immutable once emitted; references its
/// order by ID, never by pointer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub id: FillId,
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub commission: f64,
    /// Per-unit adverse price shift already baked into `price`, recorded
    /// for attribution.
    pub slippage: f64,
    pub timestamp: TimestampNs,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }

    /// Notional plus commission; what a buy costs in cash.
    pub fn total_cost(&self) -> f64 {
        self.notional() + self.commission
    }
}
