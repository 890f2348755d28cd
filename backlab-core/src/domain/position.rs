//! Position — a signed-quantity holding in a single symbol.

use crate::domain::time::TimestampNs;
use serde::{Deserialize, Serialize};

/// An open (or previously open) position in a single symbol.
///
/// Quantity is signed: positive = long, negative = short, zero = flat.
/// A position persists after going flat so realized P&L and commission
/// totals survive; when flat, `avg_entry_price` and `unrealized_pnl` are
/// reported as 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub current_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_commission: f64,
    pub opened_at: TimestampNs,
    pub last_updated: TimestampNs,
}

impl Position {
    pub fn new(symbol: String, opened_at: TimestampNs) -> Self {
        Self {
            symbol,
            quantity: 0.0,
            avg_entry_price: 0.0,
            current_price: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_commission: 0.0,
            opened_at,
            last_updated: opened_at,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    /// Signed market value at the current mark.
    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.avg_entry_price
    }

    /// Re-mark against a new price. Idempotent for a given price.
    pub fn update_mark(&mut self, price: f64, timestamp: TimestampNs) {
        self.current_price = price;
        self.unrealized_pnl = if self.is_flat() {
            0.0
        } else {
            (price - self.avg_entry_price) * self.quantity
        };
        self.last_updated = timestamp;
    }
}
