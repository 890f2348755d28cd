use crate::domain::ids::OrderId;
use crate::domain::time::TimestampNs;
use serde::{Deserialize, Serialize};

/// Order side.
///
/// `Short` and `Cover` exist so strategies can state intent explicitly;
/// cash and position arithmetic only distinguishes the buy/sell direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
    Short,
    Cover,
}

impl OrderSide {
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy | OrderSide::Cover)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, OrderSide::Sell | OrderSide::Short)
    }

    /// +1 for buys, -1 for sells. Used for signed position deltas and
    /// adverse slippage direction.
    pub fn sign(&self) -> f64 {
        if self.is_buy() {
            1.0
        } else {
            -1.0
        }
    }
}

/// Order type taxonomy. Trigger and limit prices live in the variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit { limit_price: f64 },
    Stop { stop_price: f64 },
    StopLimit { stop_price: f64, limit_price: f64 },
}

impl OrderType {
    pub fn limit_price(&self) -> Option<f64> {
        match self {
            OrderType::Limit { limit_price } => Some(*limit_price),
            OrderType::StopLimit { limit_price, .. } => Some(*limit_price),
            _ => None,
        }
    }

    pub fn stop_price(&self) -> Option<f64> {
        match self {
            OrderType::Stop { stop_price } => Some(*stop_price),
            OrderType::StopLimit { stop_price, .. } => Some(*stop_price),
            _ => None,
        }
    }

    /// Stop and stop-limit orders must arm before they can fill.
    pub fn requires_trigger(&self) -> bool {
        matches!(self, OrderType::Stop { .. } | OrderType::StopLimit { .. })
    }
}

/// Time-in-force policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Expires at the end of the trading day it was submitted on.
    Day,
    /// Good till cancelled.
    Gtc,
    /// Immediate-or-cancel: any remainder after the first attempt is cancelled.
    Ioc,
    /// Fill-or-kill: cancelled entirely unless the bar's liquidity covers it.
    Fok,
}

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Entered the pending queue, not yet seen by the simulator.
    Submitted,
    /// Seen by the simulator at least once without filling.
    Accepted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

/// An order with full lifecycle tracking.
///
/// Orders are created by the strategy context, mutated only by the
/// execution simulator and driver, and retained in the order log for the
/// lifetime of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: f64,
    pub tif: TimeInForce,
    pub status: OrderStatus,

    pub filled_quantity: f64,
    pub remaining_quantity: f64,
    pub avg_fill_price: f64,

    /// Stop (and stop-limit) orders set this once the bar range crosses the
    /// stop price; from then on they fill as market (resp. limit) orders.
    pub triggered: bool,

    pub created_at: TimestampNs,
    pub updated_at: TimestampNs,
    pub filled_at: Option<TimestampNs>,

    pub rejection_reason: Option<String>,
}

impl Order {
    pub fn new(
        id: OrderId,
        symbol: String,
        order_type: OrderType,
        side: OrderSide,
        quantity: f64,
        tif: TimeInForce,
        created_at: TimestampNs,
    ) -> Self {
        Self {
            id,
            symbol,
            order_type,
            side,
            quantity,
            tif,
            status: OrderStatus::Submitted,
            filled_quantity: 0.0,
            remaining_quantity: quantity,
            avg_fill_price: 0.0,
            triggered: false,
            created_at,
            updated_at: created_at,
            filled_at: None,
            rejection_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Submitted | OrderStatus::Accepted | OrderStatus::PartiallyFilled
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    /// Record a fill against this order, maintaining the quantity
    /// conservation invariant and the volume-weighted average fill price.
    ///
    /// Remainders below 1e-9 are snapped to exactly zero so filling "the
    /// rest" always reaches the terminal state despite float rounding.
    pub fn apply_fill(&mut self, quantity: f64, price: f64, timestamp: TimestampNs) {
        debug_assert!(quantity > 0.0 && quantity <= self.remaining_quantity + 1e-9);

        let prior = self.filled_quantity;
        self.avg_fill_price =
            (self.avg_fill_price * prior + price * quantity) / (prior + quantity);
        self.remaining_quantity -= quantity;
        self.updated_at = timestamp;

        if self.remaining_quantity.abs() < 1e-9 {
            self.remaining_quantity = 0.0;
            self.filled_quantity = self.quantity;
            self.status = OrderStatus::Filled;
            self.filled_at = Some(timestamp);
        } else {
            self.filled_quantity = self.quantity - self.remaining_quantity;
            self.status = OrderStatus::PartiallyFilled;
        }
    }

    /// Cancel if not already terminal. Any unfilled remainder is forfeited.
    pub fn cancel(&mut self, timestamp: TimestampNs) {
        if !self.is_terminal() {
            self.status = OrderStatus::Cancelled;
            self.remaining_quantity = 0.0;
            self.updated_at = timestamp;
        }
    }

    /// Reject with a reason; terminal.
    pub fn reject(&mut self, reason: impl Into<String>, timestamp: TimestampNs) {
        if !self.is_terminal() {
            self.status = OrderStatus::Rejected;
            self.remaining_quantity = 0.0;
            self.rejection_reason = Some(reason.into());
            self.updated_at = timestamp;
        }
    }

    /// Expire (DAY order past its trading day); terminal.
    pub fn expire(&mut self, timestamp: TimestampNs) {
        if !self.is_terminal() {
            self.status = OrderStatus::Expired;
            self.remaining_quantity = 0.0;
            self.updated_at = timestamp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market_order(qty: f64) -> Order {
        Order::new(
            OrderId(1),
            "SPY".into(),
            OrderType::Market,
            OrderSide::Buy,
            qty,
            TimeInForce::Gtc,
            0,
        )
    }

    #[test]
    fn full_fill_reaches_terminal_state() {
        let mut order = market_order(100.0);
        order.apply_fill(100.0, 50.0, 10);

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_quantity, 100.0);
        assert_eq!(order.remaining_quantity, 0.0);
        assert_eq!(order.avg_fill_price, 50.0);
        assert_eq!(order.filled_at, Some(10));
        assert!(order.is_terminal());
    }

    #[test]
    fn partial_fills_conserve_quantity_and_average_price() {
        let mut order = market_order(100.0);

        order.apply_fill(40.0, 10.0, 1);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.filled_quantity + order.remaining_quantity, order.quantity);

        order.apply_fill(60.0, 20.0, 2);
        assert_eq!(order.status, OrderStatus::Filled);
        // Weighted: (40*10 + 60*20) / 100 = 16
        assert!((order.avg_fill_price - 16.0).abs() < 1e-12);
    }

    #[test]
    fn cancel_zeroes_remainder() {
        let mut order = market_order(100.0);
        order.apply_fill(30.0, 10.0, 1);
        order.cancel(2);

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.remaining_quantity, 0.0);
        assert_eq!(order.filled_quantity, 30.0);
    }

    #[test]
    fn cancel_is_noop_on_terminal_order() {
        let mut order = market_order(10.0);
        order.apply_fill(10.0, 5.0, 1);
        order.cancel(2);
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn reject_records_reason() {
        let mut order = market_order(10.0);
        order.reject("insufficient funds", 1);
        assert_eq!(order.status, OrderStatus::Rejected);
        assert_eq!(order.rejection_reason.as_deref(), Some("insufficient funds"));
    }

    #[test]
    fn side_signs() {
        assert_eq!(OrderSide::Buy.sign(), 1.0);
        assert_eq!(OrderSide::Cover.sign(), 1.0);
        assert_eq!(OrderSide::Sell.sign(), -1.0);
        assert_eq!(OrderSide::Short.sign(), -1.0);
    }

    #[test]
    fn stop_limit_exposes_both_prices() {
        let ot = OrderType::StopLimit { stop_price: 95.0, limit_price: 94.0 };
        assert_eq!(ot.stop_price(), Some(95.0));
        assert_eq!(ot.limit_price(), Some(94.0));
        assert!(ot.requires_trigger());
    }
}
