//! Strategy context — the capability surface a strategy may call during an
//! event handler.
//!
//! The context is constructed by the driver and lent to each callback, so
//! order submission outside a callback is unrepresentable. Submissions made
//! while handling event E enter the pending queue before any execution
//! attempt triggered by E.

use crate::domain::{
    IdGen, Order, OrderId, OrderSide, OrderType, Portfolio, Position, TimeInForce, TimestampNs,
};
use crate::engine::orders::OrderLog;
use crate::engine::risk::RiskManager;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ContextError {
    /// Malformed request: non-positive quantity, or a cancel for an ID the
    /// order log has never seen.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The registered risk manager vetoed the order. The order is retained
    /// in the log with REJECTED status.
    #[error("risk rejected: {0}")]
    RiskRejected(String),
}

/// Lent to strategies for the duration of one callback.
pub struct Context<'a> {
    now: TimestampNs,
    portfolio: &'a Portfolio,
    orders: &'a mut OrderLog,
    ids: &'a mut IdGen,
    risk: Option<&'a dyn RiskManager>,
    /// Orders whose status changed during this callback; the driver turns
    /// these into `on_order_update` deliveries.
    updates: &'a mut Vec<OrderId>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        now: TimestampNs,
        portfolio: &'a Portfolio,
        orders: &'a mut OrderLog,
        ids: &'a mut IdGen,
        risk: Option<&'a dyn RiskManager>,
        updates: &'a mut Vec<OrderId>,
    ) -> Self {
        Self { now, portfolio, orders, ids, risk, updates }
    }

    /// Submit a buy. `price <= 0` means market, otherwise a limit at
    /// `price`.
    pub fn buy(&mut self, symbol: &str, quantity: f64, price: f64) -> Result<OrderId, ContextError> {
        let order_type = if price > 0.0 {
            OrderType::Limit { limit_price: price }
        } else {
            OrderType::Market
        };
        self.submit(symbol, OrderSide::Buy, order_type, quantity, TimeInForce::Gtc)
    }

    /// Submit a sell. `price <= 0` means market, otherwise a limit at
    /// `price`.
    pub fn sell(&mut self, symbol: &str, quantity: f64, price: f64) -> Result<OrderId, ContextError> {
        let order_type = if price > 0.0 {
            OrderType::Limit { limit_price: price }
        } else {
            OrderType::Market
        };
        self.submit(symbol, OrderSide::Sell, order_type, quantity, TimeInForce::Gtc)
    }

    /// Full-control submission: any side, order type, and time-in-force.
    pub fn submit(
        &mut self,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        quantity: f64,
        tif: TimeInForce,
    ) -> Result<OrderId, ContextError> {
        if quantity <= 0.0 {
            return Err(ContextError::InvalidState(format!(
                "order quantity must be strictly positive, got {quantity}"
            )));
        }

        let id = self.ids.next_order_id();
        let mut order = Order::new(id, symbol.to_string(), order_type, side, quantity, tif, self.now);

        if let Some(risk) = self.risk {
            if let Err(reason) = risk.validate_order(&order, self.portfolio) {
                order.reject(reason.clone(), self.now);
                self.orders.insert(order);
                self.updates.push(id);
                debug!(%id, symbol, %reason, "order rejected by risk manager");
                return Err(ContextError::RiskRejected(reason));
            }
        }

        debug!(%id, symbol, ?side, ?order_type, quantity, "order submitted");
        self.orders.insert(order);
        Ok(id)
    }

    /// Cancel an order. No-op if the order is already terminal; an unknown
    /// ID is an error.
    pub fn cancel_order(&mut self, id: OrderId) -> Result<(), ContextError> {
        let order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| ContextError::InvalidState(format!("cancel of unknown order {id}")))?;

        if order.is_terminal() {
            return Ok(());
        }
        order.cancel(self.now);
        self.updates.push(id);
        Ok(())
    }

    /// Read-only view of the order log entry.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    /// The position for `symbol`, if the symbol has ever traded.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.portfolio.position(symbol)
    }

    /// Snapshot-style read of the whole portfolio.
    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    /// Timestamp of the event being handled.
    pub fn current_time(&self) -> TimestampNs {
        self.now
    }
}
