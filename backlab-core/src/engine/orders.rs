//! Order log — every order ever created in a run, in submission order.

use crate::domain::{Order, OrderId, TimestampNs};

/// Owned by the driver. Orders are never deleted; terminal orders stay for
/// the post-run record.
#[derive(Debug, Default)]
pub struct OrderLog {
    orders: Vec<Order>,
}

impl OrderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: Order) {
        debug_assert!(self.get(order.id).is_none(), "duplicate order id");
        self.orders.push(order);
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        // IDs are dense and allocated in submission order, so the common
        // case is a direct index hit.
        let idx = (id.0 as usize).checked_sub(1)?;
        match self.orders.get(idx) {
            Some(order) if order.id == id => Some(order),
            _ => self.orders.iter().find(|o| o.id == id),
        }
    }

    pub fn get_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        let idx = (id.0 as usize).checked_sub(1)?;
        if self.orders.get(idx).is_some_and(|o| o.id == id) {
            return self.orders.get_mut(idx);
        }
        self.orders.iter_mut().find(|o| o.id == id)
    }

    /// IDs of open orders for `symbol`, in submission order.
    pub fn open_ids_for_symbol(&self, symbol: &str) -> Vec<OrderId> {
        self.orders
            .iter()
            .filter(|o| o.is_open() && o.symbol == symbol)
            .map(|o| o.id)
            .collect()
    }

    /// IDs of all open orders, in submission order.
    pub fn open_ids(&self) -> Vec<OrderId> {
        self.orders.iter().filter(|o| o.is_open()).map(|o| o.id).collect()
    }

    /// Cancel every open order; returns the cancelled IDs.
    pub fn cancel_open(&mut self, timestamp: TimestampNs) -> Vec<OrderId> {
        let mut cancelled = Vec::new();
        for order in self.orders.iter_mut().filter(|o| o.is_open()) {
            order.cancel(timestamp);
            cancelled.push(order.id);
        }
        cancelled
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
