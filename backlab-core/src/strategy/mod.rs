//! Strategy capability surface.
//!
//! A strategy is a value implementing a small handler set with no-op
//! defaults. The engine owns the strategies; the context is lent into each
//! callback, which is the only window in which orders can be placed.

pub mod examples;

use crate::domain::{Bar, Fill, Order, Tick};
use crate::engine::context::Context;

pub use examples::{BuyAndHold, SmaCrossover};

/// Event handlers a trading strategy may implement. Only `on_bar` is
/// required.
pub trait Strategy: Send {
    /// Short name used in logs and result metadata.
    fn name(&self) -> &str;

    /// Called once before the first event, with an empty portfolio.
    fn on_init(&mut self, _ctx: &mut Context) {}

    /// Called for every bar in timeline order.
    fn on_bar(&mut self, ctx: &mut Context, bar: &Bar);

    /// Called for every tick in timeline order.
    fn on_tick(&mut self, _ctx: &mut Context, _tick: &Tick) {}

    /// Called when an order changes status (accepted, rejected, cancelled,
    /// expired, filled).
    fn on_order_update(&mut self, _ctx: &mut Context, _order: &Order) {}

    /// Called for every fill, after `on_bar` for the triggering bar has
    /// returned to every strategy.
    fn on_fill(&mut self, _ctx: &mut Context, _fill: &Fill) {}
}
