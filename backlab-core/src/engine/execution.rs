//! Execution simulator — decides, for each pending order, whether and at
//! what price it fills given the current bar.
//!
//! Default policy: market orders fill at the bar close with adverse
//! slippage; limit orders fill without slippage when the bar touches the
//! limit; stops arm when the bar range crosses the stop price. Orders fill
//! in submission order and each fill is applied to the accountant before
//! the next order is considered, so cash constraints see intermediate
//! state.

use crate::config::BacktestConfig;
use crate::domain::time::trading_day;
use crate::domain::{Bar, Fill, IdGen, Order, OrderId, OrderStatus, OrderType, TimeInForce};
use crate::engine::accounting::{AccountingError, PortfolioAccountant};
use crate::engine::orders::OrderLog;
use tracing::debug;

/// Stateless fill policy over the pending order queue.
#[derive(Debug)]
pub struct ExecutionSimulator {
    config: BacktestConfig,
}

/// Price decision for one eligible order on one bar.
struct Quote {
    price: f64,
    /// Per-unit adverse shift already included in `price`.
    slippage: f64,
}

impl ExecutionSimulator {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Walk pending orders for the bar's symbol, producing fills and
    /// applying each to the accountant as it happens. Status changes are
    /// appended to `updates` for `on_order_update` delivery.
    pub fn process_bar(
        &self,
        bar: &Bar,
        orders: &mut OrderLog,
        accountant: &mut PortfolioAccountant,
        ids: &mut IdGen,
        updates: &mut Vec<OrderId>,
    ) -> Result<Vec<Fill>, AccountingError> {
        self.expire_day_orders(bar, orders, updates);

        let mut fills = Vec::new();

        for id in orders.open_ids_for_symbol(&bar.symbol) {
            let order = orders.get_mut(id).expect("open id came from the log");

            let quote = self.quote(order, bar);

            // FOK: kill unless this bar can fill the whole remainder.
            if order.tif == TimeInForce::Fok {
                let liquidity = self.config.fill_volume_limit * bar.volume;
                let whole = quote.is_some() && order.remaining_quantity <= liquidity;
                if !whole {
                    order.cancel(bar.timestamp);
                    updates.push(id);
                    continue;
                }
            }

            let Some(quote) = quote else {
                if order.status == OrderStatus::Submitted {
                    order.status = OrderStatus::Accepted;
                    updates.push(id);
                }
                if order.tif == TimeInForce::Ioc {
                    order.cancel(bar.timestamp);
                    updates.push(id);
                }
                continue;
            };

            let fill_qty = order
                .remaining_quantity
                .min(self.config.fill_volume_limit * bar.volume);
            if fill_qty <= 0.0 {
                continue;
            }

            let commission = (fill_qty * quote.price).abs() * self.config.commission_rate;

            // Cash and position constraints, checked against the
            // accountant's current (mid-bar) state.
            if order.side.is_buy() {
                let cost = fill_qty * quote.price + commission;
                if cost > accountant.cash() {
                    order.reject("insufficient funds", bar.timestamp);
                    updates.push(id);
                    debug!(%id, cost, cash = accountant.cash(), "buy rejected");
                    continue;
                }
            } else if !self.config.allow_short {
                let held = accountant
                    .portfolio()
                    .position(&bar.symbol)
                    .map_or(0.0, |p| p.quantity);
                if fill_qty > held {
                    order.reject("sell exceeds position; shorting disabled", bar.timestamp);
                    updates.push(id);
                    continue;
                }
            }

            let fill = Fill {
                id: ids.next_fill_id(),
                order_id: id,
                symbol: bar.symbol.clone(),
                side: order.side,
                quantity: fill_qty,
                price: quote.price,
                commission,
                slippage: quote.slippage,
                timestamp: bar.timestamp,
            };

            order.apply_fill(fill_qty, quote.price, bar.timestamp);
            if order.tif == TimeInForce::Ioc && order.is_open() {
                order.cancel(bar.timestamp);
            }
            updates.push(id);

            accountant.apply_fill(&fill)?;
            fills.push(fill);
        }

        Ok(fills)
    }

    /// Price an order against a bar, arming stops as a side effect.
    /// `None` means the order stays pending.
    fn quote(&self, order: &mut Order, bar: &Bar) -> Option<Quote> {
        let sign = order.side.sign();
        let bps = self.config.slippage_bps;

        match order.order_type {
            OrderType::Market => {
                let slippage = bar.close * bps / 10_000.0;
                Some(Quote { price: bar.close + sign * slippage, slippage })
            }
            OrderType::Limit { limit_price } => Self::limit_quote(sign, limit_price, bar),
            OrderType::Stop { stop_price } => {
                if !order.triggered {
                    order.triggered = Self::stop_crossed(sign, stop_price, bar);
                }
                if !order.triggered {
                    return None;
                }
                // Armed: market at the stop price, slippage applied.
                let slippage = stop_price * bps / 10_000.0;
                Some(Quote { price: stop_price + sign * slippage, slippage })
            }
            OrderType::StopLimit { stop_price, limit_price } => {
                if !order.triggered {
                    order.triggered = Self::stop_crossed(sign, stop_price, bar);
                }
                if !order.triggered {
                    return None;
                }
                Self::limit_quote(sign, limit_price, bar)
            }
        }
    }

    /// Limit fills take no slippage: buys need the bar to trade down to
    /// the limit and fill at the better of limit and open; sells mirror.
    fn limit_quote(sign: f64, limit_price: f64, bar: &Bar) -> Option<Quote> {
        if sign > 0.0 {
            (bar.low <= limit_price)
                .then(|| Quote { price: limit_price.min(bar.open), slippage: 0.0 })
        } else {
            (bar.high >= limit_price)
                .then(|| Quote { price: limit_price.max(bar.open), slippage: 0.0 })
        }
    }

    fn stop_crossed(sign: f64, stop_price: f64, bar: &Bar) -> bool {
        if sign > 0.0 {
            bar.high >= stop_price
        } else {
            bar.low <= stop_price
        }
    }

    /// DAY orders expire once the clock leaves their submission day.
    fn expire_day_orders(&self, bar: &Bar, orders: &mut OrderLog, updates: &mut Vec<OrderId>) {
        let today = trading_day(bar.timestamp);
        for id in orders.open_ids() {
            let order = orders.get_mut(id).expect("open id came from the log");
            if order.tif == TimeInForce::Day && trading_day(order.created_at) < today {
                order.expire(bar.timestamp);
                updates.push(id);
            }
        }
    }
}
