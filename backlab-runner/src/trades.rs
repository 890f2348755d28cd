//! Trade extraction — converts the raw fill log into round-trip trades.
//!
//! A trade opens on the first fill that moves a flat position and closes
//! when the position returns to zero. A fill crossing through zero closes
//! the old trade and opens a new one in the opposite direction, with its
//! commission split pro-rata between the two.

use backlab_core::domain::{Fill, TimestampNs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

/// One completed round trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: TradeSide,
    /// Total quantity entered over the life of the trade.
    pub quantity: f64,
    pub entry_time: TimestampNs,
    pub exit_time: TimestampNs,
    /// Volume-weighted average entry price.
    pub entry_price: f64,
    /// Volume-weighted average exit price.
    pub exit_price: f64,
    /// Gross realized P&L over the round trip.
    pub realized_pnl: f64,
    /// Commissions across every fill of the round trip.
    pub commission: f64,
    /// `realized_pnl - commission`.
    pub net_pnl: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.net_pnl < 0.0
    }
}

struct OpenTrade {
    side: TradeSide,
    /// Open quantity still to be closed (absolute).
    open_qty: f64,
    /// Total quantity entered, for the record.
    entered_qty: f64,
    avg_entry: f64,
    entry_time: TimestampNs,
    exit_notional: f64,
    exit_qty: f64,
    realized: f64,
    commission: f64,
}

impl OpenTrade {
    fn new(side: TradeSide, qty: f64, price: f64, time: TimestampNs, commission: f64) -> Self {
        Self {
            side,
            open_qty: qty,
            entered_qty: qty,
            avg_entry: price,
            entry_time: time,
            exit_notional: 0.0,
            exit_qty: 0.0,
            realized: 0.0,
            commission,
        }
    }

    fn direction(&self) -> f64 {
        match self.side {
            TradeSide::Long => 1.0,
            TradeSide::Short => -1.0,
        }
    }

    fn into_record(self, symbol: &str, exit_time: TimestampNs) -> TradeRecord {
        let exit_price = if self.exit_qty > 0.0 { self.exit_notional / self.exit_qty } else { 0.0 };
        TradeRecord {
            symbol: symbol.to_string(),
            side: self.side,
            quantity: self.entered_qty,
            entry_time: self.entry_time,
            exit_time,
            entry_price: self.avg_entry,
            exit_price,
            realized_pnl: self.realized,
            commission: self.commission,
            net_pnl: self.realized - self.commission,
        }
    }
}

/// Walk the fill log in order and emit completed round trips.
///
/// Positions still open when the log ends produce no record; the
/// performance analyzer only counts completed trades.
pub fn extract_trades(fills: &[Fill]) -> Vec<TradeRecord> {
    enum Action {
        Open,
        Extend,
        Reduce,
    }

    let mut trades = Vec::new();
    let mut open: HashMap<String, OpenTrade> = HashMap::new();

    for fill in fills {
        let delta = fill.side.sign() * fill.quantity;
        let fill_side = if delta > 0.0 { TradeSide::Long } else { TradeSide::Short };

        let action = match open.get(&fill.symbol) {
            None => Action::Open,
            Some(trade) if trade.side == fill_side => Action::Extend,
            Some(_) => Action::Reduce,
        };

        match action {
            Action::Open => {
                open.insert(
                    fill.symbol.clone(),
                    OpenTrade::new(fill_side, fill.quantity, fill.price, fill.timestamp, fill.commission),
                );
            }
            Action::Extend => {
                // Extending: re-weight the entry basis.
                let trade = open.get_mut(&fill.symbol).expect("trade is present");
                let total = trade.open_qty + fill.quantity;
                trade.avg_entry =
                    (trade.avg_entry * trade.open_qty + fill.price * fill.quantity) / total;
                trade.open_qty = total;
                trade.entered_qty += fill.quantity;
                trade.commission += fill.commission;
            }
            Action::Reduce => {
                // Reducing, closing, or crossing through zero.
                let trade = open.get_mut(&fill.symbol).expect("trade is present");
                let closing = fill.quantity.min(trade.open_qty);
                let closing_fraction = closing / fill.quantity;

                trade.realized += (fill.price - trade.avg_entry) * closing * trade.direction();
                trade.exit_notional += fill.price * closing;
                trade.exit_qty += closing;
                trade.commission += fill.commission * closing_fraction;
                trade.open_qty -= closing;
                let finished = trade.open_qty <= 0.0;

                if finished {
                    let done = open.remove(&fill.symbol).expect("trade is present");
                    trades.push(done.into_record(&fill.symbol, fill.timestamp));

                    let remainder = fill.quantity - closing;
                    if remainder > 0.0 {
                        open.insert(
                            fill.symbol.clone(),
                            OpenTrade::new(
                                fill_side,
                                remainder,
                                fill.price,
                                fill.timestamp,
                                fill.commission * (1.0 - closing_fraction),
                            ),
                        );
                    }
                }
            }
        }
    }

    trades
}
