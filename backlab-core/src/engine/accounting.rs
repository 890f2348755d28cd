//! Portfolio accountant — the single source of truth for cash, positions,
//! realized/unrealized P&L, and equity.

use crate::domain::{Bar, Fill, Portfolio, Position, TimestampNs};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// Relative tolerance for the equity identity check.
const IDENTITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum AccountingError {
    /// The double-entry identity failed; fatal by design. Carries a full
    /// portfolio diagnostic for the post-mortem.
    #[error("portfolio invariant violated: {details}\n{diagnostic}")]
    InvariantViolated { details: String, diagnostic: String },
}

/// Applies fills and marks-to-market. Owns the portfolio for the run.
#[derive(Debug)]
pub struct PortfolioAccountant {
    portfolio: Portfolio,
    initial_cash: f64,
    commission_paid: f64,
}

impl PortfolioAccountant {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            portfolio: Portfolio::new(initial_cash),
            initial_cash,
            commission_paid: 0.0,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    pub fn equity(&self) -> f64 {
        self.portfolio.equity
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    /// Apply a fill to cash and the position for its symbol.
    ///
    /// Extending a position re-weights the entry basis. Reducing realizes
    /// P&L on the closed portion. A fill crossing through zero realizes the
    /// whole old position and opens a fresh basis at the fill price for the
    /// remainder.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), AccountingError> {
        let equity_before = self.portfolio.equity;
        let value_before = self.portfolio.positions_value();

        let pos = self
            .portfolio
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone(), fill.timestamp));

        let delta = fill.side.sign() * fill.quantity;

        if pos.quantity == 0.0 || pos.quantity.signum() == delta.signum() {
            // Opening or extending: weight the basis by absolute size.
            let old_abs = pos.quantity.abs();
            let new_abs = old_abs + fill.quantity;
            pos.avg_entry_price =
                (pos.avg_entry_price * old_abs + fill.price * fill.quantity) / new_abs;
            if pos.quantity == 0.0 {
                pos.opened_at = fill.timestamp;
            }
            pos.quantity += delta;
        } else {
            // Reducing, closing, or crossing through zero.
            let closing = fill.quantity.min(pos.quantity.abs());
            let direction = pos.quantity.signum();
            pos.realized_pnl += (fill.price - pos.avg_entry_price) * closing * direction;

            let remainder = fill.quantity - closing;
            pos.quantity += delta;

            if remainder > 0.0 {
                // Crossed: the surviving quantity is a new trade at the
                // fill price.
                pos.avg_entry_price = fill.price;
                pos.opened_at = fill.timestamp;
            } else if pos.quantity == 0.0 {
                pos.avg_entry_price = 0.0;
            }
        }

        pos.total_commission += fill.commission;
        pos.update_mark(fill.price, fill.timestamp);

        if fill.side.is_buy() {
            self.portfolio.cash -= fill.total_cost();
        } else {
            self.portfolio.cash += fill.notional() - fill.commission;
        }
        self.commission_paid += fill.commission;

        self.refresh_equity(fill.timestamp);

        // Double-entry identity: the equity change must equal the cash
        // change plus the market-value change, within tolerance.
        let cash_flow = if fill.side.is_buy() {
            -fill.total_cost()
        } else {
            fill.notional() - fill.commission
        };
        let value_change = self.portfolio.positions_value() - value_before;
        let equity_change = self.portfolio.equity - equity_before;
        let drift = (equity_change - (cash_flow + value_change)).abs();
        let scale = self.portfolio.equity.abs().max(1.0);
        if drift > IDENTITY_TOLERANCE * scale {
            return Err(self.invariant_violation(format!(
                "double-entry drift {drift:.9} after fill {} (Δequity={equity_change:.9}, \
                 Δcash={cash_flow:.9}, Δvalue={value_change:.9})",
                fill.id
            )));
        }

        Ok(())
    }

    /// Mark the bar's symbol to the bar close and recompute equity.
    /// Idempotent: re-marking with the same bar changes nothing.
    pub fn mark_to_market(&mut self, bar: &Bar) -> Result<(), AccountingError> {
        if let Some(pos) = self.portfolio.positions.get_mut(&bar.symbol) {
            pos.update_mark(bar.close, bar.timestamp);
        }
        self.refresh_equity(bar.timestamp);
        self.check_identity()
    }

    fn refresh_equity(&mut self, timestamp: TimestampNs) {
        self.portfolio.equity = self.portfolio.cash + self.portfolio.positions_value();
        self.portfolio.last_updated = timestamp;
    }

    /// Verify `equity == cash + Σ qty·current_price` against a fresh
    /// recomputation.
    pub fn check_identity(&self) -> Result<(), AccountingError> {
        let recomputed = self.portfolio.cash + self.portfolio.positions_value();
        let drift = (self.portfolio.equity - recomputed).abs();
        let scale = self.portfolio.equity.abs().max(1.0);
        if drift > IDENTITY_TOLERANCE * scale {
            return Err(self.invariant_violation(format!(
                "equity {:.9} diverged from cash + positions {recomputed:.9}",
                self.portfolio.equity
            )));
        }
        Ok(())
    }

    /// Sum of realized P&L across all positions.
    pub fn realized_pnl(&self) -> f64 {
        self.portfolio.positions.values().map(|p| p.realized_pnl).sum()
    }

    /// Sum of unrealized P&L across open positions.
    pub fn unrealized_pnl(&self) -> f64 {
        self.portfolio.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    fn invariant_violation(&self, details: String) -> AccountingError {
        warn!(%details, "halting: portfolio invariant violated");
        let diagnostic = json!({
            "cash": self.portfolio.cash,
            "equity": self.portfolio.equity,
            "positions": self.portfolio.positions,
            "commission_paid": self.commission_paid,
            "initial_cash": self.initial_cash,
        });
        AccountingError::InvariantViolated {
            details,
            diagnostic: serde_json::to_string_pretty(&diagnostic)
                .unwrap_or_else(|_| "<unserializable portfolio>".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::{EPSILON as PNL_EPSILON, NANOS_PER_SEC};
    use crate::domain::{FillId, OrderId, OrderSide};

    fn fill(id: u64, side: OrderSide, qty: f64, price: f64, commission: f64) -> Fill {
        Fill {
            id: FillId(id),
            order_id: OrderId(id),
            symbol: "SPY".into(),
            side,
            quantity: qty,
            price,
            commission,
            slippage: 0.0,
            timestamp: id as i64,
        }
    }

    fn bar(ts: i64, close: f64) -> Bar {
        Bar {
            symbol: "SPY".into(),
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
            period: 60 * NANOS_PER_SEC,
        }
    }

    #[test]
    fn buy_then_sell_realizes_pnl() {
        let mut acct = PortfolioAccountant::new(10_000.0);
        acct.apply_fill(&fill(1, OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();
        assert_eq!(acct.cash(), 9_000.0);

        acct.apply_fill(&fill(2, OrderSide::Sell, 10.0, 110.0, 0.0)).unwrap();
        assert_eq!(acct.cash(), 10_100.0);
        assert!((acct.realized_pnl() - 100.0).abs() < PNL_EPSILON);

        let pos = acct.portfolio().position("SPY").unwrap();
        assert!(pos.is_flat());
        assert_eq!(pos.avg_entry_price, 0.0);
        assert_eq!(pos.unrealized_pnl, 0.0);
    }

    #[test]
    fn buys_average_the_basis() {
        let mut acct = PortfolioAccountant::new(100_000.0);
        acct.apply_fill(&fill(1, OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();
        acct.apply_fill(&fill(2, OrderSide::Buy, 10.0, 110.0, 0.0)).unwrap();

        let pos = acct.portfolio().position("SPY").unwrap();
        assert_eq!(pos.quantity, 20.0);
        assert!((pos.avg_entry_price - 105.0).abs() < PNL_EPSILON);
    }

    #[test]
    fn partial_close_keeps_basis() {
        let mut acct = PortfolioAccountant::new(100_000.0);
        acct.apply_fill(&fill(1, OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();
        acct.apply_fill(&fill(2, OrderSide::Sell, 4.0, 120.0, 0.0)).unwrap();

        let pos = acct.portfolio().position("SPY").unwrap();
        assert_eq!(pos.quantity, 6.0);
        assert_eq!(pos.avg_entry_price, 100.0);
        assert!((pos.realized_pnl - 80.0).abs() < PNL_EPSILON);
    }

    #[test]
    fn short_then_cover_realizes_inverted_pnl() {
        let mut acct = PortfolioAccountant::new(10_000.0);
        acct.apply_fill(&fill(1, OrderSide::Short, 10.0, 100.0, 0.0)).unwrap();
        assert_eq!(acct.cash(), 11_000.0);
        let pos = acct.portfolio().position("SPY").unwrap();
        assert_eq!(pos.quantity, -10.0);

        acct.apply_fill(&fill(2, OrderSide::Cover, 10.0, 90.0, 0.0)).unwrap();
        assert_eq!(acct.cash(), 10_100.0);
        assert!((acct.realized_pnl() - 100.0).abs() < PNL_EPSILON);
    }

    #[test]
    fn crossing_through_zero_opens_fresh_basis() {
        let mut acct = PortfolioAccountant::new(100_000.0);
        acct.apply_fill(&fill(1, OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();
        // Sell 15 at 110: closes the 10-lot (+100) and opens a 5-lot short
        // with basis 110.
        acct.apply_fill(&fill(2, OrderSide::Sell, 15.0, 110.0, 0.0)).unwrap();

        let pos = acct.portfolio().position("SPY").unwrap();
        assert_eq!(pos.quantity, -5.0);
        assert_eq!(pos.avg_entry_price, 110.0);
        assert!((pos.realized_pnl - 100.0).abs() < PNL_EPSILON);
        assert_eq!(pos.opened_at, 2);
    }

    #[test]
    fn commission_reduces_cash_both_ways() {
        let mut acct = PortfolioAccountant::new(10_000.0);
        acct.apply_fill(&fill(1, OrderSide::Buy, 10.0, 100.0, 10.0)).unwrap();
        assert_eq!(acct.cash(), 10_000.0 - 1_000.0 - 10.0);
        acct.apply_fill(&fill(2, OrderSide::Sell, 10.0, 100.0, 10.0)).unwrap();
        assert_eq!(acct.cash(), 10_000.0 - 20.0);
        assert_eq!(acct.commission_paid(), 20.0);
    }

    #[test]
    fn mark_to_market_is_idempotent() {
        let mut acct = PortfolioAccountant::new(10_000.0);
        acct.apply_fill(&fill(1, OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();

        let b = bar(5, 120.0);
        acct.mark_to_market(&b).unwrap();
        let first_equity = acct.equity();
        let first_pos = acct.portfolio().position("SPY").unwrap().clone();

        acct.mark_to_market(&b).unwrap();
        assert_eq!(acct.equity(), first_equity);
        assert_eq!(acct.portfolio().position("SPY").unwrap(), &first_pos);
    }

    #[test]
    fn equity_identity_holds_after_mtm() {
        let mut acct = PortfolioAccountant::new(10_000.0);
        acct.apply_fill(&fill(1, OrderSide::Buy, 10.0, 100.0, 5.0)).unwrap();
        acct.mark_to_market(&bar(5, 117.0)).unwrap();

        let p = acct.portfolio();
        assert!((p.equity - (p.cash + p.positions_value())).abs() < 1e-6 * p.equity.abs());
        assert!((p.equity - (9_995.0 - 1_000.0 + 1_170.0)).abs() < 1e-6);
    }

    #[test]
    fn mtm_only_touches_the_bars_symbol() {
        let mut acct = PortfolioAccountant::new(100_000.0);
        acct.apply_fill(&fill(1, OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();
        let mut other = fill(2, OrderSide::Buy, 5.0, 50.0, 0.0);
        other.symbol = "QQQ".into();
        acct.apply_fill(&other).unwrap();

        acct.mark_to_market(&bar(9, 200.0)).unwrap();
        assert_eq!(acct.portfolio().position("SPY").unwrap().current_price, 200.0);
        assert_eq!(acct.portfolio().position("QQQ").unwrap().current_price, 50.0);
    }
}
