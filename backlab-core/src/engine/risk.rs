//! Pre-submit risk hook.
//!
//! The context performs no account-level checks itself; a `RiskManager`
//! registered on the driver may veto each order before it enters the
//! pending queue.

use crate::domain::{Order, Portfolio};

/// Veto hook evaluated at submit time. Returning `Err` rejects the order
/// with the given reason.
pub trait RiskManager: Send {
    fn validate_order(&self, order: &Order, portfolio: &Portfolio) -> Result<(), String>;
}

/// Basic notional and cash limits.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Maximum notional for a single order (limit price × quantity).
    pub max_order_notional: f64,
    /// Reject buys whose limit notional exceeds available cash.
    pub require_cash: bool,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self { max_order_notional: 10_000.0, require_cash: true }
    }
}

impl RiskLimits {
    /// Quantity to trade so a stop-out loses `risk_per_trade` of the
    /// account. Returns 0 when entry and stop coincide.
    pub fn position_size(
        account_value: f64,
        risk_per_trade: f64,
        entry_price: f64,
        stop_price: f64,
    ) -> f64 {
        let risk_per_share = (entry_price - stop_price).abs();
        if risk_per_share < 1e-9 {
            return 0.0;
        }
        account_value * risk_per_trade / risk_per_share
    }
}

impl RiskManager for RiskLimits {
    fn validate_order(&self, order: &Order, portfolio: &Portfolio) -> Result<(), String> {
        // Market orders carry no price; the notional check applies to
        // priced orders only, matching the cash check at execution time.
        let reference_price = order.order_type.limit_price().unwrap_or(0.0);
        let notional = order.quantity * reference_price;

        if notional > self.max_order_notional {
            return Err(format!(
                "order notional {notional:.2} exceeds limit {:.2}",
                self.max_order_notional
            ));
        }

        if self.require_cash && order.side.is_buy() && notional > portfolio.cash {
            return Err(format!(
                "order notional {notional:.2} exceeds available cash {:.2}",
                portfolio.cash
            ));
        }

        Ok(())
    }
}
