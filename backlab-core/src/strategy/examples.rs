//! Reference strategies used by tests, benches, and the demo runner.

use crate::domain::{Bar, Fill};
use crate::engine::context::Context;
use crate::strategy::Strategy;
use std::collections::VecDeque;
use tracing::info;

/// Buys a fixed quantity on the first bar of its symbol and holds.
pub struct BuyAndHold {
    symbol: String,
    quantity: f64,
    entered: bool,
}

impl BuyAndHold {
    pub fn new(symbol: impl Into<String>, quantity: f64) -> Self {
        Self { symbol: symbol.into(), quantity, entered: false }
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn on_bar(&mut self, ctx: &mut Context, bar: &Bar) {
        if self.entered || bar.symbol != self.symbol {
            return;
        }
        if ctx.buy(&self.symbol, self.quantity, 0.0).is_ok() {
            self.entered = true;
        }
    }
}

/// Classic fast/slow moving-average crossover.
///
/// Keeps its own rolling close window; crossing up buys a fixed quantity,
/// crossing down liquidates. Flat between signals on the short side.
pub struct SmaCrossover {
    symbol: String,
    quantity: f64,
    fast_period: usize,
    slow_period: usize,
    closes: VecDeque<f64>,
    holding: f64,
    prev_diff: Option<f64>,
}

impl SmaCrossover {
    pub fn new(symbol: impl Into<String>, quantity: f64, fast_period: usize, slow_period: usize) -> Self {
        assert!(fast_period < slow_period, "fast period must be shorter");
        Self {
            symbol: symbol.into(),
            quantity,
            fast_period,
            slow_period,
            closes: VecDeque::new(),
            holding: 0.0,
            prev_diff: None,
        }
    }

    fn mean_of_last(&self, n: usize) -> f64 {
        self.closes.iter().rev().take(n).sum::<f64>() / n as f64
    }
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &str {
        "sma_crossover"
    }

    fn on_bar(&mut self, ctx: &mut Context, bar: &Bar) {
        if bar.symbol != self.symbol {
            return;
        }

        self.closes.push_back(bar.close);
        if self.closes.len() > self.slow_period {
            self.closes.pop_front();
        }
        if self.closes.len() < self.slow_period {
            return;
        }

        let diff = self.mean_of_last(self.fast_period) - self.mean_of_last(self.slow_period);
        let crossed_up = self.prev_diff.is_some_and(|p| p <= 0.0) && diff > 0.0;
        let crossed_down = self.prev_diff.is_some_and(|p| p >= 0.0) && diff < 0.0;
        self.prev_diff = Some(diff);

        if crossed_up && self.holding == 0.0 {
            let _ = ctx.buy(&self.symbol, self.quantity, 0.0);
        } else if crossed_down && self.holding > 0.0 {
            let _ = ctx.sell(&self.symbol, self.holding, 0.0);
        }
    }

    fn on_fill(&mut self, _ctx: &mut Context, fill: &Fill) {
        if fill.symbol != self.symbol {
            return;
        }
        self.holding += fill.side.sign() * fill.quantity;
        info!(
            symbol = %fill.symbol,
            price = fill.price,
            holding = self.holding,
            "crossover fill"
        );
    }
}
