//! Backtest driver — the outer event loop.
//!
//! Per bar: mark-to-market, dispatch `on_bar` to every strategy in
//! registration order, run the execution simulator over pending orders,
//! deliver fills and order updates, sample equity. Single-threaded and
//! cooperative: no strategy ever observes a partially-applied fill.

use crate::config::BacktestConfig;
use crate::domain::{Bar, Fill, IdGen, MarketEvent, Order, OrderId, TimestampNs};
use crate::engine::accounting::{AccountingError, PortfolioAccountant};
use crate::engine::context::Context;
use crate::engine::execution::ExecutionSimulator;
use crate::engine::orders::OrderLog;
use crate::engine::risk::RiskManager;
use crate::feed::replay::ReplayScheduler;
use crate::feed::source::FeedError;
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Accounting(#[from] AccountingError),
}

/// One equity sample, taken after all fills for its bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: TimestampNs,
    pub equity: f64,
}

/// Owns the strategies, the order log, and the accounting state for one
/// run.
pub struct Backtest {
    config: BacktestConfig,
    strategies: Vec<Box<dyn Strategy>>,
    accountant: PortfolioAccountant,
    simulator: ExecutionSimulator,
    orders: OrderLog,
    ids: IdGen,
    risk: Option<Box<dyn RiskManager>>,
    equity_curve: Vec<EquityPoint>,
    fills: Vec<Fill>,
    /// Orders with pending `on_order_update` deliveries.
    updates: Vec<OrderId>,
    stop: Arc<AtomicBool>,
    current_time: TimestampNs,
    initialized: bool,
}

impl Backtest {
    pub fn new(config: BacktestConfig) -> Self {
        let accountant = PortfolioAccountant::new(config.initial_cash);
        let simulator = ExecutionSimulator::new(config.clone());
        let current_time = config.start_time;
        Self {
            config,
            strategies: Vec::new(),
            accountant,
            simulator,
            orders: OrderLog::new(),
            ids: IdGen::new(),
            risk: None,
            equity_curve: Vec::new(),
            fills: Vec::new(),
            updates: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            current_time,
            initialized: false,
        }
    }

    /// Register a strategy. Registration order is dispatch order.
    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) {
        info!(name = strategy.name(), "strategy registered");
        self.strategies.push(strategy);
    }

    /// Install a pre-submit risk hook.
    pub fn set_risk_manager(&mut self, risk: Box<dyn RiskManager>) {
        self.risk = Some(risk);
    }

    /// Flag checked between events; the event in flight completes, then the
    /// run terminates cleanly.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Shareable stop flag, e.g. for a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Pull events from a scheduler until end-of-stream or `stop`.
    pub fn run(&mut self, scheduler: &mut ReplayScheduler) -> Result<(), EngineError> {
        self.ensure_init();
        while !self.stop.load(Ordering::Acquire) {
            match scheduler.next_event()? {
                Some(event) => self.process_event(&event)?,
                None => break,
            }
        }
        self.finish();
        Ok(())
    }

    /// Drain a paced feed whose scheduler runs on a producer thread.
    pub fn run_paced(&mut self, feed: &crate::feed::PacedFeed) -> Result<(), EngineError> {
        self.ensure_init();
        while !self.stop.load(Ordering::Acquire) {
            match feed.recv() {
                Some(event) => self.process_event(&event)?,
                None => break,
            }
        }
        self.finish();
        Ok(())
    }

    /// Run over an in-memory bar slice. Bars are stably sorted by
    /// timestamp, so equal-timestamp bars keep their input order.
    pub fn run_bars(&mut self, bars: &[Bar]) -> Result<(), EngineError> {
        let mut sorted: Vec<&Bar> = bars.iter().collect();
        sorted.sort_by_key(|b| b.timestamp);

        self.ensure_init();
        for bar in sorted {
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            if self.in_window(bar.timestamp) {
                self.process_bar(bar)?;
            }
        }
        self.finish();
        Ok(())
    }

    /// Feed a single event through the per-event procedure.
    pub fn process_event(&mut self, event: &MarketEvent) -> Result<(), EngineError> {
        self.ensure_init();
        if !self.in_window(event.timestamp()) {
            return Ok(());
        }
        match event {
            MarketEvent::Bar(bar) => self.process_bar(bar)?,
            MarketEvent::Tick(tick) => {
                self.current_time = tick.timestamp;
                self.dispatch(tick.timestamp, |strategy, ctx| strategy.on_tick(ctx, tick));
                self.flush_order_updates(tick.timestamp);
            }
        }
        Ok(())
    }

    fn process_bar(&mut self, bar: &Bar) -> Result<(), EngineError> {
        self.current_time = bar.timestamp;

        // 1. Mark the bar's symbol to its close.
        self.accountant.mark_to_market(bar)?;

        // 2. Strategies observe the bar; submissions land in the pending
        //    queue before any execution attempt for this bar.
        self.dispatch(bar.timestamp, |strategy, ctx| strategy.on_bar(ctx, bar));

        // 3. Execution walks pending orders in submission order, applying
        //    each fill to the accountant as it happens.
        let fills = self.simulator.process_bar(
            bar,
            &mut self.orders,
            &mut self.accountant,
            &mut self.ids,
            &mut self.updates,
        )?;

        // 4. The equity sample reflects post-fill state at the bar close.
        self.accountant.mark_to_market(bar)?;

        // 5. Deliver fills, then order updates.
        for fill in &fills {
            self.dispatch(bar.timestamp, |strategy, ctx| strategy.on_fill(ctx, fill));
        }
        self.flush_order_updates(bar.timestamp);

        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.accountant.equity(),
        });
        self.fills.extend(fills);
        Ok(())
    }

    /// End-of-stream: cancel open orders and notify strategies.
    /// Idempotent.
    pub fn finish(&mut self) {
        let cancelled = self.orders.cancel_open(self.current_time);
        if !cancelled.is_empty() {
            debug!(count = cancelled.len(), "cancelled open orders at termination");
            self.updates.extend(cancelled);
        }
        self.flush_order_updates(self.current_time);
    }

    fn ensure_init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        let now = self.config.start_time;
        self.dispatch(now, |strategy, ctx| strategy.on_init(ctx));
        self.flush_order_updates(now);
    }

    fn in_window(&self, ts: TimestampNs) -> bool {
        if self.config.start_time == 0 && self.config.end_time == 0 {
            return true;
        }
        let after_start = self.config.start_time == 0 || ts >= self.config.start_time;
        let before_end = self.config.end_time == 0 || ts <= self.config.end_time;
        after_start && before_end
    }

    /// Run a callback for every strategy in registration order, lending
    /// each a fresh context over the shared engine state.
    fn dispatch<F>(&mut self, now: TimestampNs, mut f: F)
    where
        F: FnMut(&mut dyn Strategy, &mut Context),
    {
        let mut strategies = std::mem::take(&mut self.strategies);
        for strategy in strategies.iter_mut() {
            let mut ctx = Context::new(
                now,
                self.accountant.portfolio(),
                &mut self.orders,
                &mut self.ids,
                self.risk.as_deref(),
                &mut self.updates,
            );
            f(strategy.as_mut(), &mut ctx);
        }
        self.strategies = strategies;
    }

    /// Turn queued status changes into `on_order_update` deliveries, one
    /// per order, using the order's state as of now.
    fn flush_order_updates(&mut self, now: TimestampNs) {
        if self.updates.is_empty() {
            return;
        }
        let mut seen = HashSet::new();
        let ids: Vec<OrderId> = self.updates.drain(..).filter(|id| seen.insert(*id)).collect();
        let snapshots: Vec<Order> =
            ids.iter().filter_map(|id| self.orders.get(*id).cloned()).collect();
        for order in &snapshots {
            self.dispatch(now, |strategy, ctx| strategy.on_order_update(ctx, order));
        }
    }

    // ── Read accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &crate::domain::Portfolio {
        self.accountant.portfolio()
    }

    pub fn equity(&self) -> f64 {
        self.accountant.equity()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn orders(&self) -> &OrderLog {
        &self.orders
    }

    pub fn commission_paid(&self) -> f64 {
        self.accountant.commission_paid()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.accountant.realized_pnl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::NANOS_PER_SEC;
    use crate::domain::Tick;

    fn bar(ts: TimestampNs, close: f64) -> Bar {
        Bar {
            symbol: "X".into(),
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000_000.0,
            period: 60 * NANOS_PER_SEC,
        }
    }

    /// Records the order of callbacks it receives.
    struct Recorder {
        log: Arc<parking_lot::Mutex<Vec<String>>>,
        buy_on_first_bar: bool,
        bought: bool,
    }

    impl Recorder {
        fn new(log: Arc<parking_lot::Mutex<Vec<String>>>, buy_on_first_bar: bool) -> Self {
            Self { log, buy_on_first_bar, bought: false }
        }
    }

    impl Strategy for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_init(&mut self, _ctx: &mut Context) {
            self.log.lock().push("init".into());
        }

        fn on_bar(&mut self, ctx: &mut Context, bar: &Bar) {
            self.log.lock().push(format!("bar@{}", bar.timestamp));
            if self.buy_on_first_bar && !self.bought {
                ctx.buy("X", 10.0, 0.0).unwrap();
                self.bought = true;
            }
        }

        fn on_tick(&mut self, _ctx: &mut Context, tick: &Tick) {
            self.log.lock().push(format!("tick@{}", tick.timestamp));
        }

        fn on_order_update(&mut self, _ctx: &mut Context, order: &Order) {
            self.log.lock().push(format!("update:{:?}", order.status));
        }

        fn on_fill(&mut self, _ctx: &mut Context, fill: &Fill) {
            self.log.lock().push(format!("fill@{}", fill.timestamp));
        }
    }

    #[test]
    fn init_runs_once_before_first_bar() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut backtest = Backtest::new(BacktestConfig::frictionless(10_000.0));
        backtest.add_strategy(Box::new(Recorder::new(Arc::clone(&log), false)));

        backtest.run_bars(&[bar(1, 100.0), bar(2, 100.0)]).unwrap();

        let log = log.lock();
        assert_eq!(log[0], "init");
        assert_eq!(log.iter().filter(|e| *e == "init").count(), 1);
    }

    #[test]
    fn fills_are_delivered_after_on_bar() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut backtest = Backtest::new(BacktestConfig::frictionless(10_000.0));
        backtest.add_strategy(Box::new(Recorder::new(Arc::clone(&log), true)));

        backtest.run_bars(&[bar(1, 100.0)]).unwrap();

        let log = log.lock();
        let bar_idx = log.iter().position(|e| e == "bar@1").unwrap();
        let fill_idx = log.iter().position(|e| e == "fill@1").unwrap();
        assert!(bar_idx < fill_idx, "fill delivered before on_bar returned: {log:?}");
    }

    #[test]
    fn equity_sampled_once_per_bar_post_fill() {
        let mut backtest = Backtest::new(BacktestConfig::frictionless(10_000.0));
        backtest.add_strategy(Box::new(crate::strategy::BuyAndHold::new("X", 10.0)));

        backtest.run_bars(&[bar(1, 100.0), bar(2, 110.0), bar(3, 120.0)]).unwrap();

        let curve = backtest.equity_curve();
        assert_eq!(curve.len(), 3);
        // Bought 10 @ 100 on bar 1: equity stays 10000, then marks up.
        assert!((curve[0].equity - 10_000.0).abs() < 1e-9);
        assert!((curve[1].equity - 10_100.0).abs() < 1e-9);
        assert!((curve[2].equity - 10_200.0).abs() < 1e-9);
    }

    #[test]
    fn termination_cancels_open_orders_and_notifies() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        struct LimitPlacer {
            log: Arc<parking_lot::Mutex<Vec<String>>>,
            placed: bool,
        }
        impl Strategy for LimitPlacer {
            fn name(&self) -> &str {
                "limit_placer"
            }
            fn on_bar(&mut self, ctx: &mut Context, _bar: &Bar) {
                if !self.placed {
                    // Far-away limit that never touches.
                    ctx.buy("X", 10.0, 1.0).unwrap();
                    self.placed = true;
                }
            }
            fn on_order_update(&mut self, _ctx: &mut Context, order: &Order) {
                self.log.lock().push(format!("{:?}", order.status));
            }
        }

        let mut backtest = Backtest::new(BacktestConfig::frictionless(10_000.0));
        backtest.add_strategy(Box::new(LimitPlacer { log: Arc::clone(&log), placed: false }));
        backtest.run_bars(&[bar(1, 100.0), bar(2, 100.0)]).unwrap();

        let statuses: Vec<String> = log.lock().clone();
        assert!(statuses.contains(&"Cancelled".to_string()), "got {statuses:?}");

        let open: Vec<_> = backtest.orders().open_ids();
        assert!(open.is_empty());
    }

    #[test]
    fn stop_flag_halts_between_events() {
        struct Stopper {
            handle: Arc<AtomicBool>,
        }
        impl Strategy for Stopper {
            fn name(&self) -> &str {
                "stopper"
            }
            fn on_bar(&mut self, _ctx: &mut Context, bar: &Bar) {
                if bar.timestamp == 2 {
                    self.handle.store(true, Ordering::Release);
                }
            }
        }

        let mut backtest = Backtest::new(BacktestConfig::frictionless(10_000.0));
        let handle = backtest.stop_handle();
        backtest.add_strategy(Box::new(Stopper { handle }));

        backtest
            .run_bars(&[bar(1, 100.0), bar(2, 100.0), bar(3, 100.0), bar(4, 100.0)])
            .unwrap();

        // Bar 2 completes (stop is checked between events), bars 3-4 don't run.
        assert_eq!(backtest.equity_curve().len(), 2);
    }

    #[test]
    fn window_filters_events() {
        let mut backtest = Backtest::new(BacktestConfig {
            start_time: 2,
            end_time: 3,
            ..BacktestConfig::frictionless(10_000.0)
        });
        backtest.add_strategy(Box::new(crate::strategy::BuyAndHold::new("X", 1.0)));
        backtest
            .run_bars(&[bar(1, 100.0), bar(2, 100.0), bar(3, 100.0), bar(4, 100.0)])
            .unwrap();
        assert_eq!(backtest.equity_curve().len(), 2);
        assert_eq!(backtest.equity_curve()[0].timestamp, 2);
    }

    #[test]
    fn ticks_dispatch_without_execution() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut backtest = Backtest::new(BacktestConfig::frictionless(10_000.0));
        backtest.add_strategy(Box::new(Recorder::new(Arc::clone(&log), false)));

        backtest
            .process_event(&MarketEvent::Tick(Tick {
                symbol: "X".into(),
                timestamp: 5,
                last: 100.0,
                bid: 99.9,
                ask: 100.1,
                bid_size: 1,
                ask_size: 1,
            }))
            .unwrap();

        assert!(log.lock().contains(&"tick@5".to_string()));
        assert!(backtest.equity_curve().is_empty());
    }

    #[test]
    fn risk_manager_rejections_reach_on_order_update() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        struct GreedyBuyer;
        impl Strategy for GreedyBuyer {
            fn name(&self) -> &str {
                "greedy"
            }
            fn on_bar(&mut self, ctx: &mut Context, _bar: &Bar) {
                // Limit far above the notional cap.
                let _ = ctx.buy("X", 1_000.0, 100.0);
            }
        }

        let mut backtest = Backtest::new(BacktestConfig::frictionless(10_000.0));
        backtest.set_risk_manager(Box::new(crate::engine::risk::RiskLimits {
            max_order_notional: 1_000.0,
            require_cash: true,
        }));
        backtest.add_strategy(Box::new(GreedyBuyer));
        backtest.add_strategy(Box::new(Recorder::new(Arc::clone(&log), false)));

        backtest.run_bars(&[bar(1, 100.0)]).unwrap();

        let entries = log.lock();
        assert!(
            entries.iter().any(|e| e == "update:Rejected"),
            "expected a Rejected update, got {entries:?}"
        );
    }
}
