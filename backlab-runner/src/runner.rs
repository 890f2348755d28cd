//! Single backtest execution orchestration.

use anyhow::{Context as _, Result};
use tracing::info;

use backlab_core::engine::Backtest;
use backlab_core::feed::{CsvDataSource, ReplayScheduler};

use crate::config::RunConfig;
use crate::metrics::PerformanceMetrics;
use crate::result::{BacktestResult, ResultMetadata};
use crate::trades::extract_trades;

/// Wires feed → engine → metrics for one run.
///
/// 1. Open the CSV data source and subscribe the configured symbols
/// 2. Build the engine and the configured strategy
/// 3. Pump the replay scheduler through the driver
/// 4. Extract round-trip trades and compute the metrics record
pub struct Runner;

impl Runner {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, config: &RunConfig) -> Result<BacktestResult> {
        let started = std::time::Instant::now();

        let source = CsvDataSource::new(config.to_feed_config());
        let mut scheduler = ReplayScheduler::new(Box::new(source), config.to_feed_config());

        let symbols = if config.data.symbols.is_empty() {
            scheduler
                .subscribe_all()
                .with_context(|| format!("no data under {}", config.data.directory.display()))?
        } else {
            for symbol in &config.data.symbols {
                scheduler
                    .subscribe(symbol)
                    .with_context(|| format!("subscribing '{symbol}'"))?;
            }
            config.data.symbols.clone()
        };
        anyhow::ensure!(!symbols.is_empty(), "data directory contains no symbols");

        let strategy = config.build_strategy()?;
        let strategy_name = strategy.name().to_string();

        let engine_config = config.to_backtest_config();
        let initial_cash = engine_config.initial_cash;
        let risk_free_rate = engine_config.risk_free_rate;

        let mut backtest = Backtest::new(engine_config);
        backtest.add_strategy(strategy);

        info!(strategy = %strategy_name, ?symbols, "starting backtest");
        backtest.run(&mut scheduler).context("backtest run failed")?;

        let trades = extract_trades(backtest.fills());
        let equity: Vec<f64> = backtest.equity_curve().iter().map(|p| p.equity).collect();
        let metrics =
            PerformanceMetrics::compute(&equity, &trades, backtest.fills(), initial_cash, risk_free_rate);

        info!(
            final_equity = metrics.final_equity,
            total_return_pct = metrics.total_return_pct,
            trades = trades.len(),
            skipped = scheduler.skipped_records(),
            "backtest complete"
        );

        Ok(BacktestResult {
            strategy: strategy_name,
            symbols,
            equity_curve: backtest.equity_curve().to_vec(),
            trades,
            metrics,
            metadata: ResultMetadata {
                completed_at: chrono::Utc::now(),
                duration_secs: started.elapsed().as_secs_f64(),
                skipped_records: scheduler.skipped_records(),
                total_orders: backtest.orders().len(),
                total_fills: backtest.fills().len(),
            },
        })
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}
