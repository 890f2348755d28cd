//! BackLab runner — orchestrates single backtest runs and reduces them to
//! performance records.

pub mod config;
pub mod metrics;
pub mod result;
pub mod runner;
pub mod sample_data;
pub mod trades;

pub use config::RunConfig;
pub use metrics::PerformanceMetrics;
pub use result::BacktestResult;
pub use runner::Runner;
pub use trades::{extract_trades, TradeRecord, TradeSide};
