//! Backtest result record.

use crate::metrics::PerformanceMetrics;
use crate::trades::TradeRecord;
use backlab_core::engine::EquityPoint;
use serde::{Deserialize, Serialize};

/// Complete, self-contained result of a run: equity curve, trade log, and
/// the metrics record. Serializable; holds no engine references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub symbols: Vec<String>,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    pub metrics: PerformanceMetrics,
    pub metadata: ResultMetadata,
}

/// Bookkeeping about the run itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Wall-clock time the run finished.
    pub completed_at: chrono::DateTime<chrono::Utc>,
    /// How long the run took, in seconds.
    pub duration_secs: f64,
    /// Feed records dropped as malformed.
    pub skipped_records: u64,
    /// Orders created over the run.
    pub total_orders: usize,
    /// Fills produced over the run.
    pub total_fills: usize,
}

impl BacktestResult {
    /// Render the headline numbers as a compact text block.
    pub fn summary(&self) -> String {
        let m = &self.metrics;
        format!(
            "strategy:          {}\n\
             symbols:           {}\n\
             final equity:      {:.2}\n\
             total return:      {:.2}%\n\
             annualized return: {:.2}%\n\
             sharpe:            {:.3}\n\
             sortino:           {:.3}\n\
             max drawdown:      {:.2}%\n\
             trades:            {} ({} W / {} L, win rate {:.1}%)\n\
             profit factor:     {:.2}\n\
             expectancy:        {:.2}\n\
             commission paid:   {:.2}",
            self.strategy,
            self.symbols.join(","),
            m.final_equity,
            m.total_return_pct,
            m.annualized_return * 100.0,
            m.sharpe_ratio,
            m.sortino_ratio,
            m.max_drawdown_pct,
            m.total_trades,
            m.winning_trades,
            m.losing_trades,
            m.win_rate * 100.0,
            m.profit_factor,
            m.expectancy,
            m.total_commission,
        )
    }
}
