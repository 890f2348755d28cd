//! Performance metrics — pure functions over the equity curve, fill log,
//! and trade list.
//!
//! Every metric is a pure function: inputs in, scalar out. Degenerate
//! inputs (empty curves, zero variance, no losing trades) report 0 rather
//! than NaN or infinity.

use crate::trades::TradeRecord;
use backlab_core::domain::time::TRADING_DAYS_PER_YEAR;
use backlab_core::domain::Fill;
use serde::{Deserialize, Serialize};

/// Aggregate performance record for a single run. All numeric; carries no
/// references to engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Total return in percent of initial capital.
    pub total_return_pct: f64,
    /// `(1 + r)^(252/N) - 1`, N = number of equity samples.
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Largest peak-to-trough decline, in percent.
    pub max_drawdown_pct: f64,
    /// Longest run of consecutive samples below the rolling peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// `winners / (winners + losers)`; break-even trades excluded.
    pub win_rate: f64,
    /// Average winning trade net P&L (positive).
    pub avg_win: f64,
    /// Average losing trade net P&L magnitude (positive).
    pub avg_loss: f64,
    /// Gross wins over gross losses; 0 when there are no losses.
    pub profit_factor: f64,
    /// `win_rate * avg_win - (1 - win_rate) * avg_loss`.
    pub expectancy: f64,
    pub total_commission: f64,
    pub total_slippage: f64,
    pub initial_equity: f64,
    pub final_equity: f64,
}

impl PerformanceMetrics {
    /// Reduce a completed run to its metrics record.
    pub fn compute(
        equity_curve: &[f64],
        trades: &[TradeRecord],
        fills: &[Fill],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve.last().copied().unwrap_or(initial_capital);
        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let returns = period_returns(equity_curve);

        let winners: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_winner()).collect();
        let losers: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_loser()).collect();
        let decided = winners.len() + losers.len();

        let win_rate = if decided > 0 { winners.len() as f64 / decided as f64 } else { 0.0 };
        let gross_wins: f64 = winners.iter().map(|t| t.net_pnl).sum();
        let gross_losses: f64 = losers.iter().map(|t| t.net_pnl.abs()).sum();

        let avg_win = if winners.is_empty() { 0.0 } else { gross_wins / winners.len() as f64 };
        let avg_loss = if losers.is_empty() { 0.0 } else { gross_losses / losers.len() as f64 };

        Self {
            total_return_pct: total_return * 100.0,
            annualized_return: annualized_return(total_return, equity_curve.len()),
            sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
            sortino_ratio: sortino_ratio(&returns, risk_free_rate),
            max_drawdown_pct: max_drawdown_pct(equity_curve),
            max_drawdown_duration: max_drawdown_duration(equity_curve),
            total_trades: trades.len(),
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            win_rate,
            avg_win,
            avg_loss,
            profit_factor: if gross_losses > 0.0 { gross_wins / gross_losses } else { 0.0 },
            expectancy: win_rate * avg_win - (1.0 - win_rate) * avg_loss,
            total_commission: fills.iter().map(|f| f.commission).sum(),
            total_slippage: fills.iter().map(|f| f.slippage * f.quantity).sum(),
            initial_equity: initial_capital,
            final_equity,
        }
    }
}

// ── Individual metric functions ──────────────────────────────────────

/// Per-sample simple returns: `equity[i] / equity[i-1] - 1`.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Annualized Sharpe ratio against a daily risk-free rate.
///
/// `(mean(returns) - rf/252) / std * sqrt(252)`; 0 when the standard
/// deviation is below 1e-9.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mean = mean(returns);
    let std = population_std(returns);
    if std < 1e-9 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    (mean - daily_rf) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Sortino ratio: like Sharpe but with downside deviation (negative
/// returns only, measured from zero).
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_dev = (downside_sq / returns.len() as f64).sqrt();
    if downside_dev < 1e-9 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    (mean(returns) - daily_rf) / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum drawdown as a positive percentage of the rolling peak.
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
        }
    }
    max_dd * 100.0
}

/// Longest run of consecutive samples strictly below the rolling peak.
pub fn max_drawdown_duration(equity_curve: &[f64]) -> usize {
    let mut peak = f64::MIN;
    let mut current = 0usize;
    let mut longest = 0usize;
    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
            current = 0;
        } else if equity < peak {
            current += 1;
            longest = longest.max(current);
        }
    }
    longest
}

/// `(1 + total_return)^(252/N) - 1` for N equity samples.
pub fn annualized_return(total_return: f64, num_samples: usize) -> f64 {
    if num_samples == 0 || total_return <= -1.0 {
        return 0.0;
    }
    (1.0 + total_return).powf(TRADING_DAYS_PER_YEAR / num_samples as f64) - 1.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divide by N, matching the returns
/// series being the whole population of the run).
fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}
