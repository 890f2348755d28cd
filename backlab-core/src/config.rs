//! Engine and feed configuration.

use crate::domain::time::TimestampNs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backtest knobs. All rates are fractions; slippage is in basis points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting cash and equity.
    pub initial_cash: f64,
    /// Fraction of notional charged per fill.
    pub commission_rate: f64,
    /// Adverse price shift in basis points on market fills.
    pub slippage_bps: f64,
    /// Inclusive simulation window; 0/0 means the full stream.
    pub start_time: TimestampNs,
    pub end_time: TimestampNs,
    /// Fraction of a bar's volume a single order may consume. Orders above
    /// the cap fill partially and retry on later bars.
    pub fill_volume_limit: f64,
    /// When false, sells that would take a position below zero are rejected.
    pub allow_short: bool,
    /// Annual risk-free rate used by the performance analyzer.
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            commission_rate: 0.001,
            slippage_bps: 5.0,
            start_time: 0,
            end_time: 0,
            fill_volume_limit: 1.0,
            allow_short: false,
            risk_free_rate: 0.02,
        }
    }
}

impl BacktestConfig {
    /// Zero-friction variant used heavily in tests.
    pub fn frictionless(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            commission_rate: 0.0,
            slippage_bps: 0.0,
            ..Self::default()
        }
    }
}

/// Historical feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Directory holding one `<SYMBOL>.csv` per symbol.
    pub data_directory: PathBuf,
    /// Inclusive replay window; 0/0 means the full stream.
    pub start_time: TimestampNs,
    pub end_time: TimestampNs,
    /// 0 = unpaced (as fast as possible); N = replay at N× simulated speed
    /// against the wall clock.
    pub replay_speed: f64,
    /// Re-seek to `start_time` when all streams are exhausted.
    pub loop_replay: bool,
    /// Advisory read-buffer size.
    pub cache_size_mb: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("data"),
            start_time: 0,
            end_time: 0,
            replay_speed: 0.0,
            loop_replay: false,
            cache_size_mb: 256,
        }
    }
}

impl FeedConfig {
    /// Whether `ts` falls inside the configured window.
    pub fn in_window(&self, ts: TimestampNs) -> bool {
        if self.start_time == 0 && self.end_time == 0 {
            return true;
        }
        let after_start = self.start_time == 0 || ts >= self.start_time;
        let before_end = self.end_time == 0 || ts <= self.end_time;
        after_start && before_end
    }
}
