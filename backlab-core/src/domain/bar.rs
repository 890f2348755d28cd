use crate::domain::time::TimestampNs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Single OHLCV bar with nanosecond timestamp and aggregation period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: TimestampNs,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Aggregation period in nanoseconds (e.g. one minute).
    pub period: i64,
}

impl Bar {
    /// Validate bar invariants.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.high < self.low {
            return Err(BarError::InvalidRange { high: self.high, low: self.low });
        }
        if !(self.low..=self.high).contains(&self.open) {
            return Err(BarError::OpenOutOfRange);
        }
        if !(self.low..=self.high).contains(&self.close) {
            return Err(BarError::CloseOutOfRange);
        }
        if self.volume < 0.0 {
            return Err(BarError::NegativeVolume);
        }
        if self.period <= 0 {
            return Err(BarError::NonPositivePeriod);
        }
        Ok(())
    }

    /// Average of high, low, and close.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Bar range (high - low).
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check if bar is bullish (close > open).
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

#[derive(Debug, Error)]
pub enum BarError {
    #[error("invalid bar range: high={high}, low={low}")]
    InvalidRange { high: f64, low: f64 },

    #[error("open price outside high/low range")]
    OpenOutOfRange,

    #[error("close price outside high/low range")]
    CloseOutOfRange,

    #[error("negative volume not allowed")]
    NegativeVolume,

    #[error("bar period must be positive")]
    NonPositivePeriod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::NANOS_PER_SEC;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "SPY".into(),
            timestamp: 0,
            open,
            high,
            low,
            close,
            volume: 1000.0,
            period: 60 * NANOS_PER_SEC,
        }
    }

    #[test]
    fn validate_accepts_valid_bar() {
        assert!(bar(100.0, 105.0, 95.0, 102.0).validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        assert!(matches!(
            bar(100.0, 99.0, 101.0, 100.0).validate(),
            Err(BarError::InvalidRange { .. })
        ));
    }

    #[test]
    fn validate_rejects_close_outside_range() {
        assert!(matches!(
            bar(100.0, 105.0, 95.0, 106.0).validate(),
            Err(BarError::CloseOutOfRange)
        ));
    }

    #[test]
    fn validate_rejects_negative_volume() {
        let mut b = bar(100.0, 105.0, 95.0, 102.0);
        b.volume = -1.0;
        assert!(matches!(b.validate(), Err(BarError::NegativeVolume)));
    }

    #[test]
    fn validate_rejects_zero_period() {
        let mut b = bar(100.0, 105.0, 95.0, 102.0);
        b.period = 0;
        assert!(matches!(b.validate(), Err(BarError::NonPositivePeriod)));
    }

    #[test]
    fn typical_price_is_hlc_mean() {
        let b = bar(100.0, 105.0, 95.0, 100.0);
        assert!((b.typical_price() - 100.0).abs() < 1e-12);
    }
}
