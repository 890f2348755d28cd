//! Simulation time — nanoseconds since the Unix epoch.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Nanoseconds since the Unix epoch. All events and samples carry one.
pub type TimestampNs = i64;

pub const NANOS_PER_SEC: i64 = 1_000_000_000;
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Tolerance for floating-point money comparisons.
pub const EPSILON: f64 = 1e-9;

/// Convert a nanosecond timestamp to a UTC datetime.
pub fn to_datetime(ts: TimestampNs) -> DateTime<Utc> {
    Utc.timestamp_nanos(ts)
}

/// The UTC calendar date containing `ts`. Used for DAY order expiry.
pub fn trading_day(ts: TimestampNs) -> NaiveDate {
    to_datetime(ts).date_naive()
}
