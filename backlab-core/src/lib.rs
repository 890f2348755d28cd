//! BackLab core engine
//!
//! Provides domain types, the multi-symbol replay scheduler, execution
//! simulation, portfolio accounting, and the backtest driver.

pub mod config;
pub mod domain;
pub mod engine;
pub mod feed;
pub mod strategy;
