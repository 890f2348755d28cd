//! The simulation kernel: order log, strategy context, execution
//! simulation, portfolio accounting, and the backtest driver.

pub mod accounting;
pub mod context;
pub mod driver;
pub mod execution;
pub mod orders;
pub mod risk;

pub use accounting::{AccountingError, PortfolioAccountant};
pub use context::{Context, ContextError};
pub use driver::{Backtest, EngineError, EquityPoint};
pub use execution::ExecutionSimulator;
pub use orders::OrderLog;
pub use risk::{RiskLimits, RiskManager};
