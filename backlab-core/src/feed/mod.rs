//! Historical market data: sources, the in-memory store, and the
//! multi-symbol replay scheduler.

pub mod csv;
pub mod paced;
pub mod replay;
pub mod source;
pub mod store;

pub use csv::CsvDataSource;
pub use paced::{spawn_paced_feed, PacedFeed};
pub use replay::ReplayScheduler;
pub use source::{DataSource, EventStream, FeedError};
pub use store::MemoryTimeSeriesStore;
