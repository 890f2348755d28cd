//! CSV-backed data source.
//!
//! One `<SYMBOL>.csv` file per symbol under the configured directory, with
//! a header row and lines of `timestamp_ns,symbol,open,high,low,close,volume`.
//! Rows that fail to parse or violate bar invariants are skipped and
//! counted, never raised.

use crate::config::FeedConfig;
use crate::domain::time::NANOS_PER_SEC;
use crate::domain::{Bar, MarketEvent};
use crate::feed::source::{DataSource, EventStream, FeedError};
use csv::StringRecord;
use std::fs::File;
use std::path::PathBuf;
use tracing::debug;

/// Default aggregation period assumed for file-backed bars: one minute.
const DEFAULT_PERIOD_NS: i64 = 60 * NANOS_PER_SEC;

/// Directory of per-symbol CSV files.
pub struct CsvDataSource {
    config: FeedConfig,
}

impl CsvDataSource {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.config.data_directory.join(format!("{symbol}.csv"))
    }
}

impl DataSource for CsvDataSource {
    fn symbols(&self) -> Result<Vec<String>, FeedError> {
        let mut symbols = Vec::new();
        for entry in std::fs::read_dir(&self.config.data_directory)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    symbols.push(stem.to_string());
                }
            }
        }
        // Directory iteration order is platform-defined; keep enumeration stable.
        symbols.sort();
        Ok(symbols)
    }

    fn open(&self, symbol: &str) -> Result<Box<dyn EventStream>, FeedError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(FeedError::SourceNotFound { symbol: symbol.to_string() });
        }

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| match e.into_kind() {
                csv::ErrorKind::Io(io) => FeedError::Io(io),
                _ => FeedError::SourceNotFound { symbol: symbol.to_string() },
            })?;

        debug!(symbol, path = %path.display(), "opened csv bar stream");

        Ok(Box::new(CsvBarStream {
            symbol: symbol.to_string(),
            records: reader.into_records(),
            config: self.config.clone(),
            skipped: 0,
        }))
    }
}

/// Lazy per-symbol stream over one CSV file.
struct CsvBarStream {
    symbol: String,
    records: csv::StringRecordsIntoIter<File>,
    config: FeedConfig,
    skipped: u64,
}

impl CsvBarStream {
    fn parse_record(&self, record: &StringRecord) -> Option<Bar> {
        if record.len() < 7 {
            return None;
        }
        let bar = Bar {
            symbol: self.symbol.clone(),
            timestamp: record.get(0)?.trim().parse().ok()?,
            open: record.get(2)?.trim().parse().ok()?,
            high: record.get(3)?.trim().parse().ok()?,
            low: record.get(4)?.trim().parse().ok()?,
            close: record.get(5)?.trim().parse().ok()?,
            volume: record.get(6)?.trim().parse().ok()?,
            period: DEFAULT_PERIOD_NS,
        };
        bar.validate().ok()?;
        Some(bar)
    }
}

impl EventStream for CsvBarStream {
    fn next_event(&mut self) -> Result<Option<MarketEvent>, FeedError> {
        loop {
            let Some(result) = self.records.next() else {
                return Ok(None);
            };
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    if let csv::ErrorKind::Io(io) = e.into_kind() {
                        return Err(FeedError::Io(io));
                    }
                    self.skipped += 1;
                    continue;
                }
            };

            match self.parse_record(&record) {
                Some(bar) if self.config.in_window(bar.timestamp) => {
                    return Ok(Some(MarketEvent::Bar(bar)));
                }
                Some(_) => continue,
                None => {
                    self.skipped += 1;
                    continue;
                }
            }
        }
    }

    fn skipped_records(&self) -> u64 {
        self.skipped
    }
}
