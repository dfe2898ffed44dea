//! Time-series store boundary.
//!
//! The pipeline talks to storage only through [`TimeSeriesStore`]. Two
//! implementations ship with the crate:
//! - [`InfluxStore`]: InfluxDB 1.x via the `influxdb` client
//! - [`MemoryStore`]: in-process, for tests and dry runs
//!
//! Schema: measurement `snmp_metrics`, tag `oid` = metric name, field
//! `value` = float, millisecond timestamps.

pub mod influx;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use influx::InfluxStore;
pub use memory::MemoryStore;

/// Measurement every point is written to.
pub const MEASUREMENT: &str = "snmp_metrics";
/// Tag carrying the metric name.
pub const METRIC_TAG: &str = "oid";
/// Field carrying the numeric value.
pub const VALUE_FIELD: &str = "value";

/// One validated sample ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistablePoint {
    pub metric: String,
    pub value: f64,
    pub unix_ms: u64,
}

/// One sample read back from a metric's series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSample {
    pub unix_ms: u64,
    pub value: f64,
}

/// Inclusive time range in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl HistoryWindow {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    /// The `hours` preceding `now_ms`.
    pub fn last_hours(hours: u32, now_ms: u64) -> Self {
        let span = u64::from(hours) * 3_600_000;
        Self {
            start_ms: now_ms.saturating_sub(span),
            end_ms: now_ms,
        }
    }

    pub fn contains(&self, unix_ms: u64) -> bool {
        (self.start_ms..=self.end_ms).contains(&unix_ms)
    }
}

/// Trait every time-series backend implements.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Create a database if it does not exist.
    async fn create_database(&self, name: &str) -> Result<()>;

    /// Point subsequent reads and writes at another database.
    fn switch_database(&self, name: &str);

    /// Database currently in use.
    fn database(&self) -> String;

    /// Write a batch atomically from the caller's point of view.
    async fn write_points(&self, batch: &[PersistablePoint]) -> Result<()>;

    /// Samples of one metric inside `window`, ascending by time.
    async fn query_range(&self, metric: &str, window: HistoryWindow) -> Result<Vec<SeriesSample>>;
}
