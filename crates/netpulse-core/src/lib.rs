//! # netpulse-core
//!
//! **Metric acquisition and time-series aggregation for SNMP-managed devices.**
//!
//! `netpulse-core` polls a device's SNMP agent for a fixed catalog of health
//! metrics, decides field by field what is safe to persist, writes it to
//! InfluxDB, and rebuilds timestamp-aligned history from the per-metric
//! series.
//!
//! ## Quick Start
//!
//! ```no_run
//! use netpulse_core::{MonitorConfig, MonitorService};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> netpulse_core::Result<()> {
//! let service = MonitorService::from_config(MonitorConfig::from_env()?);
//! service.prepare_store().await?;
//!
//! let cancel = CancellationToken::new();
//! let scheduler = service.scheduler().spawn(cancel.clone());
//!
//! let snapshot = service.current_snapshot().await;
//! println!("{} fields, {} failed", snapshot.len(), snapshot.failed_count());
//!
//! for point in service.history(24).await.iter() {
//!     println!("{} {:?}", point.unix_ms, point.get("cpuUsage"));
//! }
//!
//! cancel.cancel();
//! let _ = scheduler.await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Scheduler → SnapshotCollector → classify → TimeSeriesWriter → store
//!
//! Every device transport implements [`MetricSource`]; every backend
//! implements [`TimeSeriesStore`]. Failures are values ([`RawResult::Failed`],
//! [`WriteOutcome::Failed`]), never panics, and the scheduler contains any
//! panic at the tick boundary.

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod error;
pub mod history;
pub mod scheduler;
pub mod service;
pub mod snapshot;
pub mod snmp;
pub mod source;
pub mod store;
pub mod validate;
pub mod writer;

pub use catalog::{HISTORY_METRICS, MetricCatalog, MetricDef, PROBE_METRIC};
pub use config::{
    AuthProtocol, MonitorConfig, PrivProtocol, ScheduleSettings, SnmpSettings, SnmpVersion,
    StoreSettings,
};
pub use discovery::{DeviceRecord, DeviceRegistry};
pub use error::{FailureKind, MonitorError, Result};
pub use history::{History, HistoryPoint, HistoryReader};
pub use scheduler::{Scheduler, SchedulerStats, StatsReport, TickOutcome};
pub use service::MonitorService;
pub use snapshot::{FieldValue, Snapshot, SnapshotCollector, unix_ms_now};
pub use snmp::SnmpSource;
pub use source::{MetricSource, RawResult};
pub use store::{
    HistoryWindow, InfluxStore, MemoryStore, PersistablePoint, SeriesSample, TimeSeriesStore,
};
pub use validate::{Classification, classify, parse_metric_value};
pub use writer::{TimeSeriesWriter, WriteOutcome};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
