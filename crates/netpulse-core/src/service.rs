//! Explicitly constructed handle bundling the pipeline's collaborators.
//!
//! Consumers (HTTP handlers, CLI commands) hold an `Arc<MonitorService>`.
//! On-demand snapshots are coalesced: a snapshot is reused until the
//! coalescing window has passed since its collection *finished*, so callers
//! queued behind a slow collection share its result instead of each hitting
//! the device again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::catalog::{HISTORY_METRICS, MetricCatalog, PROBE_METRIC};
use crate::config::MonitorConfig;
use crate::discovery::{DeviceRecord, DeviceRegistry};
use crate::error::{MonitorError, Result};
use crate::history::{History, HistoryReader};
use crate::scheduler::{Scheduler, SchedulerStats};
use crate::snapshot::{Snapshot, SnapshotCollector, unix_ms_now};
use crate::snmp::SnmpSource;
use crate::source::{MetricSource, RawResult};
use crate::store::{HistoryWindow, InfluxStore, TimeSeriesStore};
use crate::writer::TimeSeriesWriter;

/// Default window during which a collected snapshot is reused.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_secs(2);

/// Largest history window served, in hours.
pub const MAX_HISTORY_HOURS: u32 = 720;

/// Shared service handle.
pub struct MonitorService {
    config: MonitorConfig,
    catalog: Arc<MetricCatalog>,
    collector: SnapshotCollector,
    store: Arc<dyn TimeSeriesStore>,
    registry: Arc<DeviceRegistry>,
    stats: Arc<SchedulerStats>,
    history: HistoryReader,
    /// Last snapshot and the instant its collection completed.
    cached: Mutex<Option<(Arc<Snapshot>, Instant)>>,
    coalesce_window: Duration,
}

impl MonitorService {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn MetricSource>,
        store: Arc<dyn TimeSeriesStore>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new(config.schedule.device_timeout));
        Self {
            catalog: Arc::new(MetricCatalog::default()),
            collector: SnapshotCollector::new(source),
            history: HistoryReader::new(store.clone()),
            store,
            registry,
            stats: Arc::new(SchedulerStats::default()),
            cached: Mutex::new(None),
            coalesce_window: DEFAULT_COALESCE_WINDOW,
            config,
        }
    }

    /// Production wiring: SNMP agent and InfluxDB from `config`.
    pub fn from_config(config: MonitorConfig) -> Self {
        let source = Arc::new(SnmpSource::new(config.snmp.clone()));
        let store = Arc::new(InfluxStore::new(&config.store));
        Self::new(config, source, store)
    }

    /// Replace the metric catalog.
    ///
    /// The catalog must define the history metrics; the history endpoint
    /// would otherwise read series nothing writes. A catalog without
    /// [`PROBE_METRIC`] is accepted: [`probe`](Self::probe) then queries
    /// `sysDescr.0` directly.
    pub fn with_catalog(mut self, catalog: MetricCatalog) -> Result<Self> {
        if let Some(missing) = HISTORY_METRICS.iter().find(|m| !catalog.contains(m)) {
            return Err(MonitorError::config(format!(
                "catalog is missing history metric '{missing}'"
            )));
        }
        self.catalog = Arc::new(catalog);
        Ok(self)
    }

    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window = window;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn TimeSeriesStore> {
        &self.store
    }

    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }

    /// `host:port` of the monitored device.
    pub fn target(&self) -> String {
        self.collector.source().target()
    }

    /// Create the configured database and point the store at it.
    pub async fn prepare_store(&self) -> Result<()> {
        let db = &self.config.store.database;
        self.store.create_database(db).await?;
        self.store.switch_database(db);
        log::info!("using database '{db}'");
        Ok(())
    }

    /// Scheduler sharing this service's catalog, store, registry and stats.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.config.schedule.clone(),
            self.catalog.clone(),
            self.collector.clone(),
            TimeSeriesWriter::new(self.store.clone()),
        )
        .with_registry(self.registry.clone())
        .with_stats(self.stats.clone())
    }

    /// Current snapshot across the full catalog, coalesced.
    pub async fn current_snapshot(&self) -> Arc<Snapshot> {
        let mut cached = self.cached.lock().await;
        if let Some((snapshot, finished)) = cached.as_ref() {
            if finished.elapsed() < self.coalesce_window {
                return snapshot.clone();
            }
        }
        let snapshot = Arc::new(self.collector.collect_all(&self.catalog, unix_ms_now()).await);
        *cached = Some((snapshot.clone(), Instant::now()));
        snapshot
    }

    /// Aligned CPU and RAM history for the last `hours` (clamped to 1..=720).
    pub async fn history(&self, hours: u32) -> History {
        let hours = hours.clamp(1, MAX_HISTORY_HOURS);
        let window = HistoryWindow::last_hours(hours, unix_ms_now());
        self.history.read(HISTORY_METRICS, window).await
    }

    /// Registry contents, sorted by host.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.registry.list()
    }

    /// Single reachability query against the device.
    pub async fn probe(&self) -> RawResult {
        match self.collector.collect_one(&self.catalog, PROBE_METRIC).await {
            Some(result) => result,
            None => self.collector.source().query(SYS_DESCR_OID).await,
        }
    }
}

const SYS_DESCR_OID: &str = "1.3.6.1.2.1.1.1.0";
