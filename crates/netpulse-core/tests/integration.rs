//! Integration tests for netpulse-core.
//!
//! These tests drive the full pipeline with a scripted agent and the
//! in-memory store:
//! scheduler tick → snapshot → classification → batch write → aligned history.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use netpulse_core::{
    FailureKind, HistoryReader, HistoryWindow, MetricCatalog, MetricSource, MonitorConfig,
    MonitorService, RawResult, ScheduleSettings, Scheduler, SnapshotCollector, TickOutcome,
    TimeSeriesStore, TimeSeriesWriter, classify,
};
use netpulse_core::store::MemoryStore;
use tokio_util::sync::CancellationToken;

/// Agent whose answers can be rewritten between ticks.
struct ScriptedAgent {
    answers: Mutex<HashMap<String, RawResult>>,
}

impl ScriptedAgent {
    fn new(answers: &[(&str, RawResult)]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(
                answers
                    .iter()
                    .map(|(oid, r)| (oid.to_string(), r.clone()))
                    .collect(),
            ),
        })
    }

    fn set(&self, oid: &str, result: RawResult) {
        self.answers.lock().unwrap().insert(oid.to_string(), result);
    }
}

#[async_trait]
impl MetricSource for ScriptedAgent {
    async fn query(&self, address: &str) -> RawResult {
        self.answers
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_else(|| RawResult::failed(FailureKind::TransportError, "unscripted"))
    }

    fn target(&self) -> String {
        "192.0.2.10:161".to_string()
    }
}

/// Store that can be switched off, wrapping the in-memory store.
struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
}

#[async_trait]
impl TimeSeriesStore for FlakyStore {
    async fn create_database(&self, name: &str) -> netpulse_core::Result<()> {
        self.inner.create_database(name).await
    }

    fn switch_database(&self, name: &str) {
        self.inner.switch_database(name)
    }

    fn database(&self) -> String {
        self.inner.database()
    }

    async fn write_points(&self, batch: &[netpulse_core::PersistablePoint]) -> netpulse_core::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(netpulse_core::MonitorError::persistence("connection refused"));
        }
        self.inner.write_points(batch).await
    }

    async fn query_range(
        &self,
        metric: &str,
        window: HistoryWindow,
    ) -> netpulse_core::Result<Vec<netpulse_core::SeriesSample>> {
        self.inner.query_range(metric, window).await
    }
}

fn catalog() -> MetricCatalog {
    MetricCatalog::new([("sysName", "1.1"), ("cpuUsage", "1.2"), ("ramUsage", "1.3")]).unwrap()
}

fn fast_schedule() -> ScheduleSettings {
    ScheduleSettings {
        interval: Duration::from_millis(5),
        startup_delay: Duration::ZERO,
        device_timeout: Duration::from_secs(300),
    }
}

fn scheduler(agent: Arc<ScriptedAgent>, store: Arc<dyn TimeSeriesStore>) -> Scheduler {
    Scheduler::new(
        fast_schedule(),
        Arc::new(catalog()),
        SnapshotCollector::new(agent),
        TimeSeriesWriter::new(store),
    )
}

fn wide_window() -> HistoryWindow {
    HistoryWindow::new(0, u64::MAX / 2)
}

#[tokio::test]
async fn descriptive_field_is_never_stored() {
    // Scenario A
    let agent = ScriptedAgent::new(&[
        ("1.1", RawResult::ok("RTR-01")),
        ("1.2", RawResult::ok("45")),
        ("1.3", RawResult::ok("512000")),
    ]);
    let store = Arc::new(MemoryStore::default());
    let s = scheduler(agent, store.clone());

    assert_eq!(s.run_tick().await, TickOutcome::Persisted { points: 2 });
    assert!(store.query_range("sysName", wide_window()).await.unwrap().is_empty());
    assert_eq!(store.query_range("cpuUsage", wide_window()).await.unwrap()[0].value, 45.0);
    assert_eq!(
        store.query_range("ramUsage", wide_window()).await.unwrap()[0].value,
        512000.0
    );
}

#[tokio::test]
async fn degraded_snapshot_persists_good_fields_only() {
    // Scenario B
    let agent = ScriptedAgent::new(&[
        ("1.1", RawResult::ok("RTR-01")),
        ("1.2", RawResult::failed(FailureKind::Timeout, "requestTimedOut")),
        ("1.3", RawResult::ok("33")),
    ]);
    let store = Arc::new(MemoryStore::default());
    let s = scheduler(agent, store.clone());

    assert_eq!(s.run_tick().await, TickOutcome::Persisted { points: 1 });
    assert!(store.query_range("cpuUsage", wide_window()).await.unwrap().is_empty());
    assert_eq!(store.query_range("ramUsage", wide_window()).await.unwrap()[0].value, 33.0);
}

#[tokio::test]
async fn store_outage_then_recovery() {
    // Scenario C
    let agent = ScriptedAgent::new(&[("1.2", RawResult::ok("45")), ("1.3", RawResult::ok("30"))]);
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::default(),
        down: AtomicBool::new(true),
    });
    let s = scheduler(agent, store.clone());

    assert!(matches!(s.run_tick().await, TickOutcome::WriteFailed(_)));
    store.down.store(false, Ordering::SeqCst);
    assert_eq!(s.run_tick().await, TickOutcome::Persisted { points: 2 });
    assert_eq!(store.inner.batches_written(), 1);
}

#[tokio::test]
async fn empty_store_reads_as_empty_history() {
    // Scenario D
    let reader = HistoryReader::new(Arc::new(MemoryStore::default()));
    let history = reader.read(&["cpuUsage", "ramUsage"], wide_window()).await;
    assert!(history.is_empty());
    assert_eq!(history.iter().count(), 0);
}

#[tokio::test]
async fn written_values_read_back_aligned() {
    let agent = ScriptedAgent::new(&[("1.2", RawResult::ok("45")), ("1.3", RawResult::ok("30"))]);
    let store = Arc::new(MemoryStore::default());
    let s = scheduler(agent.clone(), store.clone());

    s.run_tick().await;
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    agent.set("1.2", RawResult::ok("50"));
    agent.set("1.3", RawResult::failed(FailureKind::Timeout, "t"));
    s.run_tick().await;

    let history = HistoryReader::new(store)
        .read(&["cpuUsage", "ramUsage"], wide_window())
        .await;
    let points: Vec<_> = history.iter().collect();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].get("cpuUsage"), Some(45.0));
    assert_eq!(points[0].get("ramUsage"), Some(30.0));
    assert_eq!(points[1].get("cpuUsage"), Some(50.0));
    assert_eq!(points[1].values["ramUsage"], None);
    assert!(points[0].unix_ms < points[1].unix_ms);
}

#[tokio::test]
async fn all_failed_agent_is_skipped_not_fatal() {
    let agent = ScriptedAgent::new(&[]);
    let store = Arc::new(MemoryStore::default());
    let s = scheduler(agent.clone(), store.clone());

    assert_eq!(s.run_tick().await, TickOutcome::Skipped);
    agent.set("1.2", RawResult::ok("12"));
    assert_eq!(s.run_tick().await, TickOutcome::Persisted { points: 1 });
}

#[tokio::test]
async fn spawned_loop_runs_until_cancelled() {
    let agent = ScriptedAgent::new(&[("1.2", RawResult::ok("45"))]);
    let store = Arc::new(MemoryStore::default());
    let s = scheduler(agent, store.clone());
    let stats = s.stats().clone();
    let registry = s.registry().clone();

    let cancel = CancellationToken::new();
    let handle = s.spawn(cancel.clone());
    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("scheduler should stop on cancel")
        .unwrap();

    let report = stats.report();
    assert!(report.ticks >= 2, "expected several ticks, got {}", report.ticks);
    assert_eq!(report.panics, 0);
    assert!(store.batches_written() >= 1);
    assert_eq!(registry.list()[0].host, "192.0.2.10:161");
}

#[tokio::test]
async fn service_scheduler_shares_registry_and_stats() {
    let agent = ScriptedAgent::new(&[("1.1", RawResult::ok("RTR-01")), ("1.2", RawResult::ok("45"))]);
    let store = Arc::new(MemoryStore::default());
    let service = MonitorService::new(MonitorConfig::default(), agent, store)
        .with_catalog(catalog())
        .unwrap();

    service.scheduler().run_tick().await;
    let devices = service.devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].sys_name.as_deref(), Some("RTR-01"));
    assert_eq!(service.stats().report().ticks, 1);
}

#[tokio::test]
async fn classification_matches_scheduler_decision() {
    let agent = ScriptedAgent::new(&[("1.2", RawResult::ok("Error: noSuchInstance"))]);
    let snapshot = SnapshotCollector::new(agent).collect_all(&catalog(), 0).await;
    let c = classify(&snapshot);
    assert!(c.usable.is_empty());
    assert!(!c.has_critical_failure);
}
