//! Perpetual collect → classify → write loop.
//!
//! Each tick runs in its own tokio task. A panic anywhere in collection,
//! classification or writing surfaces as a [`tokio::task::JoinError`] at the
//! tick boundary, is logged and counted, and the loop carries on. The loop
//! only ends when its [`CancellationToken`] fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::MetricCatalog;
use crate::config::ScheduleSettings;
use crate::discovery::DeviceRegistry;
use crate::snapshot::{SnapshotCollector, unix_ms_now};
use crate::validate::classify;
use crate::writer::{TimeSeriesWriter, WriteOutcome};

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Usable fields were written (possibly zero).
    Persisted { points: usize },
    /// Every field failed; nothing was written.
    Skipped,
    /// The store rejected the batch.
    WriteFailed(String),
    /// A step panicked; the panic was contained.
    Panicked(String),
}

/// Running counters, shared with status endpoints.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: AtomicU64,
    persisted_points: AtomicU64,
    skipped_ticks: AtomicU64,
    write_failures: AtomicU64,
    panics: AtomicU64,
    last_tick_ms: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub ticks: u64,
    pub persisted_points: u64,
    pub skipped_ticks: u64,
    pub write_failures: u64,
    pub panics: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_ms: Option<u64>,
}

impl SchedulerStats {
    pub fn record(&self, outcome: &TickOutcome, at_ms: u64) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_tick_ms.store(at_ms, Ordering::Relaxed);
        match outcome {
            TickOutcome::Persisted { points } => {
                self.persisted_points
                    .fetch_add(*points as u64, Ordering::Relaxed);
            }
            TickOutcome::Skipped => {
                self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
            }
            TickOutcome::WriteFailed(_) => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
            TickOutcome::Panicked(_) => {
                self.panics.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn report(&self) -> StatsReport {
        let last = self.last_tick_ms.load(Ordering::Relaxed);
        StatsReport {
            ticks: self.ticks.load(Ordering::Relaxed),
            persisted_points: self.persisted_points.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            last_tick_ms: (last > 0).then_some(last),
        }
    }
}

/// Drives the pipeline on a fixed cadence.
#[derive(Clone)]
pub struct Scheduler {
    settings: ScheduleSettings,
    catalog: Arc<MetricCatalog>,
    collector: SnapshotCollector,
    writer: TimeSeriesWriter,
    registry: Arc<DeviceRegistry>,
    stats: Arc<SchedulerStats>,
}

impl Scheduler {
    pub fn new(
        settings: ScheduleSettings,
        catalog: Arc<MetricCatalog>,
        collector: SnapshotCollector,
        writer: TimeSeriesWriter,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new(settings.device_timeout));
        Self {
            settings,
            catalog,
            collector,
            writer,
            registry,
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    pub fn with_registry(mut self, registry: Arc<DeviceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_stats(mut self, stats: Arc<SchedulerStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Start the loop on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Run until `cancel` fires. Cancellation is honoured during the startup
    /// delay and between ticks; an in-flight tick finishes first.
    pub async fn run(self, cancel: CancellationToken) {
        log::info!(
            "scheduler started for {} ({} metrics, every {:?}, first tick in {:?})",
            self.collector.source().target(),
            self.catalog.len(),
            self.settings.interval,
            self.settings.startup_delay,
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("scheduler cancelled before first tick");
                return;
            }
            _ = tokio::time::sleep(self.settings.startup_delay) => {}
        }

        loop {
            self.run_tick().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        log::info!(
            "scheduler stopped after {} ticks",
            self.stats.report().ticks
        );
    }

    /// Run one tick in a separate task and record its outcome.
    pub async fn run_tick(&self) -> TickOutcome {
        let started = unix_ms_now();
        let this = self.clone();
        let outcome = match tokio::spawn(async move { this.tick(started).await }).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                let msg = panic_message(e.into_panic());
                log::error!("tick panicked: {msg}");
                TickOutcome::Panicked(msg)
            }
            Err(e) => {
                log::error!("tick aborted: {e}");
                TickOutcome::Panicked(e.to_string())
            }
        };
        self.stats.record(&outcome, started);
        outcome
    }

    async fn tick(&self, now_ms: u64) -> TickOutcome {
        let host = self.collector.source().target();
        log::debug!("tick: collecting {} metrics from {host}", self.catalog.len());

        let snapshot = self.collector.collect_all(&self.catalog, now_ms).await;
        let classification = classify(&snapshot);

        if classification.has_critical_failure {
            self.registry.evict_inactive(now_ms);
            log::warn!("no metric answered from {host}; write skipped");
            return TickOutcome::Skipped;
        }

        self.registry.record_contact(&host, &snapshot, &classification);
        self.registry.evict_inactive(now_ms);

        let failed = snapshot.failed_count();
        if failed > 0 {
            log::warn!(
                "degraded snapshot from {host}: {failed}/{} fields failed",
                snapshot.len()
            );
        }

        match self.writer.write(&classification.usable, &snapshot).await {
            WriteOutcome::Written { points } => {
                log::debug!("tick: persisted {points} points");
                TickOutcome::Persisted { points }
            }
            WriteOutcome::Failed(e) => {
                log::error!("write failed: {e}");
                TickOutcome::WriteFailed(e.to_string())
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
