//! In-process store with the same semantics as the InfluxDB backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use super::{HistoryWindow, PersistablePoint, SeriesSample, TimeSeriesStore};
use crate::error::{MonitorError, Result};

type Series = BTreeMap<u64, f64>;

/// Thread-safe in-memory time-series store.
///
/// Points with the same metric and timestamp overwrite each other, as they do
/// in InfluxDB. [`MemoryStore::set_available`] simulates an outage.
pub struct MemoryStore {
    databases: Mutex<HashMap<String, HashMap<String, Series>>>,
    current: Mutex<String>,
    available: AtomicBool,
    batches: AtomicU64,
}

impl MemoryStore {
    pub fn new(database: &str) -> Self {
        let mut databases = HashMap::new();
        databases.insert(database.to_string(), HashMap::new());
        Self {
            databases: Mutex::new(databases),
            current: Mutex::new(database.to_string()),
            available: AtomicBool::new(true),
            batches: AtomicU64::new(0),
        }
    }

    /// Toggle simulated availability. While unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `write_points` calls.
    pub fn batches_written(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }

    /// Total points stored in the current database.
    pub fn point_count(&self) -> usize {
        let db = self.database();
        self.databases
            .lock()
            .unwrap()
            .get(&db)
            .map(|m| m.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MonitorError::persistence("memory store unavailable"))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("snmp_data")
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn create_database(&self, name: &str) -> Result<()> {
        self.check_available()?;
        self.databases
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    fn switch_database(&self, name: &str) {
        *self.current.lock().unwrap() = name.to_string();
    }

    fn database(&self) -> String {
        self.current.lock().unwrap().clone()
    }

    async fn write_points(&self, batch: &[PersistablePoint]) -> Result<()> {
        self.check_available()?;
        let db = self.database();
        let mut databases = self.databases.lock().unwrap();
        let metrics = databases
            .get_mut(&db)
            .ok_or_else(|| MonitorError::persistence(format!("database not found: {db}")))?;
        for p in batch {
            metrics
                .entry(p.metric.clone())
                .or_default()
                .insert(p.unix_ms, p.value);
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query_range(&self, metric: &str, window: HistoryWindow) -> Result<Vec<SeriesSample>> {
        self.check_available()?;
        let db = self.database();
        let databases = self.databases.lock().unwrap();
        let metrics = databases
            .get(&db)
            .ok_or_else(|| MonitorError::persistence(format!("database not found: {db}")))?;
        Ok(metrics
            .get(metric)
            .map(|series| {
                series
                    .range(window.start_ms..=window.end_ms)
                    .map(|(&unix_ms, &value)| SeriesSample { unix_ms, value })
                    .collect()
            })
            .unwrap_or_default())
    }
}
