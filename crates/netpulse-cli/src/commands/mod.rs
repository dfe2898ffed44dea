pub mod catalog;
pub mod history;
pub mod poll;
pub mod probe;
pub mod serve;

use std::sync::Arc;

use anyhow::Context;
use netpulse_core::{MemoryStore, MonitorConfig, MonitorService, SnmpSource};

/// Build the service, optionally with the in-memory store in place of InfluxDB.
pub fn make_service(config: MonitorConfig, memory_store: bool) -> MonitorService {
    if memory_store {
        let source = Arc::new(SnmpSource::new(config.snmp.clone()));
        let store = Arc::new(MemoryStore::new(&config.store.database));
        MonitorService::new(config, source, store)
    } else {
        MonitorService::from_config(config)
    }
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start tokio runtime")
}
