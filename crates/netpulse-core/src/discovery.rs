//! Registry of devices the monitor has heard from.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::snapshot::Snapshot;
use crate::validate::Classification;

/// What the registry knows about one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub host: String,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_name: Option<String>,
    /// Usable fields in the last snapshot.
    pub usable: usize,
    /// Failed fields in the last snapshot.
    pub failed: usize,
}

/// Mutex-guarded device map with inactivity eviction.
pub struct DeviceRegistry {
    devices: Mutex<HashMap<String, DeviceRecord>>,
    inactivity: Duration,
}

impl DeviceRegistry {
    pub fn new(inactivity: Duration) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            inactivity,
        }
    }

    pub fn inactivity(&self) -> Duration {
        self.inactivity
    }

    /// Create or refresh the record for `host` from a non-critical snapshot.
    pub fn record_contact(&self, host: &str, snapshot: &Snapshot, classification: &Classification) {
        let now = snapshot.collected_unix_ms();
        let sys_name = snapshot
            .get("sysName")
            .and_then(|r| r.value())
            .map(str::to_string);
        let mut devices = self.devices.lock().unwrap();
        let record = devices.entry(host.to_string()).or_insert_with(|| {
            log::info!("device {host} discovered");
            DeviceRecord {
                host: host.to_string(),
                first_seen_ms: now,
                last_seen_ms: now,
                sys_name: None,
                usable: 0,
                failed: 0,
            }
        });
        record.last_seen_ms = record.last_seen_ms.max(now);
        if sys_name.is_some() {
            record.sys_name = sys_name;
        }
        record.usable = classification.usable.len();
        record.failed = snapshot.failed_count();
    }

    /// Drop records not seen within the inactivity timeout. Returns the
    /// evicted hosts.
    pub fn evict_inactive(&self, now_ms: u64) -> Vec<String> {
        let limit = self.inactivity.as_millis() as u64;
        let mut evicted = Vec::new();
        self.devices.lock().unwrap().retain(|host, record| {
            let keep = now_ms.saturating_sub(record.last_seen_ms) <= limit;
            if !keep {
                evicted.push(host.clone());
            }
            keep
        });
        for host in &evicted {
            log::info!("device {host} evicted after inactivity");
        }
        evicted
    }

    /// Records sorted by host.
    pub fn list(&self) -> Vec<DeviceRecord> {
        let mut out: Vec<DeviceRecord> = self.devices.lock().unwrap().values().cloned().collect();
        out.sort_by(|a, b| a.host.cmp(&b.host));
        out
    }

    pub fn get(&self, host: &str) -> Option<DeviceRecord> {
        self.devices.lock().unwrap().get(host).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::source::RawResult;
    use crate::validate::classify;

    fn snap(at: u64) -> Snapshot {
        Snapshot::from_pairs(
            at,
            [
                ("sysName", RawResult::ok("RTR-01")),
                ("cpuUsage", RawResult::ok("45")),
                ("ramUsage", RawResult::failed(FailureKind::Timeout, "t")),
            ],
        )
    }

    #[test]
    fn first_contact_creates_record() {
        let reg = DeviceRegistry::default();
        let s = snap(1_000);
        reg.record_contact("10.0.0.1:161", &s, &classify(&s));
        let rec = reg.get("10.0.0.1:161").unwrap();
        assert_eq!(rec.first_seen_ms, 1_000);
        assert_eq!(rec.sys_name.as_deref(), Some("RTR-01"));
        assert_eq!(rec.usable, 1);
        assert_eq!(rec.failed, 1);
    }

    #[test]
    fn refresh_keeps_first_seen() {
        let reg = DeviceRegistry::default();
        let a = snap(1_000);
        let b = snap(9_000);
        reg.record_contact("h", &a, &classify(&a));
        reg.record_contact("h", &b, &classify(&b));
        let rec = reg.get("h").unwrap();
        assert_eq!(rec.first_seen_ms, 1_000);
        assert_eq!(rec.last_seen_ms, 9_000);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn inactive_devices_are_evicted() {
        let reg = DeviceRegistry::new(Duration::from_secs(60));
        let s = snap(0);
        reg.record_contact("old", &s, &classify(&s));
        let s = snap(50_000);
        reg.record_contact("fresh", &s, &classify(&s));

        assert_eq!(reg.evict_inactive(60_000), Vec::<String>::new());
        assert_eq!(reg.evict_inactive(60_001), vec!["old".to_string()]);
        let hosts: Vec<_> = reg.list().into_iter().map(|r| r.host).collect();
        assert_eq!(hosts, vec!["fresh"]);
    }
}
