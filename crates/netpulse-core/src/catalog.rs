//! The fixed set of named metrics the monitor understands.
//!
//! A [`MetricCatalog`] maps a metric name (`cpuUsage`, `if1_In`, ...) to the
//! SNMP OID it is read from. It is built once at startup and never mutated;
//! every other component addresses metrics by the names defined here.

use crate::error::{MonitorError, Result};

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDef {
    /// Metric name used as the store tag and in API payloads.
    pub name: String,
    /// Dotted numeric OID, e.g. `1.3.6.1.2.1.1.5.0`.
    pub oid: String,
}

/// Ordered, immutable metric catalog.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    entries: Vec<MetricDef>,
}

/// Device profile of the monitored Cisco router.
const DEFAULT_METRICS: &[(&str, &str)] = &[
    ("sysName", "1.3.6.1.2.1.1.5.0"),
    ("sysDescr", "1.3.6.1.2.1.1.1.0"),
    ("sysContact", "1.3.6.1.2.1.1.4.0"),
    ("sysLocation", "1.3.6.1.2.1.1.6.0"),
    ("sysUpTime", "1.3.6.1.2.1.1.3.0"),
    ("cpuUsage", "1.3.6.1.4.1.9.9.109.1.1.1.1.6"),
    ("ramTotal", "1.3.6.1.4.1.9.9.48.1.1.1.6"),
    ("ramFree", "1.3.6.1.4.1.9.9.48.1.1.1.5"),
    // Same object as ramFree; the agent exposes no usage gauge.
    ("ramUsage", "1.3.6.1.4.1.9.9.48.1.1.1.5"),
    // GigabitEthernet0/0
    ("if1_Name", "1.3.6.1.2.1.2.2.1.2.1"),
    ("if1_Status", "1.3.6.1.2.1.2.2.1.8.1"),
    ("if1_In", "1.3.6.1.2.1.2.2.1.10.1"),
    ("if1_Out", "1.3.6.1.2.1.2.2.1.16.1"),
    ("if1_ErrIn", "1.3.6.1.2.1.2.2.1.14.1"),
    ("if1_ErrOut", "1.3.6.1.2.1.2.2.1.20.1"),
    // GigabitEthernet0/1
    ("if2_Name", "1.3.6.1.2.1.2.2.1.2.2"),
    ("if2_Status", "1.3.6.1.2.1.2.2.1.8.2"),
    ("if2_In", "1.3.6.1.2.1.2.2.1.10.2"),
    ("if2_Out", "1.3.6.1.2.1.2.2.1.16.2"),
    ("if2_ErrIn", "1.3.6.1.2.1.2.2.1.14.2"),
    ("if2_ErrOut", "1.3.6.1.2.1.2.2.1.20.2"),
];

/// Metrics reconstructed by the history endpoints.
pub const HISTORY_METRICS: &[&str] = &["cpuUsage", "ramUsage"];

/// Metric used to check that the agent answers at all.
pub const PROBE_METRIC: &str = "sysDescr";

impl MetricCatalog {
    /// Build a catalog from `(name, oid)` pairs, keeping their order.
    ///
    /// Rejects an empty list, empty or duplicate names, and OIDs that are not
    /// dotted decimal.
    pub fn new<N, O>(entries: impl IntoIterator<Item = (N, O)>) -> Result<Self>
    where
        N: Into<String>,
        O: Into<String>,
    {
        let mut out: Vec<MetricDef> = Vec::new();
        for (name, oid) in entries {
            let name = name.into();
            let oid = oid.into();
            if name.trim().is_empty() {
                return Err(MonitorError::config("metric name must not be empty"));
            }
            if out.iter().any(|d| d.name == name) {
                return Err(MonitorError::config(format!("duplicate metric name '{name}'")));
            }
            if !is_dotted_oid(&oid) {
                return Err(MonitorError::config(format!(
                    "metric '{name}' has invalid OID '{oid}'"
                )));
            }
            out.push(MetricDef { name, oid });
        }
        if out.is_empty() {
            return Err(MonitorError::config("metric catalog is empty"));
        }
        Ok(Self { entries: out })
    }

    /// Number of metrics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed catalog; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricDef> {
        self.entries.iter()
    }

    /// Metric names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.name.as_str()).collect()
    }

    /// OID for a metric name.
    pub fn oid(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.oid.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.oid(name).is_some()
    }

    /// Keep only the named metrics, preserving catalog order.
    ///
    /// Unknown names are an error so typos surface at startup.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        if let Some(unknown) = names.iter().find(|n| !self.contains(n)) {
            return Err(MonitorError::config(format!("unknown metric '{unknown}'")));
        }
        Self::new(
            self.entries
                .iter()
                .filter(|d| names.contains(&d.name.as_str()))
                .map(|d| (d.name.clone(), d.oid.clone())),
        )
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self {
            entries: DEFAULT_METRICS
                .iter()
                .map(|(name, oid)| MetricDef {
                    name: (*name).to_string(),
                    oid: (*oid).to_string(),
                })
                .collect(),
        }
    }
}

fn is_dotted_oid(oid: &str) -> bool {
    let trimmed = oid.trim().trim_start_matches('.');
    !trimmed.is_empty()
        && trimmed
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_matches_device_profile() {
        let catalog = MetricCatalog::default();
        assert_eq!(catalog.len(), 21);
        assert_eq!(catalog.oid("cpuUsage"), Some("1.3.6.1.4.1.9.9.109.1.1.1.1.6"));
        assert_eq!(catalog.oid("if2_ErrOut"), Some("1.3.6.1.2.1.2.2.1.20.2"));
        assert_eq!(catalog.names()[0], "sysName");
    }

    #[test]
    fn default_catalog_passes_validation() {
        let rebuilt = MetricCatalog::new(
            MetricCatalog::default()
                .iter()
                .map(|d| (d.name.clone(), d.oid.clone())),
        );
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn history_and_probe_metrics_are_cataloged() {
        let catalog = MetricCatalog::default();
        for name in HISTORY_METRICS {
            assert!(catalog.contains(name), "{name} missing");
        }
        assert!(catalog.contains(PROBE_METRIC));
    }

    #[test]
    fn rejects_empty_catalog() {
        let empty: Vec<(&str, &str)> = Vec::new();
        assert!(MetricCatalog::new(empty).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = MetricCatalog::new([("a", "1.3.6"), ("a", "1.3.7")]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_non_numeric_oid() {
        assert!(MetricCatalog::new([("a", "1.3.x.4")]).is_err());
        assert!(MetricCatalog::new([("a", "")]).is_err());
        assert!(MetricCatalog::new([("a", "1..3")]).is_err());
    }

    #[test]
    fn accepts_leading_dot() {
        assert!(MetricCatalog::new([("a", ".1.3.6.1")]).is_ok());
    }

    #[test]
    fn select_keeps_catalog_order() {
        let catalog = MetricCatalog::default();
        let picked = catalog.select(&["ramUsage", "cpuUsage"]).unwrap();
        assert_eq!(picked.names(), vec!["cpuUsage", "ramUsage"]);
    }

    #[test]
    fn select_rejects_unknown() {
        assert!(MetricCatalog::default().select(&["nope"]).is_err());
    }
}
