//! Point-in-time collection across the whole metric catalog.
//!
//! [`SnapshotCollector::collect_all`] queries every catalog entry through a
//! [`MetricSource`] and returns a [`Snapshot`] that always covers the full
//! catalog. Individual entries may be failed; the key set never shrinks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::catalog::MetricCatalog;
use crate::error::FailureKind;
use crate::source::{MetricSource, RawResult};
use crate::validate::parse_metric_value;

/// Milliseconds since the Unix epoch.
pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One collection of raw results, stamped with its collection time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    collected_unix_ms: u64,
    fields: BTreeMap<String, RawResult>,
}

impl Snapshot {
    pub fn new(collected_unix_ms: u64, fields: BTreeMap<String, RawResult>) -> Self {
        Self {
            collected_unix_ms,
            fields,
        }
    }

    /// Convenience constructor for literal snapshots.
    pub fn from_pairs<N: Into<String>>(
        collected_unix_ms: u64,
        pairs: impl IntoIterator<Item = (N, RawResult)>,
    ) -> Self {
        Self::new(
            collected_unix_ms,
            pairs.into_iter().map(|(n, r)| (n.into(), r)).collect(),
        )
    }

    pub fn collected_unix_ms(&self) -> u64 {
        self.collected_unix_ms
    }

    pub fn get(&self, name: &str) -> Option<&RawResult> {
        self.fields.get(name)
    }

    /// Entries sorted by metric name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawResult)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of failed entries.
    pub fn failed_count(&self) -> usize {
        self.fields.values().filter(|r| r.is_failed()).count()
    }

    /// Consumer-facing view: numbers where the value parses, text otherwise,
    /// and an explicit error marker for failed queries.
    pub fn display_map(&self) -> BTreeMap<String, FieldValue> {
        self.fields
            .iter()
            .map(|(name, raw)| (name.clone(), FieldValue::from(raw)))
            .collect()
    }
}

/// A snapshot entry as shown to API consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Unavailable { error: FailureKind, detail: String },
}

impl From<&RawResult> for FieldValue {
    fn from(raw: &RawResult) -> Self {
        match raw {
            RawResult::Ok(v) => match parse_metric_value(v) {
                Some(n) => Self::Number(n),
                None => Self::Text(v.clone()),
            },
            RawResult::Failed { kind, detail } => Self::Unavailable {
                error: *kind,
                detail: detail.clone(),
            },
        }
    }
}

/// Drives a [`MetricSource`] across a catalog.
#[derive(Clone)]
pub struct SnapshotCollector {
    source: Arc<dyn MetricSource>,
}

impl SnapshotCollector {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn MetricSource> {
        &self.source
    }

    /// Query every catalog entry in catalog order.
    pub async fn collect_all(&self, catalog: &MetricCatalog, collected_unix_ms: u64) -> Snapshot {
        let mut fields = BTreeMap::new();
        for def in catalog.iter() {
            let result = self.source.query(&def.oid).await;
            if let RawResult::Failed { kind, detail } = &result {
                log::debug!("{} ({}) failed: {kind}: {detail}", def.name, def.oid);
            }
            fields.insert(def.name.clone(), result);
        }
        Snapshot::new(collected_unix_ms, fields)
    }

    /// Query a single named metric.
    pub async fn collect_one(&self, catalog: &MetricCatalog, name: &str) -> Option<RawResult> {
        let oid = catalog.oid(name)?;
        Some(self.source.query(oid).await)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Answers from a fixed table and records the query order.
    struct TableSource {
        answers: HashMap<String, RawResult>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MetricSource for TableSource {
        async fn query(&self, address: &str) -> RawResult {
            self.seen.lock().unwrap().push(address.to_string());
            self.answers
                .get(address)
                .cloned()
                .unwrap_or_else(|| RawResult::failed(FailureKind::Timeout, "no answer"))
        }

        fn target(&self) -> String {
            "table".to_string()
        }
    }

    fn catalog() -> MetricCatalog {
        MetricCatalog::new([("sysName", "1.1"), ("cpuUsage", "1.2"), ("ramUsage", "1.3")]).unwrap()
    }

    #[tokio::test]
    async fn snapshot_covers_full_catalog_even_on_failure() {
        let source = Arc::new(TableSource {
            answers: HashMap::from([("1.2".to_string(), RawResult::ok("45"))]),
            seen: Mutex::new(Vec::new()),
        });
        let collector = SnapshotCollector::new(source.clone());
        let snap = collector.collect_all(&catalog(), 1_000).await;

        assert_eq!(snap.len(), 3);
        assert_eq!(snap.collected_unix_ms(), 1_000);
        assert_eq!(snap.get("cpuUsage"), Some(&RawResult::ok("45")));
        assert!(snap.get("sysName").unwrap().is_failed());
        assert_eq!(snap.failed_count(), 2);
    }

    #[tokio::test]
    async fn queries_follow_catalog_order() {
        let source = Arc::new(TableSource {
            answers: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        });
        let collector = SnapshotCollector::new(source.clone());
        collector.collect_all(&catalog(), 0).await;
        assert_eq!(*source.seen.lock().unwrap(), vec!["1.1", "1.2", "1.3"]);
    }

    #[tokio::test]
    async fn collect_one_unknown_name() {
        let source = Arc::new(TableSource {
            answers: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        });
        let collector = SnapshotCollector::new(source);
        assert!(collector.collect_one(&catalog(), "nope").await.is_none());
        assert!(collector.collect_one(&catalog(), "cpuUsage").await.is_some());
    }

    #[test]
    fn display_map_mixes_numbers_text_and_errors() {
        let snap = Snapshot::from_pairs(
            0,
            [
                ("cpuUsage", RawResult::ok("45")),
                ("sysName", RawResult::ok("RTR-01")),
                (
                    "ramUsage",
                    RawResult::failed(FailureKind::Timeout, "no reply"),
                ),
            ],
        );
        let map = snap.display_map();
        assert_eq!(map["cpuUsage"], FieldValue::Number(45.0));
        assert_eq!(map["sysName"], FieldValue::Text("RTR-01".to_string()));
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["cpuUsage"], 45.0);
        assert_eq!(json["sysName"], "RTR-01");
        assert_eq!(json["ramUsage"]["error"], "timeout");
        assert_eq!(json["ramUsage"]["detail"], "no reply");
    }
}
