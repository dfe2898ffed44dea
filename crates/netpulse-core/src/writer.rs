//! Snapshot to store conversion.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::MonitorError;
use crate::snapshot::Snapshot;
use crate::store::{PersistablePoint, TimeSeriesStore};
use crate::validate::parse_metric_value;

/// Result of one write attempt.
#[derive(Debug)]
pub enum WriteOutcome {
    Written { points: usize },
    Failed(MonitorError),
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Turns the usable fields of a snapshot into one batch write.
#[derive(Clone)]
pub struct TimeSeriesWriter {
    store: Arc<dyn TimeSeriesStore>,
}

impl TimeSeriesWriter {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TimeSeriesStore> {
        &self.store
    }

    /// Build the points for `usable`, all stamped with the snapshot time.
    ///
    /// Names that are absent from the snapshot or no longer parse are dropped.
    pub fn points(usable: &BTreeSet<String>, snapshot: &Snapshot) -> Vec<PersistablePoint> {
        usable
            .iter()
            .filter_map(|name| {
                let value = snapshot.get(name)?.value().and_then(parse_metric_value)?;
                Some(PersistablePoint {
                    metric: name.clone(),
                    value,
                    unix_ms: snapshot.collected_unix_ms(),
                })
            })
            .collect()
    }

    /// Persist the usable fields of `snapshot`. An empty batch never reaches
    /// the store.
    pub async fn write(&self, usable: &BTreeSet<String>, snapshot: &Snapshot) -> WriteOutcome {
        let points = Self::points(usable, snapshot);
        if points.is_empty() {
            return WriteOutcome::Written { points: 0 };
        }
        match self.store.write_points(&points).await {
            Ok(()) => WriteOutcome::Written {
                points: points.len(),
            },
            Err(e) => WriteOutcome::Failed(e),
        }
    }
}
