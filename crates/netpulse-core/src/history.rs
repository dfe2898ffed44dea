//! Aligned multi-metric history.
//!
//! Each metric is stored as an independent series, so samples collected in
//! the same tick may not share an exact timestamp. [`HistoryReader`] fetches
//! one series per metric and [`History`] merges them by time: samples within
//! `tolerance` of the first timestamp in a group become one [`HistoryPoint`].
//! Values are never paired by position.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::store::{HistoryWindow, SeriesSample, TimeSeriesStore};

/// Default grouping tolerance between per-metric samples.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(1);

/// One aligned timestamp with a value (or `None`) per requested metric.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub unix_ms: u64,
    pub values: BTreeMap<String, Option<f64>>,
}

impl HistoryPoint {
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied().flatten()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        i64::try_from(self.unix_ms)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_default()
    }
}

impl Serialize for HistoryPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("HistoryPoint", 3)?;
        s.serialize_field(
            "timestamp",
            &self.timestamp().to_rfc3339_opts(SecondsFormat::Millis, true),
        )?;
        s.serialize_field("timestamp_ms", &self.unix_ms)?;
        s.serialize_field("data", &self.values)?;
        s.end()
    }
}

/// Series fetched for one read. Iteration recomputes the merge each time.
#[derive(Debug, Clone, Default)]
pub struct History {
    series: Vec<(String, Vec<SeriesSample>)>,
    tolerance_ms: u64,
}

impl History {
    /// Build from per-metric series. Samples are sorted here; on duplicate
    /// timestamps the later sample wins.
    pub fn from_series(series: Vec<(String, Vec<SeriesSample>)>, tolerance: Duration) -> Self {
        let series = series
            .into_iter()
            .map(|(name, samples)| {
                let dedup: BTreeMap<u64, f64> =
                    samples.into_iter().map(|s| (s.unix_ms, s.value)).collect();
                let samples = dedup
                    .into_iter()
                    .map(|(unix_ms, value)| SeriesSample { unix_ms, value })
                    .collect();
                (name, samples)
            })
            .collect();
        Self {
            series,
            tolerance_ms: tolerance.as_millis() as u64,
        }
    }

    /// Points in ascending time order.
    pub fn iter(&self) -> AlignedPoints<'_> {
        AlignedPoints {
            history: self,
            cursors: vec![0; self.series.len()],
        }
    }

    /// Points in descending time order.
    pub fn newest_first(&self) -> Vec<HistoryPoint> {
        let mut points: Vec<HistoryPoint> = self.iter().collect();
        points.reverse();
        points
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|(_, s)| s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|(n, _)| n.as_str())
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = HistoryPoint;
    type IntoIter = AlignedPoints<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy k-way merge over the fetched series.
pub struct AlignedPoints<'a> {
    history: &'a History,
    cursors: Vec<usize>,
}

impl Iterator for AlignedPoints<'_> {
    type Item = HistoryPoint;

    fn next(&mut self) -> Option<HistoryPoint> {
        let series = &self.history.series;
        let group_start = series
            .iter()
            .zip(&self.cursors)
            .filter_map(|((_, samples), &c)| samples.get(c).map(|s| s.unix_ms))
            .min()?;
        let group_end = group_start.saturating_add(self.history.tolerance_ms);

        let mut stamp = group_start;
        let mut values = BTreeMap::new();
        for ((name, samples), cursor) in series.iter().zip(self.cursors.iter_mut()) {
            let mut taken = None;
            while let Some(s) = samples.get(*cursor) {
                if s.unix_ms > group_end {
                    break;
                }
                taken = Some(s.value);
                stamp = stamp.max(s.unix_ms);
                *cursor += 1;
            }
            values.insert(name.clone(), taken);
        }

        Some(HistoryPoint {
            unix_ms: stamp,
            values,
        })
    }
}

/// Reads and aligns per-metric series from a store.
#[derive(Clone)]
pub struct HistoryReader {
    store: Arc<dyn TimeSeriesStore>,
    tolerance: Duration,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            store,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Fetch `metrics` over `window`. Store failures are logged and produce
    /// an empty history.
    pub async fn read(&self, metrics: &[&str], window: HistoryWindow) -> History {
        let mut series = Vec::with_capacity(metrics.len());
        for &metric in metrics {
            match self.store.query_range(metric, window).await {
                Ok(samples) => {
                    log::debug!("history: {metric} returned {} samples", samples.len());
                    series.push((metric.to_string(), samples));
                }
                Err(e) => {
                    log::error!("history read for {metric} failed: {e}");
                    return History::default();
                }
            }
        }
        History::from_series(series, self.tolerance)
    }
}
