//! InfluxDB 1.x backend.
//!
//! Writes go through the `influxdb` client as one batched line-protocol
//! request per tick. Reads issue a raw InfluxQL range query per metric and
//! decode the JSON body here, so statement-level errors and empty results
//! (`{"results":[{"statement_id":0}]}`) are handled explicitly. Every call is
//! bounded by the configured store timeout.

use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use influxdb::{Client, InfluxDbWriteable, ReadQuery, Timestamp, WriteQuery};
use serde::Deserialize;

use super::{
    HistoryWindow, MEASUREMENT, METRIC_TAG, PersistablePoint, SeriesSample, TimeSeriesStore,
    VALUE_FIELD,
};
use crate::config::StoreSettings;
use crate::error::{MonitorError, Result};

/// InfluxDB-backed time-series store.
pub struct InfluxStore {
    url: String,
    client: RwLock<Client>,
    timeout: Duration,
}

impl InfluxStore {
    pub fn new(settings: &StoreSettings) -> Self {
        let url = settings.url();
        Self {
            client: RwLock::new(Client::new(url.clone(), settings.database.clone())),
            url,
            timeout: settings.timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> Client {
        self.client.read().unwrap().clone()
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, influxdb::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Err(_) => Err(MonitorError::persistence(format!(
                "{op} timed out after {} ms",
                self.timeout.as_millis()
            ))),
            Ok(Err(e)) => Err(MonitorError::persistence(format!("{op} failed: {e}"))),
            Ok(Ok(v)) => Ok(v),
        }
    }

    /// Run a raw InfluxQL statement against the current database.
    pub async fn query(&self, influxql: &str) -> Result<Vec<QuerySeries>> {
        let client = self.client();
        let body = self
            .bounded("query", client.query(ReadQuery::new(influxql)))
            .await?;
        parse_query_response(&body)
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn create_database(&self, name: &str) -> Result<()> {
        let client = self.client();
        let statement = format!("CREATE DATABASE {}", quote_ident(name));
        self.bounded("create database", client.query(ReadQuery::new(statement)))
            .await
            .map(|_| ())
    }

    fn switch_database(&self, name: &str) {
        *self.client.write().unwrap() = Client::new(self.url.clone(), name.to_string());
    }

    fn database(&self) -> String {
        self.client.read().unwrap().database_name().to_string()
    }

    async fn write_points(&self, batch: &[PersistablePoint]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let queries: Vec<WriteQuery> = batch
            .iter()
            .map(|p| {
                Timestamp::Milliseconds(u128::from(p.unix_ms))
                    .into_query(MEASUREMENT)
                    .add_tag(METRIC_TAG, p.metric.clone())
                    .add_field(VALUE_FIELD, p.value)
            })
            .collect();
        let client = self.client();
        self.bounded("write", client.query(queries)).await.map(|_| ())
    }

    async fn query_range(&self, metric: &str, window: HistoryWindow) -> Result<Vec<SeriesSample>> {
        let series = self.query(&range_query(metric, window)).await?;
        let mut samples: Vec<SeriesSample> = series.iter().flat_map(series_samples).collect();
        samples.sort_by_key(|s| s.unix_ms);
        Ok(samples)
    }
}

// ---------------------------------------------------------------------------
// InfluxQL
// ---------------------------------------------------------------------------

/// Range query for one metric's series.
pub fn range_query(metric: &str, window: HistoryWindow) -> String {
    format!(
        "SELECT {value} FROM {measurement} WHERE {tag} = {metric} \
         AND time >= {start}ms AND time <= {end}ms ORDER BY time ASC",
        value = quote_ident(VALUE_FIELD),
        measurement = quote_ident(MEASUREMENT),
        tag = quote_ident(METRIC_TAG),
        metric = quote_literal(metric),
        start = window.start_ms,
        end = window.end_ms,
    )
}

fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<QuerySeries>,
    #[serde(default)]
    error: Option<String>,
}

/// One series from an InfluxDB JSON query response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QuerySeries {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// Decode a `/query` response body. Statement errors become persistence errors.
pub fn parse_query_response(body: &str) -> Result<Vec<QuerySeries>> {
    let resp: QueryResponse = serde_json::from_str(body)
        .map_err(|e| MonitorError::persistence(format!("malformed query response: {e}")))?;
    if let Some(err) = resp.error {
        return Err(MonitorError::persistence(err));
    }
    let mut out = Vec::new();
    for statement in resp.results {
        if let Some(err) = statement.error {
            return Err(MonitorError::persistence(err));
        }
        out.extend(statement.series);
    }
    Ok(out)
}

/// Extract `(time, value)` samples from a series, skipping null or
/// unparsable rows.
pub fn series_samples(series: &QuerySeries) -> Vec<SeriesSample> {
    let time_idx = series.columns.iter().position(|c| c == "time");
    let value_idx = series.columns.iter().position(|c| c == VALUE_FIELD);
    let (Some(ti), Some(vi)) = (time_idx, value_idx) else {
        log::warn!(
            "series '{}' lacks time/value columns: {:?}",
            series.name,
            series.columns
        );
        return Vec::new();
    };

    series
        .values
        .iter()
        .filter_map(|row| {
            let unix_ms = row.get(ti).and_then(json_time_ms)?;
            let value = row.get(vi).and_then(serde_json::Value::as_f64)?;
            Some(SeriesSample { unix_ms, value })
        })
        .collect()
}

fn json_time_ms(v: &serde_json::Value) -> Option<u64> {
    match v {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .and_then(|dt| u64::try_from(dt.timestamp_millis()).ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_query_shape() {
        let q = range_query("cpuUsage", HistoryWindow::new(1_000, 2_000));
        assert_eq!(
            q,
            "SELECT \"value\" FROM \"snmp_metrics\" WHERE \"oid\" = 'cpuUsage' \
             AND time >= 1000ms AND time <= 2000ms ORDER BY time ASC"
        );
    }

    #[test]
    fn metric_literal_is_escaped() {
        let q = range_query("it's", HistoryWindow::new(0, 1));
        assert!(q.contains(r"'it\'s'"));
    }

    #[test]
    fn parses_series_with_rfc3339_times() {
        let body = r#"{"results":[{"statement_id":0,"series":[{"name":"snmp_metrics",
            "columns":["time","value"],
            "values":[["2024-03-01T12:00:00Z",45],["2024-03-01T12:00:10.5Z",47.5]]}]}]}"#;
        let series = parse_query_response(body).unwrap();
        let samples = series_samples(&series[0]);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].unix_ms, 1_709_294_400_000);
        assert_eq!(samples[0].value, 45.0);
        assert_eq!(samples[1].unix_ms, 1_709_294_410_500);
        assert_eq!(samples[1].value, 47.5);
    }

    #[test]
    fn parses_epoch_times() {
        let body = r#"{"results":[{"series":[{"name":"snmp_metrics",
            "columns":["time","value"],"values":[[1700000000000,1.5]]}]}]}"#;
        let series = parse_query_response(body).unwrap();
        assert_eq!(
            series_samples(&series[0]),
            vec![SeriesSample {
                unix_ms: 1_700_000_000_000,
                value: 1.5
            }]
        );
    }

    #[test]
    fn empty_result_has_no_series() {
        let series = parse_query_response(r#"{"results":[{"statement_id":0}]}"#).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn statement_error_is_persistence_error() {
        let err = parse_query_response(r#"{"results":[{"statement_id":0,"error":"database not found: x"}]}"#)
            .unwrap_err();
        assert!(matches!(err, MonitorError::Persistence(_)));
    }

    #[test]
    fn null_values_are_skipped() {
        let series = QuerySeries {
            name: "snmp_metrics".to_string(),
            columns: vec!["time".to_string(), "value".to_string()],
            values: vec![
                vec![serde_json::json!(1), serde_json::Value::Null],
                vec![serde_json::json!(2), serde_json::json!(3.0)],
            ],
        };
        assert_eq!(series_samples(&series).len(), 1);
    }

    #[test]
    fn switch_database_rebuilds_client() {
        let store = InfluxStore::new(&StoreSettings::default());
        assert_eq!(store.database(), "snmp_data");
        store.switch_database("archive");
        assert_eq!(store.database(), "archive");
        assert_eq!(store.url(), "http://localhost:8086");
    }
}
