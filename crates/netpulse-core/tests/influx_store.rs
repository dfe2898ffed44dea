//! InfluxStore against a local HTTP fake speaking the InfluxDB 1.x API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use netpulse_core::{
    HistoryWindow, InfluxStore, MonitorError, PersistablePoint, StoreSettings, TimeSeriesStore,
};

#[derive(Default)]
struct Recorded {
    writes: Vec<(HashMap<String, String>, String)>,
    queries: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<Recorded>>;

async fn write(
    State(rec): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> StatusCode {
    rec.lock().unwrap().writes.push((params, body));
    StatusCode::NO_CONTENT
}

async fn query(State(rec): State<Shared>, Query(params): Query<HashMap<String, String>>) -> String {
    let q = params.get("q").cloned().unwrap_or_default();
    rec.lock().unwrap().queries.push(params);
    if q.starts_with("SELECT") && q.contains("'cpuUsage'") {
        r#"{"results":[{"statement_id":0,"series":[{"name":"snmp_metrics",
            "columns":["time","value"],
            "values":[["2024-03-01T12:00:00Z",45],["2024-03-01T12:00:10Z",47.5]]}]}]}"#
            .to_string()
    } else {
        r#"{"results":[{"statement_id":0}]}"#.to_string()
    }
}

async fn slow_write() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::NO_CONTENT
}

async fn serve(app: Router) -> StoreSettings {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    StoreSettings {
        host: "127.0.0.1".to_string(),
        port,
        database: "snmp_data".to_string(),
        timeout: Duration::from_millis(500),
    }
}

async fn fake_influx() -> (Shared, StoreSettings) {
    let rec = Shared::default();
    let app = Router::new()
        .route("/write", post(write))
        .route("/query", get(query).post(query))
        .with_state(rec.clone());
    (rec, serve(app).await)
}

#[tokio::test]
async fn batch_write_is_one_request() {
    let (rec, settings) = fake_influx().await;
    let store = InfluxStore::new(&settings);
    store
        .write_points(&[
            PersistablePoint {
                metric: "cpuUsage".to_string(),
                value: 45.0,
                unix_ms: 1_709_294_400_000,
            },
            PersistablePoint {
                metric: "ramUsage".to_string(),
                value: 512000.0,
                unix_ms: 1_709_294_400_000,
            },
        ])
        .await
        .unwrap();

    let rec = rec.lock().unwrap();
    assert_eq!(rec.writes.len(), 1);
    let (params, body) = &rec.writes[0];
    assert_eq!(params.get("db").map(String::as_str), Some("snmp_data"));
    assert!(body.contains("snmp_metrics,oid=cpuUsage value=45"));
    assert!(body.contains("snmp_metrics,oid=ramUsage value=512000"));
    assert_eq!(body.lines().count(), 2);
}

#[tokio::test]
async fn empty_batch_sends_nothing() {
    let (rec, settings) = fake_influx().await;
    InfluxStore::new(&settings).write_points(&[]).await.unwrap();
    assert!(rec.lock().unwrap().writes.is_empty());
}

#[tokio::test]
async fn range_query_decodes_samples() {
    let (rec, settings) = fake_influx().await;
    let store = InfluxStore::new(&settings);
    let samples = store
        .query_range("cpuUsage", HistoryWindow::new(0, 2_000_000_000_000))
        .await
        .unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].unix_ms, 1_709_294_400_000);
    assert_eq!(samples[1].value, 47.5);

    let rec = rec.lock().unwrap();
    let q = &rec.queries[0]["q"];
    assert!(q.contains("\"oid\" = 'cpuUsage'"));
    assert!(q.contains("time >= 0ms"));
}

#[tokio::test]
async fn missing_series_is_empty() {
    let (_, settings) = fake_influx().await;
    let samples = InfluxStore::new(&settings)
        .query_range("ramUsage", HistoryWindow::new(0, 1))
        .await
        .unwrap();
    assert!(samples.is_empty());
}

#[tokio::test]
async fn create_and_switch_database() {
    let (rec, settings) = fake_influx().await;
    let store = InfluxStore::new(&settings);
    store.create_database("archive").await.unwrap();
    store.switch_database("archive");
    store
        .write_points(&[PersistablePoint {
            metric: "cpuUsage".to_string(),
            value: 1.0,
            unix_ms: 1,
        }])
        .await
        .unwrap();

    let rec = rec.lock().unwrap();
    assert_eq!(rec.queries[0]["q"], "CREATE DATABASE \"archive\"");
    assert_eq!(rec.writes[0].0.get("db").map(String::as_str), Some("archive"));
}

#[tokio::test]
async fn slow_store_times_out() {
    let settings = serve(Router::new().route("/write", post(slow_write))).await;
    let store = InfluxStore::new(&StoreSettings {
        timeout: Duration::from_millis(100),
        ..settings
    });
    let err = store
        .write_points(&[PersistablePoint {
            metric: "cpuUsage".to_string(),
            value: 1.0,
            unix_ms: 1,
        }])
        .await
        .unwrap_err();
    match err {
        MonitorError::Persistence(msg) => assert!(msg.contains("timed out"), "{msg}"),
        other => panic!("expected persistence error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_store_is_persistence_error() {
    let store = InfluxStore::new(&StoreSettings {
        host: "127.0.0.1".to_string(),
        port: 1,
        database: "snmp_data".to_string(),
        timeout: Duration::from_millis(500),
    });
    let err = store
        .query_range("cpuUsage", HistoryWindow::new(0, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Persistence(_)));
}
