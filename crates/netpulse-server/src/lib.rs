//! HTTP API for netpulse.
//!
//! Serves the current device snapshot, aligned CPU/RAM history, the device
//! registry and process status as JSON. Handlers only call into
//! [`MonitorService`]; no pipeline logic lives here.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::get,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use netpulse_core::{
    DeviceRecord, FieldValue, HistoryPoint, MonitorService, RawResult, StatsReport,
};

/// Shared server state.
struct AppState {
    service: Arc<MonitorService>,
}

#[derive(Deserialize)]
struct HistoryParams {
    /// Window length in hours (1-720, default 24).
    hours: Option<u32>,
    /// `asc` (default) or `desc`.
    order: Option<String>,
}

#[derive(Serialize)]
struct DevicesResponse {
    target: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    devices: Vec<DeviceRecord>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    target: String,
    database: String,
    scheduler: StatsReport,
}

async fn handle_snapshot(
    State(state): State<Arc<AppState>>,
) -> Json<std::collections::BTreeMap<String, FieldValue>> {
    let snapshot = state.service.current_snapshot().await;
    Json(snapshot.display_map())
}

async fn handle_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<HistoryPoint>> {
    let history = state.service.history(params.hours.unwrap_or(24)).await;
    let points = match params.order.as_deref() {
        Some("desc") => history.newest_first(),
        _ => history.iter().collect(),
    };
    Json(points)
}

async fn handle_devices(State(state): State<Arc<AppState>>) -> Json<DevicesResponse> {
    let (status, detail) = match state.service.probe().await {
        RawResult::Ok(_) => ("connected", None),
        RawResult::Failed { kind, detail } => {
            log::warn!("device probe failed: {kind}: {detail}");
            ("failed", Some(format!("{kind}: {detail}")))
        }
    };
    Json(DevicesResponse {
        target: state.service.target(),
        status,
        detail,
        devices: state.service.devices(),
    })
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        version: netpulse_core::VERSION,
        target: state.service.target(),
        database: state.service.store().database(),
        scheduler: state.service.stats().report(),
    })
}

/// Build the axum router.
pub fn build_router(service: Arc<MonitorService>) -> Router {
    let state = Arc::new(AppState { service });

    Router::new()
        .route("/", get(handle_snapshot))
        .route("/snmp", get(handle_snapshot))
        .route("/api/history", get(handle_history))
        .route("/api/devices", get(handle_devices))
        .route("/api/status", get(handle_status))
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn run_server(
    service: Arc<MonitorService>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = build_router(service);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("HTTP API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
