use crate::cache::{DeviceSnapshot, PitSnapshot};
use crate::dashboard::{
    DashboardOverview, DashboardService, DashboardStats, RealtimeMetrics, SystemInfo,
};
use crate::entity::EntityId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// Shared state for the dashboard API
pub struct DashboardAppState {
    pub dashboard: Arc<DashboardService>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create dashboard API router
pub fn create_dashboard_router(state: Arc<DashboardAppState>) -> Router {
    Router::new()
        .route("/api/v1/dashboard/stats", get(get_stats))
        .route("/api/v1/dashboard/overview", get(get_overview))
        .route("/api/v1/dashboard/heatmap", get(get_heatmap))
        .route("/api/v1/dashboard/realtime-metrics", get(get_realtime_metrics))
        .route("/api/v1/dashboard/system-info", get(get_system_info))
        .route("/api/v1/dashboard/pits/:id", get(get_pit))
        .route("/api/v1/dashboard/devices", get(list_devices))
        .route("/api/v1/dashboard/devices/:id", get(get_device))
        .with_state(state)
}

/// GET /api/v1/dashboard/stats
async fn get_stats(
    State(state): State<Arc<DashboardAppState>>,
) -> Result<Json<DashboardStats>, DashboardError> {
    let stats = state.dashboard.stats().map_err(DashboardError::Storage)?;
    Ok(Json(stats))
}

/// GET /api/v1/dashboard/overview - Hourly alarm counts for the last 24 hours
async fn get_overview(
    State(state): State<Arc<DashboardAppState>>,
) -> Result<Json<DashboardOverview>, DashboardError> {
    let overview = state
        .dashboard
        .overview(Utc::now())
        .map_err(DashboardError::Storage)?;
    Ok(Json(overview))
}

/// GET /api/v1/dashboard/heatmap - Cached pit cells, store fallback before the first tick
async fn get_heatmap(
    State(state): State<Arc<DashboardAppState>>,
) -> Result<Json<Vec<PitSnapshot>>, DashboardError> {
    let cells = state.dashboard.heatmap().map_err(DashboardError::Storage)?;
    Ok(Json(cells))
}

/// GET /api/v1/dashboard/realtime-metrics
async fn get_realtime_metrics(
    State(state): State<Arc<DashboardAppState>>,
) -> Result<Json<RealtimeMetrics>, DashboardError> {
    let metrics = state
        .dashboard
        .realtime_metrics()
        .map_err(DashboardError::Storage)?;
    Ok(Json(metrics))
}

/// GET /api/v1/dashboard/system-info
async fn get_system_info(State(state): State<Arc<DashboardAppState>>) -> Json<SystemInfo> {
    Json(state.dashboard.system_info())
}

/// GET /api/v1/dashboard/pits/:id - Last cached snapshot for one pit
async fn get_pit(
    State(state): State<Arc<DashboardAppState>>,
    Path(id): Path<EntityId>,
) -> Result<Json<PitSnapshot>, DashboardError> {
    state
        .dashboard
        .pit_snapshot(id)
        .map(Json)
        .ok_or(DashboardError::NotFound("Pit"))
}

/// GET /api/v1/dashboard/devices
async fn list_devices(State(state): State<Arc<DashboardAppState>>) -> Json<Vec<DeviceSnapshot>> {
    Json(state.dashboard.device_snapshots())
}

/// GET /api/v1/dashboard/devices/:id
async fn get_device(
    State(state): State<Arc<DashboardAppState>>,
    Path(id): Path<EntityId>,
) -> Result<Json<DeviceSnapshot>, DashboardError> {
    state
        .dashboard
        .device_snapshot(id)
        .map(Json)
        .ok_or(DashboardError::NotFound("Device"))
}

/// Dashboard error types
#[derive(Debug)]
enum DashboardError {
    NotFound(&'static str),
    Storage(anyhow::Error),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            DashboardError::NotFound(kind) => {
                (StatusCode::NOT_FOUND, format!("{} not found", kind))
            }
            DashboardError::Storage(e) => {
                error!(error = %e, "Dashboard query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage unavailable".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}
