use crate::config::SharedRuntimeConfig;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError};
use tracing::info;

/// State for the admin API.
#[derive(Clone)]
pub struct AdminAppState {
    pub runtime_config: SharedRuntimeConfig,
    /// Required bearer token for PUT /api/admin/simulator. None = unrestricted.
    pub admin_token: Option<String>,
}

/// Partial update body. Only fields present in the request are changed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfigUpdate {
    pub simulator_enabled: Option<bool>,
    pub alarm_probability: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn create_admin_router(state: AdminAppState) -> Router {
    Router::new()
        .route("/api/admin/simulator", get(get_config).put(put_config))
        .with_state(Arc::new(state))
}

/// GET /api/admin/simulator returns the current RuntimeConfig.
async fn get_config(State(state): State<Arc<AdminAppState>>) -> Response {
    let cfg = state
        .runtime_config
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Json(cfg).into_response()
}

/// PUT /api/admin/simulator applies a partial update. Requires the
/// BREWTWIN_ADMIN_TOKEN bearer when one is configured.
async fn put_config(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
    Json(update): Json<RuntimeConfigUpdate>,
) -> Response {
    if !validate_admin_token(&headers, &state.admin_token) {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    if let Some(p) = update.alarm_probability {
        if !(0.0..=1.0).contains(&p) {
            return error_response(
                StatusCode::BAD_REQUEST,
                "alarmProbability must be between 0 and 1",
            );
        }
    }

    let mut cfg = state
        .runtime_config
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(v) = update.simulator_enabled {
        cfg.simulator_enabled = v;
    }
    if let Some(v) = update.alarm_probability {
        cfg.alarm_probability = v;
    }

    info!(
        simulator_enabled = cfg.simulator_enabled,
        alarm_probability = cfg.alarm_probability,
        "Simulator runtime config updated"
    );

    Json(cfg.clone()).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Returns true if the bearer token in `Authorization` matches the expected admin token.
/// Returns true (no restriction) when `expected` is None.
fn validate_admin_token(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected_token) = expected else {
        return true;
    };

    let Some(token) = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return false;
    };

    token == expected_token
}
