//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub zone_store: StoreHealth,
    pub prediction_service: PredictionServiceHealth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreHealth {
    pub backend: String,
    pub connected: bool,
    pub latency_ms: Option<u64>,
    pub active_zones: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PredictionServiceHealth {
    pub endpoint: String,
    pub configured: bool,
    pub cycle_running: bool,
}

/// Simple status response for liveness/readiness checks.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint.
///
/// GET /api/health
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();
    let connected = state.store.ping().await.is_ok();
    let latency_ms = start.elapsed().as_millis() as u64;

    let response = HealthResponse {
        status: if connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        zone_store: StoreHealth {
            backend: format!("{:?}", state.config.storage.backend).to_lowercase(),
            connected,
            latency_ms: connected.then_some(latency_ms),
            active_zones: state.store.subscribe().borrow().len(),
        },
        prediction_service: PredictionServiceHealth {
            endpoint: state.predictor.clone(),
            configured: !state.config.prediction_service.base_url.trim().is_empty(),
            cycle_running: state.engine.is_cycle_running(),
        },
    };

    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Liveness endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness endpoint.
///
/// Returns 200 OK if the zone store is reachable.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(StatusResponse {
            status: "ready".to_string(),
        })),
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
