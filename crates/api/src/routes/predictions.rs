//! Prediction control endpoint handlers.

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;
use validator::{Validate, ValidationErrors};

use domain::models::{
    ClearReport, CycleReport, GeoPoint, Notice, PredictionSettings,
    UpdatePredictionSettingsRequest,
};

use crate::app::AppState;
use crate::error::{ApiError, NoticeBody};
use crate::middleware::metrics::record_cycle_result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResponse {
    pub report: CycleReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub location: GeoPoint,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionStatusResponse {
    pub cycle_running: bool,
    pub last_report: Option<CycleReport>,
    pub location: Option<GeoPoint>,
    pub active_predicted_zones: usize,
    pub settings: PredictionSettings,
    pub predictor: String,
}

/// Parses the optional `{latitude, longitude}` body of a generate request.
fn parse_center(body: &Bytes) -> Result<Option<GeoPoint>, ApiError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    serde_json::from_slice::<GeoPoint>(body)
        .map(Some)
        .map_err(|e| ApiError::validation(format!("Invalid location body: {}", e)))
}

/// Run a prediction cycle now.
///
/// POST /api/v1/predictions/generate
///
/// Uses the body location when given, otherwise the last reported operator
/// location. Returns 409 while another cycle is running. A started cycle
/// runs to completion even if the client goes away.
pub async fn generate_predictions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NoticeBody<CycleResponse>>, ApiError> {
    let center = parse_center(&body)?.or_else(|| state.current_location());
    let settings = state.settings_snapshot();

    // The cycle runs on its own task so a dropped request cannot cut it short.
    let engine = state.engine.clone();
    let cycle = tokio::spawn(async move {
        let result = engine.run_prediction_cycle(center, &settings).await;
        record_cycle_result(&result);
        result
    });
    let report = cycle
        .await
        .map_err(|e| ApiError::Internal(format!("Prediction cycle task failed: {}", e)))??;

    Ok(Json(NoticeBody::new(report.notice(), CycleResponse { report })))
}

/// Deactivate every AI-generated zone.
///
/// DELETE /api/v1/predictions
pub async fn clear_predictions(
    State(state): State<AppState>,
) -> Result<Json<NoticeBody<ClearReport>>, ApiError> {
    let report = state.engine.clear_all_predicted().await?;
    let notice = if report.cleared == 0 {
        Notice::info("No predicted zones to clear")
    } else {
        Notice::success(format!("Cleared {} predicted zones", report.cleared))
    };
    Ok(Json(NoticeBody::new(notice, report)))
}

/// Merges `request` into the current settings under the channel lock.
/// Subscribers are only notified when a valid update changes something.
fn apply_settings_update(
    settings: &watch::Sender<PredictionSettings>,
    request: &UpdatePredictionSettingsRequest,
) -> Result<PredictionSettings, ValidationErrors> {
    let mut outcome = None;
    settings.send_if_modified(|current| {
        let next = current.merged(request);
        if let Err(errors) = next.validate() {
            outcome = Some(Err(errors));
            return false;
        }
        let changed = *current != next;
        *current = next.clone();
        outcome = Some(Ok(next));
        changed
    });
    outcome.unwrap_or_else(|| Ok(settings.borrow().clone()))
}

/// GET /api/v1/predictions/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<PredictionSettings> {
    Json(state.settings_snapshot())
}

/// Partially update the ML settings. The merged value is validated as a
/// whole and replaces the previous one.
///
/// PUT /api/v1/predictions/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdatePredictionSettingsRequest>,
) -> Result<Json<PredictionSettings>, ApiError> {
    let next = apply_settings_update(&state.settings, &request)?;
    info!(
        enable_auto_predict = next.enable_auto_predict,
        update_interval_minutes = next.update_interval_minutes,
        confidence_threshold = next.confidence_threshold,
        "Prediction settings updated"
    );
    Ok(Json(next))
}

/// Report the operator's current location.
///
/// PUT /api/v1/predictions/location
pub async fn report_location(
    State(state): State<AppState>,
    Json(location): Json<GeoPoint>,
) -> Result<Json<LocationResponse>, ApiError> {
    location.validate()?;
    state.location.send_replace(Some(location));
    info!(
        latitude = location.latitude,
        longitude = location.longitude,
        "Operator location updated"
    );
    Ok(Json(LocationResponse { location }))
}

/// GET /api/v1/predictions/status
pub async fn prediction_status(State(state): State<AppState>) -> Json<PredictionStatusResponse> {
    Json(PredictionStatusResponse {
        cycle_running: state.engine.is_cycle_running(),
        last_report: state.engine.last_report().await,
        location: state.current_location(),
        active_predicted_zones: state.engine.active_predicted_zones().len(),
        settings: state.settings_snapshot(),
        predictor: state.predictor.clone(),
    })
}
