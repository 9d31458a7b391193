//! Zone endpoint handlers (manual zone editor and read views).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use domain::models::zone::{
    CreateZoneRequest, ListZonesQuery, ListZonesResponse, UpdateZoneRequest,
};
use domain::models::{Zone, ZoneBounds, ZonePatch, ZoneSummary};

use crate::app::AppState;
use crate::error::ApiError;

/// Author recorded when a request does not name one.
pub const DEFAULT_AUTHOR: &str = "operator";

/// Fetches an active zone or fails with 404.
async fn find_active_zone(state: &AppState, zone_id: Uuid) -> Result<Zone, ApiError> {
    state
        .store
        .get(zone_id)
        .await?
        .filter(|z| z.active)
        .ok_or_else(|| ApiError::NotFound(format!("Zone {} not found", zone_id)))
}

/// Create a manual zone.
///
/// POST /api/v1/zones
pub async fn create_zone(
    State(state): State<AppState>,
    Json(request): Json<CreateZoneRequest>,
) -> Result<(StatusCode, Json<Zone>), ApiError> {
    request.validate()?;

    let zone = state
        .store
        .create(request.into_new_zone(DEFAULT_AUTHOR))
        .await?;

    info!(zone_id = %zone.id, risk_level = %zone.risk_level, "Manual zone created");
    Ok((StatusCode::CREATED, Json(zone)))
}

/// List active zones, optionally filtered by source.
///
/// GET /api/v1/zones?kind=all|manual|ai
pub async fn list_zones(
    State(state): State<AppState>,
    Query(query): Query<ListZonesQuery>,
) -> Json<ListZonesResponse> {
    let snapshot = state.store.subscribe().borrow().clone();
    let zones: Vec<Zone> = snapshot
        .iter()
        .filter(|z| query.kind.matches(z))
        .cloned()
        .collect();
    let total = zones.len();
    Json(ListZonesResponse { zones, total })
}

/// Get a zone by id, including soft-deleted ones.
///
/// GET /api/v1/zones/:zone_id
pub async fn get_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<Zone>, ApiError> {
    let zone = state
        .store
        .get(zone_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Zone {} not found", zone_id)))?;
    Ok(Json(zone))
}

/// Edit a manual zone. AI zones are owned by the prediction engine.
///
/// PATCH /api/v1/zones/:zone_id
pub async fn update_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
    Json(request): Json<UpdateZoneRequest>,
) -> Result<Json<Zone>, ApiError> {
    request.validate()?;

    let existing = find_active_zone(&state, zone_id).await?;
    if existing.is_ai_generated() {
        return Err(ApiError::Conflict(
            "AI-generated zones are managed by the prediction engine".to_string(),
        ));
    }

    let zone = state.store.update(zone_id, request.into()).await?;
    info!(zone_id = %zone.id, "Manual zone updated");
    Ok(Json(zone))
}

/// Soft-delete a zone.
///
/// DELETE /api/v1/zones/:zone_id
pub async fn delete_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    find_active_zone(&state, zone_id).await?;
    state.store.update(zone_id, ZonePatch::deactivate()).await?;
    info!(zone_id = %zone_id, "Zone deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Counts of active zones by level, source and category.
///
/// GET /api/v1/zones/summary
pub async fn zone_summary(State(state): State<AppState>) -> Json<ZoneSummary> {
    let snapshot = state.store.subscribe().borrow().clone();
    Json(ZoneSummary::from_zones(&snapshot))
}

/// Map framing for the active zones.
///
/// GET /api/v1/zones/bounds
pub async fn zone_bounds(State(state): State<AppState>) -> Json<ZoneBounds> {
    let snapshot = state.store.subscribe().borrow().clone();
    Json(ZoneBounds::from_zones(&snapshot))
}
