//! Integration tests for the manual zone editor and zone read views.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    create_manual_zone, empty_request, get_request, json_request, manual_zone_body,
    parse_response_body, setup,
};
use domain::models::{NewZone, PredictionType, RiskLevel, ZoneSource};
use domain::services::ZoneStore;
use serde_json::json;
use tower::ServiceExt;

async fn seed_ai_zone(store: &dyn ZoneStore, latitude: f64, longitude: f64) -> uuid::Uuid {
    store
        .create(NewZone {
            name: "Flood Risk Zone".to_string(),
            description: "Predicted flood".to_string(),
            latitude,
            longitude,
            radius_meters: 1000.0,
            risk_level: RiskLevel::High,
            source: ZoneSource::AiGenerated {
                prediction_type: PredictionType::Flood,
                confidence: 0.8,
                estimated_time: None,
            },
            created_by: "AI_SYSTEM".to_string(),
            expires_at: None,
        })
        .await
        .unwrap()
        .id
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_create_zone_success() {
    let ctx = setup();

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/zones",
            json!({
                "name": "Riverside",
                "latitude": 28.61,
                "longitude": 77.21,
                "radiusMeters": 500.0,
                "riskLevel": "CRITICAL"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = parse_response_body(response).await;
    assert!(body["id"].is_string());
    assert_eq!(body["name"], "Riverside");
    assert_eq!(body["riskLevel"], "EMERGENCY");
    assert_eq!(body["active"], true);
    assert_eq!(body["source"]["kind"], "MANUAL");
    assert_eq!(body["createdBy"], "operator");
}

#[tokio::test]
async fn test_create_zone_defaults_risk_level() {
    let ctx = setup();

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/zones",
            json!({
                "name": "Hillside",
                "latitude": 30.0,
                "longitude": 78.0,
                "radiusMeters": 200.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = parse_response_body(response).await;
    assert_eq!(body["riskLevel"], "LOW");
}

#[tokio::test]
async fn test_create_zone_invalid_latitude() {
    let ctx = setup();
    let mut body = manual_zone_body(0.0, 0.0);
    body["latitude"] = json!(91.0);

    let response = ctx
        .app()
        .oneshot(json_request(Method::POST, "/api/v1/zones", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert!(ctx.store.all().await.is_empty());
}

#[tokio::test]
async fn test_create_zone_rejects_zero_radius() {
    let ctx = setup();
    let mut body = manual_zone_body(10.0, 10.0);
    body["radiusMeters"] = json!(0.0);

    let response = ctx
        .app()
        .oneshot(json_request(Method::POST, "/api/v1/zones", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_zone_rejects_empty_name() {
    let ctx = setup();
    let mut body = manual_zone_body(10.0, 10.0);
    body["name"] = json!("");

    let response = ctx
        .app()
        .oneshot(json_request(Method::POST, "/api/v1/zones", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_zone_store_unavailable() {
    let ctx = setup();
    ctx.store.set_fail_writes(true);

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/zones",
            manual_zone_body(10.0, 10.0),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Listing and retrieval
// ============================================================================

#[tokio::test]
async fn test_list_zones_filters_by_kind() {
    let ctx = setup();
    create_manual_zone(&ctx, 28.0, 77.0).await;
    create_manual_zone(&ctx, 29.0, 78.0).await;
    seed_ai_zone(ctx.store.as_ref(), 27.0, 76.0).await;

    let all = parse_response_body(ctx.app().oneshot(get_request("/api/v1/zones")).await.unwrap()).await;
    assert_eq!(all["total"], 3);

    let manual = parse_response_body(
        ctx.app()
            .oneshot(get_request("/api/v1/zones?kind=manual"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(manual["total"], 2);

    let ai = parse_response_body(
        ctx.app()
            .oneshot(get_request("/api/v1/zones?kind=ai"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(ai["total"], 1);
    assert_eq!(ai["zones"][0]["source"]["kind"], "AI_GENERATED");
    assert_eq!(ai["zones"][0]["source"]["predictionType"], "flood");
}

#[tokio::test]
async fn test_get_zone_not_found() {
    let ctx = setup();

    let response = ctx
        .app()
        .oneshot(get_request(&format!("/api/v1/zones/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "not_found");
}

// ============================================================================
// Editing and deletion
// ============================================================================

#[tokio::test]
async fn test_update_zone_changes_only_given_fields() {
    let ctx = setup();
    let created = create_manual_zone(&ctx, 28.0, 77.0).await;
    let id = created["id"].as_str().unwrap();

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/zones/{}", id),
            json!({ "riskLevel": "MODERATE", "radiusMeters": 1200.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["id"], id);
    assert_eq!(body["riskLevel"], "MODERATE");
    assert_eq!(body["radiusMeters"], 1200.0);
    assert_eq!(body["name"], created["name"]);
    assert_eq!(body["latitude"], 28.0);
}

#[tokio::test]
async fn test_update_zone_rejects_invalid_longitude() {
    let ctx = setup();
    let created = create_manual_zone(&ctx, 28.0, 77.0).await;
    let id = created["id"].as_str().unwrap();

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/zones/{}", id),
            json!({ "longitude": 181.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_ai_zone_is_conflict() {
    let ctx = setup();
    let id = seed_ai_zone(ctx.store.as_ref(), 27.0, 76.0).await;

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/zones/{}", id),
            json!({ "name": "Renamed" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_zone_soft_deletes() {
    let ctx = setup();
    let created = create_manual_zone(&ctx, 28.0, 77.0).await;
    let id = created["id"].as_str().unwrap();

    let response = ctx
        .app()
        .oneshot(empty_request(Method::DELETE, &format!("/api/v1/zones/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Gone from the live view.
    let list = parse_response_body(ctx.app().oneshot(get_request("/api/v1/zones")).await.unwrap()).await;
    assert_eq!(list["total"], 0);

    // Still retrievable by id, marked inactive.
    let response = ctx
        .app()
        .oneshot(get_request(&format!("/api/v1/zones/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["active"], false);
    assert!(body["deletedAt"].is_string());

    // A second delete finds nothing active.
    let response = ctx
        .app()
        .oneshot(empty_request(Method::DELETE, &format!("/api/v1/zones/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_deleted_zone_not_found() {
    let ctx = setup();
    let created = create_manual_zone(&ctx, 28.0, 77.0).await;
    let id = created["id"].as_str().unwrap();

    ctx.app()
        .oneshot(empty_request(Method::DELETE, &format!("/api/v1/zones/{}", id)))
        .await
        .unwrap();

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/zones/{}", id),
            json!({ "name": "Back again" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_ai_zone_allowed() {
    let ctx = setup();
    let id = seed_ai_zone(ctx.store.as_ref(), 27.0, 76.0).await;

    let response = ctx
        .app()
        .oneshot(empty_request(Method::DELETE, &format!("/api/v1/zones/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(ctx.store.subscribe().borrow().is_empty());
}

// ============================================================================
// Summary and bounds
// ============================================================================

#[tokio::test]
async fn test_summary_counts_active_zones() {
    let ctx = setup();
    create_manual_zone(&ctx, 28.0, 77.0).await;
    let deleted = create_manual_zone(&ctx, 29.0, 78.0).await;
    seed_ai_zone(ctx.store.as_ref(), 27.0, 76.0).await;

    ctx.app()
        .oneshot(empty_request(
            Method::DELETE,
            &format!("/api/v1/zones/{}", deleted["id"].as_str().unwrap()),
        ))
        .await
        .unwrap();

    let body = parse_response_body(
        ctx.app()
            .oneshot(get_request("/api/v1/zones/summary"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["manual"], 1);
    assert_eq!(body["aiGenerated"], 1);
    assert_eq!(body["byRiskLevel"]["HIGH"], 2);
    assert_eq!(body["byPredictionType"]["flood"], 1);
}

#[tokio::test]
async fn test_bounds_default_when_empty() {
    let ctx = setup();

    let body = parse_response_body(
        ctx.app()
            .oneshot(get_request("/api/v1/zones/bounds"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["isDefault"], true);
    assert_eq!(body["zoneCount"], 0);
}

#[tokio::test]
async fn test_bounds_enclose_zones() {
    let ctx = setup();
    create_manual_zone(&ctx, 20.0, 70.0).await;
    create_manual_zone(&ctx, 30.0, 80.0).await;

    let body = parse_response_body(
        ctx.app()
            .oneshot(get_request("/api/v1/zones/bounds"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["isDefault"], false);
    assert_eq!(body["zoneCount"], 2);
    let center = &body["center"];
    assert!((center["latitude"].as_f64().unwrap() - 25.0).abs() < 0.1);
    assert!((center["longitude"].as_f64().unwrap() - 75.0).abs() < 0.1);
}
