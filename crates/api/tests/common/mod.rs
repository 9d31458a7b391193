//! Common test utilities for integration tests.
//!
//! The app is wired against the in-memory zone store and the scripted mock
//! prediction service, so these tests need no external services.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use fake::faker::address::en::CityName;
use fake::Fake;
use serde_json::{json, Value};

use domain::services::{InMemoryZoneStore, MockPredictionService};
use riskzone_api::{
    app::{create_app, AppState},
    config::Config,
};

/// Handles to the pieces behind a test app.
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<InMemoryZoneStore>,
    pub predictor: MockPredictionService,
}

impl TestContext {
    /// A fresh router over the shared state. `oneshot` consumes routers, so
    /// tests call this once per request.
    pub fn app(&self) -> Router {
        create_app(self.state.clone())
    }
}

/// Test configuration: embedded defaults with the memory backend.
pub fn test_config() -> Config {
    Config::load_for_test(&[]).expect("test config should load")
}

pub fn setup() -> TestContext {
    setup_with(MockPredictionService::new())
}

pub fn setup_with(predictor: MockPredictionService) -> TestContext {
    let store = Arc::new(InMemoryZoneStore::new());
    let state = AppState::new(test_config(), store.clone(), Arc::new(predictor.clone()));
    TestContext {
        state,
        store,
        predictor,
    }
}

/// A valid manual zone body with a random city name.
pub fn manual_zone_body(latitude: f64, longitude: f64) -> Value {
    let name: String = CityName().fake();
    json!({
        "name": format!("{} flood plain", name),
        "description": "Reported by field team",
        "latitude": latitude,
        "longitude": longitude,
        "radiusMeters": 750.0,
        "riskLevel": "HIGH"
    })
}

/// Build a request with a JSON body.
pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a request without a body.
pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    empty_request(Method::GET, uri)
}

/// Parse response body as JSON.
pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// Create a manual zone through the API and return its JSON.
pub async fn create_manual_zone(ctx: &TestContext, latitude: f64, longitude: f64) -> Value {
    use tower::ServiceExt;

    let response = ctx
        .app()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/zones",
            manual_zone_body(latitude, longitude),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    parse_response_body(response).await
}
