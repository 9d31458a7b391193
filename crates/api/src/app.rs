use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::models::{GeoPoint, PredictionSettings};
use domain::services::{PredictionService, ReconciliationEngine, ZoneStore};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{events, health, predictions, zones};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ZoneStore>,
    pub engine: Arc<ReconciliationEngine>,
    /// Current ML settings; writers replace the whole value.
    pub settings: Arc<watch::Sender<PredictionSettings>>,
    /// Last reported operator location.
    pub location: Arc<watch::Sender<Option<GeoPoint>>>,
    /// Human readable identity of the prediction backend.
    pub predictor: String,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ZoneStore>,
        predictor: Arc<dyn PredictionService>,
    ) -> Self {
        let predictor_name = predictor.describe();
        let engine = Arc::new(ReconciliationEngine::new(predictor, store.clone()));
        let (settings, _) = watch::channel(config.initial_prediction_settings());
        let (location, _) = watch::channel(Some(config.location.default_point()));

        Self {
            config: Arc::new(config),
            store,
            engine,
            settings: Arc::new(settings),
            location: Arc::new(location),
            predictor: predictor_name,
        }
    }

    /// Immutable copy of the current settings for one cycle.
    pub fn settings_snapshot(&self) -> PredictionSettings {
        self.settings.borrow().clone()
    }

    pub fn current_location(&self) -> Option<GeoPoint> {
        *self.location.borrow()
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let zone_routes = Router::new()
        .route("/api/v1/zones", get(zones::list_zones).post(zones::create_zone))
        .route("/api/v1/zones/events", get(events::zone_events))
        .route("/api/v1/zones/summary", get(zones::zone_summary))
        .route("/api/v1/zones/bounds", get(zones::zone_bounds))
        .route(
            "/api/v1/zones/:zone_id",
            get(zones::get_zone)
                .patch(zones::update_zone)
                .delete(zones::delete_zone),
        );

    let prediction_routes = Router::new()
        .route(
            "/api/v1/predictions",
            axum::routing::delete(predictions::clear_predictions),
        )
        .route(
            "/api/v1/predictions/generate",
            post(predictions::generate_predictions),
        )
        .route(
            "/api/v1/predictions/settings",
            get(predictions::get_settings).put(predictions::update_settings),
        )
        .route("/api/v1/predictions/location", put(predictions::report_location))
        .route("/api/v1/predictions/status", get(predictions::prediction_status));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(zone_routes)
        .merge(prediction_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config.security.cors_origins))
        .with_state(state)
}
