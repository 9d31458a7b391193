//! Prometheus metrics: HTTP middleware, prediction counters and export.

use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use domain::models::CycleReport;
use domain::services::ReconciliationError;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Middleware to record HTTP request metrics.
///
/// Records the following metrics:
/// - `http_requests_total`: Counter with labels (method, path, status)
/// - `http_request_duration_seconds`: Histogram with labels (method, path)
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

/// Records the outcome of a prediction cycle.
pub fn record_cycle_result(result: &Result<CycleReport, ReconciliationError>) {
    let outcome = match result {
        Ok(report) if report.is_no_significant_risk() => "no_significant_risk",
        Ok(report) if report.category_failures.is_empty() && report.persistence_failures.is_empty() => {
            "success"
        }
        Ok(_) => "partial",
        Err(ReconciliationError::CycleInProgress) => "skipped",
        Err(ReconciliationError::ServiceUnavailable { .. }) => "unavailable",
        Err(ReconciliationError::InvalidInput(_)) => "invalid_input",
        Err(_) => "error",
    };
    counter!("prediction_cycles_total", "outcome" => outcome).increment(1);

    if let Ok(report) = result {
        counter!("predicted_zones_upserted_total", "action" => "created")
            .increment(report.created.len() as u64);
        counter!("predicted_zones_upserted_total", "action" => "updated")
            .increment(report.updated.len() as u64);
        for failure in &report.category_failures {
            counter!(
                "prediction_category_failures_total",
                "category" => failure.prediction_type.as_str()
            )
            .increment(1);
        }
        histogram!("prediction_cycle_duration_seconds").record(
            (report.finished_at - report.started_at)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
        );
    }
    if let Err(ReconciliationError::ServiceUnavailable { failures, .. }) = result {
        for failure in failures {
            counter!(
                "prediction_category_failures_total",
                "category" => failure.prediction_type.as_str()
            )
            .increment(1);
        }
    }
}

/// Handler for /metrics endpoint that returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Installs the global Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[
            0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0,
        ])?
        .install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}
