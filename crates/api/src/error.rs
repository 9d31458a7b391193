use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain::models::Notice;
use domain::services::{ReconciliationError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Engine failure rendered with its operator notice.
    #[error("{status}: {}", .notice.message)]
    Prediction { status: StatusCode, notice: Notice },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<ValidationDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<Notice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details, notice) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, Vec::new(), None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, Vec::new(), None),
            ApiError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                details,
                None,
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    Vec::new(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                Vec::new(),
                None,
            ),
            ApiError::Prediction { status, notice } => {
                let code = match status {
                    StatusCode::BAD_REQUEST => "invalid_input",
                    StatusCode::CONFLICT => "cycle_in_progress",
                    StatusCode::SERVICE_UNAVAILABLE => "service_unavailable",
                    _ => "prediction_error",
                };
                (status, code, notice.message.clone(), Vec::new(), Some(notice))
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
            notice,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(format!("Zone {} not found", id)),
            StoreError::Invalid(msg) => ApiError::validation(msg),
            StoreError::Unavailable(msg) => ApiError::ServiceUnavailable(msg),
            StoreError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<ReconciliationError> for ApiError {
    fn from(err: ReconciliationError) -> Self {
        let status = match &err {
            ReconciliationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ReconciliationError::CycleInProgress => StatusCode::CONFLICT,
            ReconciliationError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ReconciliationError::ClearIncomplete { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ReconciliationError::Persistence(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ReconciliationError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "Prediction operation failed");
        }
        ApiError::Prediction {
            status,
            notice: err.notice(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation { message, details }
    }
}

/// Body returned by operations whose outcome is an operator notice.
#[derive(Debug, Serialize)]
pub struct NoticeBody<T: Serialize> {
    pub notice: Notice,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> NoticeBody<T> {
    pub fn new(notice: Notice, data: T) -> Self {
        Self { notice, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{CategoryFailure, PredictionType};
    use domain::services::UnavailableReason;
    use uuid::Uuid;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_display_uses_message() {
        let err = ApiError::validation("Invalid location body");
        assert_eq!(err.to_string(), "Validation error: Invalid location body");
    }

    #[test]
    fn test_store_not_found_is_404() {
        let response = ApiError::from(StoreError::NotFound(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_invalid_is_400() {
        let response = ApiError::from(StoreError::Invalid("radius".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_backend_is_500() {
        let response = ApiError::from(StoreError::Backend("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_cycle_in_progress_is_409_with_notice() {
        let response = ApiError::from(ReconciliationError::CycleInProgress).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "cycle_in_progress");
        assert_eq!(body["notice"]["severity"], "info");
    }

    #[tokio::test]
    async fn test_service_unavailable_is_503() {
        let err = ReconciliationError::ServiceUnavailable {
            reason: UnavailableReason::ConnectionRefused,
            failures: vec![CategoryFailure {
                prediction_type: PredictionType::Flood,
                message: "refused".into(),
                connection_refused: true,
            }],
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["notice"]["severity"], "error");
        assert!(body["message"].as_str().unwrap().contains("offline"));
    }

    #[test]
    fn test_invalid_input_is_400() {
        let response =
            ApiError::from(ReconciliationError::InvalidInput("no location".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_validation_errors_carry_details() {
        use validator::Validate;
        let request = domain::models::zone::CreateZoneRequest {
            name: String::new(),
            description: String::new(),
            latitude: 100.0,
            longitude: 0.0,
            radius_meters: 10.0,
            risk_level: domain::models::RiskLevel::Low,
            created_by: None,
        };
        let errors = request.validate().unwrap_err();
        let response = ApiError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"latitude"));
    }
}
