//! Prediction service abstraction.
//!
//! The prediction model is opaque: given a category query it returns scored
//! candidate zones. The HTTP implementation lives in the api crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::prediction::{PredictionRequest, PredictionResponse};
use crate::models::zone::PredictionType;

/// Errors from a single category query.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictionError {
    #[error("Prediction service refused the connection: {0}")]
    ConnectionRefused(String),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Prediction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from prediction service: {0}")]
    InvalidResponse(String),

    #[error("Prediction service reported an unsuccessful prediction")]
    Unsuccessful,

    #[error("Prediction request failed: {0}")]
    Transport(String),
}

impl PredictionError {
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, PredictionError::ConnectionRefused(_))
    }
}

#[async_trait::async_trait]
pub trait PredictionService: Send + Sync {
    /// Run one category query.
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, PredictionError>;

    /// Base location of the service, for health reporting.
    fn describe(&self) -> String {
        "prediction-service".to_string()
    }
}

/// Scripted behaviour of the mock for one category.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Respond(PredictionResponse),
    Fail(PredictionError),
    /// Respond after a delay (used to exercise timeouts and single-flight).
    Delayed(Duration, PredictionResponse),
}

/// Mock prediction service for development and testing.
///
/// Categories without a scripted behaviour return an empty successful
/// response.
#[derive(Clone, Default)]
pub struct MockPredictionService {
    behaviors: Arc<RwLock<HashMap<PredictionType, MockBehavior>>>,
    calls: Arc<AtomicUsize>,
}

impl MockPredictionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a category's behaviour (builder form).
    pub fn with(self, prediction_type: PredictionType, behavior: MockBehavior) -> Self {
        if let Ok(mut map) = self.behaviors.try_write() {
            map.insert(prediction_type, behavior);
        }
        self
    }

    /// Replace a category's behaviour.
    pub async fn set(&self, prediction_type: PredictionType, behavior: MockBehavior) {
        self.behaviors.write().await.insert(prediction_type, behavior);
    }

    /// Number of `predict` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PredictionService for MockPredictionService {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .read()
            .await
            .get(&request.prediction_type())
            .cloned();

        match behavior {
            None => Ok(PredictionResponse::with_zones(Vec::new())),
            Some(MockBehavior::Respond(response)) => Ok(response),
            Some(MockBehavior::Fail(err)) => Err(err),
            Some(MockBehavior::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
