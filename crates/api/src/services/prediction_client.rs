//! HTTP client for the external prediction service.
//!
//! Each hazard category is a JSON POST to its own endpoint under the
//! configured base URL. Transport failures are classified so the engine can
//! tell a refused connection from a timeout or a bad response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use domain::models::{PredictionRequest, PredictionResponse};
use domain::services::{PredictionError, PredictionService};

use crate::config::PredictionServiceConfig;

/// Longest error body kept in `PredictionError::Status`.
const MAX_ERROR_BODY: usize = 512;

pub struct HttpPredictionClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpPredictionClient {
    pub fn new(config: &PredictionServiceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn classify(&self, err: reqwest::Error) -> PredictionError {
        if err.is_timeout() {
            PredictionError::Timeout(self.timeout_secs)
        } else if err.is_connect() {
            PredictionError::ConnectionRefused(self.base_url.clone())
        } else if err.is_decode() {
            PredictionError::InvalidResponse(err.to_string())
        } else {
            PredictionError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl PredictionService for HttpPredictionClient {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, PredictionError> {
        let url = self.url(request.endpoint());
        debug!(url = %url, prediction_type = %request.prediction_type(), "Requesting predictions");

        let response = self
            .client
            .post(&url)
            .json(&request.body())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map(|(i, _)| i)
                    .unwrap_or(body.len()),
            );
            return Err(PredictionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<PredictionResponse>()
            .await
            .map_err(|e| self.classify(e))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
