//! Tunable prediction settings.
//!
//! A value of this type is immutable once handed to a cycle; updates replace
//! the whole value.

use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_enable_auto_predict() -> bool {
    true
}
fn default_prediction_radius_meters() -> f64 {
    500_000.0
}
fn default_update_interval_minutes() -> u64 {
    30
}
fn default_confidence_threshold() -> f64 {
    0.6
}
fn default_time_horizon_hours() -> u32 {
    24
}
fn default_flood_prediction_hours() -> u32 {
    48
}
fn default_forecast_days() -> u32 {
    5
}
fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PredictionSettings {
    /// Whether the periodic timer triggers cycles.
    #[serde(default = "default_enable_auto_predict")]
    pub enable_auto_predict: bool,

    #[serde(default = "default_prediction_radius_meters")]
    #[validate(custom(function = "shared::validation::validate_radius"))]
    pub prediction_radius_meters: f64,

    /// Period of the auto-prediction timer.
    #[serde(default = "default_update_interval_minutes")]
    #[validate(range(min = 1, max = 1440, message = "Update interval must be 1-1440 minutes"))]
    pub update_interval_minutes: u64,

    /// Minimum confidence a candidate needs (inclusive).
    #[serde(default = "default_confidence_threshold")]
    #[validate(custom(function = "shared::validation::validate_confidence"))]
    pub confidence_threshold: f64,

    /// Landslide lookahead.
    #[serde(default = "default_time_horizon_hours")]
    #[validate(range(min = 1, max = 720, message = "Time horizon must be 1-720 hours"))]
    pub time_horizon_hours: u32,

    /// Flood lookahead.
    #[serde(default = "default_flood_prediction_hours")]
    #[validate(range(min = 1, max = 720, message = "Flood prediction window must be 1-720 hours"))]
    pub flood_prediction_hours: u32,

    /// Weather lookahead.
    #[serde(default = "default_forecast_days")]
    #[validate(range(min = 1, max = 16, message = "Forecast must be 1-16 days"))]
    pub forecast_days: u32,

    /// Per-category request timeout; a timed out category is not retried.
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300, message = "Request timeout must be 1-300 seconds"))]
    pub request_timeout_secs: u64,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            enable_auto_predict: default_enable_auto_predict(),
            prediction_radius_meters: default_prediction_radius_meters(),
            update_interval_minutes: default_update_interval_minutes(),
            confidence_threshold: default_confidence_threshold(),
            time_horizon_hours: default_time_horizon_hours(),
            flood_prediction_hours: default_flood_prediction_hours(),
            forecast_days: default_forecast_days(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PredictionSettings {
    pub fn prediction_radius_km(&self) -> f64 {
        self.prediction_radius_meters / 1000.0
    }

    /// Returns a copy with the provided fields replaced.
    pub fn merged(&self, update: &UpdatePredictionSettingsRequest) -> Self {
        let mut next = self.clone();
        if let Some(v) = update.enable_auto_predict {
            next.enable_auto_predict = v;
        }
        if let Some(v) = update.prediction_radius_meters {
            next.prediction_radius_meters = v;
        }
        if let Some(v) = update.update_interval_minutes {
            next.update_interval_minutes = v;
        }
        if let Some(v) = update.confidence_threshold {
            next.confidence_threshold = v;
        }
        if let Some(v) = update.time_horizon_hours {
            next.time_horizon_hours = v;
        }
        if let Some(v) = update.flood_prediction_hours {
            next.flood_prediction_hours = v;
        }
        if let Some(v) = update.forecast_days {
            next.forecast_days = v;
        }
        if let Some(v) = update.request_timeout_secs {
            next.request_timeout_secs = v;
        }
        next
    }
}

/// Partial settings update. The merged result is validated as a whole.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePredictionSettingsRequest {
    pub enable_auto_predict: Option<bool>,
    pub prediction_radius_meters: Option<f64>,
    pub update_interval_minutes: Option<u64>,
    pub confidence_threshold: Option<f64>,
    pub time_horizon_hours: Option<u32>,
    pub flood_prediction_hours: Option<u32>,
    pub forecast_days: Option<u32>,
    pub request_timeout_secs: Option<u64>,
}
