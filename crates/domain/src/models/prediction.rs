//! Prediction service wire types and per-cycle reporting types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::models::geo::{BoundingBox, GeoPoint};
use crate::models::zone::{PredictionType, RiskLevel};

/// Radius assigned to predicted zones when the service omits one.
pub const DEFAULT_PREDICTED_RADIUS_METERS: f64 = 500.0;

/// Body of `POST /predict/landslide`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandslideQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in meters.
    pub radius: f64,
    pub time_horizon: u32,
}

/// Body of `POST /predict/flood`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodQuery {
    pub area_bounds: BoundingBox,
    pub prediction_hours: u32,
}

/// Body of `POST /predict/weather_risk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub forecast_days: u32,
    /// Search radius in kilometres.
    pub radius: f64,
}

/// One hazard category query.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionRequest {
    Landslide(LandslideQuery),
    Flood(FloodQuery),
    Weather(WeatherQuery),
}

impl PredictionRequest {
    pub fn prediction_type(&self) -> PredictionType {
        match self {
            PredictionRequest::Landslide(_) => PredictionType::Landslide,
            PredictionRequest::Flood(_) => PredictionType::Flood,
            PredictionRequest::Weather(_) => PredictionType::Weather,
        }
    }

    /// Path of the prediction service endpoint for this category.
    pub fn endpoint(&self) -> &'static str {
        match self {
            PredictionRequest::Landslide(_) => "/predict/landslide",
            PredictionRequest::Flood(_) => "/predict/flood",
            PredictionRequest::Weather(_) => "/predict/weather_risk",
        }
    }

    /// JSON body sent to the endpoint.
    pub fn body(&self) -> serde_json::Value {
        let body = match self {
            PredictionRequest::Landslide(q) => serde_json::to_value(q),
            PredictionRequest::Flood(q) => serde_json::to_value(q),
            PredictionRequest::Weather(q) => serde_json::to_value(q),
        };
        body.unwrap_or(serde_json::Value::Null)
    }
}

/// Response shape shared by every prediction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    /// Malformed entries are dropped individually.
    #[serde(default, deserialize_with = "skip_malformed_zones")]
    pub predicted_zones: Vec<PredictedZone>,
}

fn skip_malformed_zones<'de, D>(deserializer: D) -> Result<Vec<PredictedZone>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(zone) => Some(zone),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed predicted zone");
                None
            }
        })
        .collect())
}

impl PredictionResponse {
    pub fn with_zones(predicted_zones: Vec<PredictedZone>) -> Self {
        Self {
            success: true,
            predicted_zones,
        }
    }
}

/// A scored candidate zone as returned by the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedZone {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "riskLevel")]
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    pub confidence: f64,
    #[serde(
        default,
        rename = "estimatedTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_time: Option<String>,
}

impl PredictedZone {
    pub fn new(latitude: f64, longitude: f64, risk_level: RiskLevel, confidence: f64) -> Self {
        Self {
            latitude,
            longitude,
            risk_level,
            radius: None,
            confidence,
            estimated_time: None,
        }
    }
}

/// A candidate that survived filtering, tagged with its category.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub prediction_type: PredictionType,
    pub location: GeoPoint,
    pub risk_level: RiskLevel,
    pub radius_meters: f64,
    pub confidence: f64,
    pub estimated_time: Option<DateTime<Utc>>,
}

impl ScoredCandidate {
    pub fn from_predicted(prediction_type: PredictionType, zone: &PredictedZone) -> Self {
        let radius_meters = zone
            .radius
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(DEFAULT_PREDICTED_RADIUS_METERS);
        let estimated_time = zone.estimated_time.as_deref().and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .ok()
        });
        Self {
            prediction_type,
            location: GeoPoint::new(zone.latitude, zone.longitude),
            risk_level: zone.risk_level,
            radius_meters,
            confidence: zone.confidence,
            estimated_time,
        }
    }

    pub fn zone_name(&self) -> String {
        format!("{} Risk Zone", self.prediction_type.title())
    }

    pub fn zone_description(&self) -> String {
        format!(
            "AI-predicted {} risk ({:.1}% confidence)",
            self.prediction_type,
            self.confidence * 100.0
        )
    }
}

/// A hazard category that could not be queried this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFailure {
    pub prediction_type: PredictionType,
    pub message: String,
    pub connection_refused: bool,
}

/// A store write that failed during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceFailure {
    pub prediction_type: PredictionType,
    pub location: GeoPoint,
    pub message: String,
}

/// What an upsert did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Uuid),
    Updated(Uuid),
}

impl UpsertOutcome {
    pub fn zone_id(&self) -> Uuid {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => *id,
        }
    }
}

/// Result of one prediction cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub center: GeoPoint,
    /// Candidates that passed the confidence filter and intra-cycle dedup.
    pub accepted_candidates: usize,
    pub created: Vec<Uuid>,
    pub updated: Vec<Uuid>,
    pub category_failures: Vec<CategoryFailure>,
    pub persistence_failures: Vec<PersistenceFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    /// Zones created or updated by the cycle.
    pub fn processed(&self) -> usize {
        self.created.len() + self.updated.len()
    }

    /// A successful cycle in which nothing survived filtering.
    pub fn is_no_significant_risk(&self) -> bool {
        self.accepted_candidates == 0
    }
}

/// Result of clearing all predicted zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub cleared: usize,
    pub failed: usize,
}
