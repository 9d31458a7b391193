//! Risk zone domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::geo::GeoPoint;

/// Author recorded on zones created by the reconciliation engine.
pub const AI_SYSTEM_AUTHOR: &str = "AI_SYSTEM";

/// A circular geographic area tagged with a risk level and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub risk_level: RiskLevel,
    pub active: bool,
    pub source: ZoneSource,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Zone {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_ai_generated(&self) -> bool {
        matches!(self.source, ZoneSource::AiGenerated { .. })
    }

    pub fn prediction_type(&self) -> Option<PredictionType> {
        match self.source {
            ZoneSource::AiGenerated {
                prediction_type, ..
            } => Some(prediction_type),
            ZoneSource::Manual => None,
        }
    }

    /// True when the zone carries an expiry that is at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Risk classification of a zone.
///
/// `Safe` is display-only and only appears on manually marked safe zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "moderate", alias = "MEDIUM", alias = "medium")]
    Moderate,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "emergency", alias = "CRITICAL", alias = "critical")]
    Emergency,
    #[serde(alias = "safe")]
    Safe,
}

impl RiskLevel {
    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Emergency => "EMERGENCY",
            RiskLevel::Safe => "SAFE",
        }
    }

    /// Parses from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(RiskLevel::Low),
            "MODERATE" => Some(RiskLevel::Moderate),
            "HIGH" => Some(RiskLevel::High),
            "EMERGENCY" => Some(RiskLevel::Emergency),
            "SAFE" => Some(RiskLevel::Safe),
            _ => None,
        }
    }

    /// Map colour used by the dashboard for this level.
    pub fn color(&self) -> &'static str {
        match self {
            RiskLevel::Low => "#4caf50",
            RiskLevel::Moderate => "#ff9800",
            RiskLevel::High => "#f44336",
            RiskLevel::Emergency => "#b71c1c",
            RiskLevel::Safe => "#2e7d32",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hazard category queried from the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionType {
    Landslide,
    Flood,
    Weather,
}

impl PredictionType {
    /// Every category, in the order a cycle processes them.
    pub const ALL: [PredictionType; 3] = [
        PredictionType::Landslide,
        PredictionType::Flood,
        PredictionType::Weather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::Landslide => "landslide",
            PredictionType::Flood => "flood",
            PredictionType::Weather => "weather",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "landslide" => Some(PredictionType::Landslide),
            "flood" => Some(PredictionType::Flood),
            "weather" => Some(PredictionType::Weather),
            _ => None,
        }
    }

    /// Human readable title, e.g. "Landslide".
    pub fn title(&self) -> &'static str {
        match self {
            PredictionType::Landslide => "Landslide",
            PredictionType::Flood => "Flood",
            PredictionType::Weather => "Weather",
        }
    }
}

impl std::fmt::Display for PredictionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneSource {
    Manual,
    #[serde(rename_all = "camelCase")]
    AiGenerated {
        prediction_type: PredictionType,
        confidence: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        estimated_time: Option<DateTime<Utc>>,
    },
}

impl ZoneSource {
    /// Database discriminator for the source kind.
    pub fn kind_str(&self) -> &'static str {
        match self {
            ZoneSource::Manual => "MANUAL",
            ZoneSource::AiGenerated { .. } => "AI_GENERATED",
        }
    }
}

/// A zone that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewZone {
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub name: String,
    pub description: String,
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,
    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
    #[validate(custom(function = "shared::validation::validate_radius"))]
    pub radius_meters: f64,
    pub risk_level: RiskLevel,
    pub source: ZoneSource,
    pub created_by: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` fields are preserved.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct ZonePatch {
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: Option<f64>,
    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: Option<f64>,
    #[validate(custom(function = "shared::validation::validate_radius"))]
    pub radius_meters: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub active: Option<bool>,
    pub source: Option<ZoneSource>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ZonePatch {
    /// Patch that soft-deletes a zone.
    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Default::default()
        }
    }

    /// Applies the patch to an in-memory zone, stamping timestamps.
    pub fn apply_to(&self, zone: &mut Zone, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            zone.name = name.clone();
        }
        if let Some(description) = &self.description {
            zone.description = description.clone();
        }
        if let Some(latitude) = self.latitude {
            zone.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            zone.longitude = longitude;
        }
        if let Some(radius) = self.radius_meters {
            zone.radius_meters = radius;
        }
        if let Some(level) = self.risk_level {
            zone.risk_level = level;
        }
        if let Some(source) = self.source {
            zone.source = source;
        }
        if let Some(expires_at) = self.expires_at {
            zone.expires_at = Some(expires_at);
        }
        if let Some(active) = self.active {
            if zone.active && !active {
                zone.deleted_at = Some(now);
            } else if active {
                zone.deleted_at = None;
            }
            zone.active = active;
        }
        zone.updated_at = now;
    }
}

/// Which zones a listing should include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKindFilter {
    #[default]
    All,
    Manual,
    Ai,
}

impl ZoneKindFilter {
    pub fn matches(&self, zone: &Zone) -> bool {
        match self {
            ZoneKindFilter::All => true,
            ZoneKindFilter::Manual => !zone.is_ai_generated(),
            ZoneKindFilter::Ai => zone.is_ai_generated(),
        }
    }
}

fn default_risk_level() -> RiskLevel {
    RiskLevel::Low
}

/// Request payload for creating a manual zone.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateZoneRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: String,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_radius"))]
    pub radius_meters: f64,

    #[serde(default = "default_risk_level")]
    pub risk_level: RiskLevel,

    pub created_by: Option<String>,
}

impl CreateZoneRequest {
    /// Builds the zone to persist, trimming user-entered text.
    pub fn into_new_zone(self, default_author: &str) -> NewZone {
        NewZone {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            radius_meters: self.radius_meters,
            risk_level: self.risk_level,
            source: ZoneSource::Manual,
            created_by: self
                .created_by
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| default_author.to_string()),
            expires_at: None,
        }
    }
}

/// Request payload for editing a manual zone (partial update).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateZoneRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_radius"))]
    pub radius_meters: Option<f64>,

    pub risk_level: Option<RiskLevel>,
}

impl From<UpdateZoneRequest> for ZonePatch {
    fn from(req: UpdateZoneRequest) -> Self {
        ZonePatch {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description.map(|d| d.trim().to_string()),
            latitude: req.latitude,
            longitude: req.longitude,
            radius_meters: req.radius_meters,
            risk_level: req.risk_level,
            ..Default::default()
        }
    }
}

/// Query parameters for listing zones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListZonesQuery {
    #[serde(default)]
    pub kind: ZoneKindFilter,
}

/// Response for listing zones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListZonesResponse {
    pub zones: Vec<Zone>,
    pub total: usize,
}
