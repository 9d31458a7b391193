//! Risk zone entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use domain::models::zone::{PredictionType, RiskLevel, Zone, ZoneSource};

/// A stored row that does not map onto a valid zone.
#[derive(Debug, Error, PartialEq)]
pub enum EntityError {
    #[error("unknown risk level '{0}'")]
    RiskLevel(String),

    #[error("unknown source kind '{0}'")]
    SourceKind(String),

    #[error("AI zone {0} is missing its prediction type or confidence")]
    IncompletePrediction(Uuid),
}

/// Database row mapping for the risk_zones table.
#[derive(Debug, Clone, FromRow)]
pub struct ZoneEntity {
    pub id: i64,
    pub zone_id: Uuid,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub risk_level: String,
    pub active: bool,
    pub source_kind: String,
    pub prediction_type: Option<String>,
    pub confidence: Option<f64>,
    pub estimated_time: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Column values for a zone source.
pub struct SourceColumns {
    pub kind: &'static str,
    pub prediction_type: Option<&'static str>,
    pub confidence: Option<f64>,
    pub estimated_time: Option<DateTime<Utc>>,
}

impl From<&ZoneSource> for SourceColumns {
    fn from(source: &ZoneSource) -> Self {
        match source {
            ZoneSource::Manual => Self {
                kind: source.kind_str(),
                prediction_type: None,
                confidence: None,
                estimated_time: None,
            },
            ZoneSource::AiGenerated {
                prediction_type,
                confidence,
                estimated_time,
            } => Self {
                kind: source.kind_str(),
                prediction_type: Some(prediction_type.as_str()),
                confidence: Some(*confidence),
                estimated_time: *estimated_time,
            },
        }
    }
}

impl ZoneEntity {
    fn source(&self) -> Result<ZoneSource, EntityError> {
        match self.source_kind.as_str() {
            "MANUAL" => Ok(ZoneSource::Manual),
            "AI_GENERATED" => {
                let prediction_type = self
                    .prediction_type
                    .as_deref()
                    .and_then(PredictionType::parse);
                match (prediction_type, self.confidence) {
                    (Some(prediction_type), Some(confidence)) => Ok(ZoneSource::AiGenerated {
                        prediction_type,
                        confidence,
                        estimated_time: self.estimated_time,
                    }),
                    _ => Err(EntityError::IncompletePrediction(self.zone_id)),
                }
            }
            other => Err(EntityError::SourceKind(other.to_string())),
        }
    }
}

impl TryFrom<ZoneEntity> for Zone {
    type Error = EntityError;

    fn try_from(entity: ZoneEntity) -> Result<Self, Self::Error> {
        let risk_level = RiskLevel::parse(&entity.risk_level)
            .ok_or_else(|| EntityError::RiskLevel(entity.risk_level.clone()))?;
        let source = entity.source()?;
        Ok(Self {
            id: entity.zone_id,
            name: entity.name,
            description: entity.description,
            latitude: entity.latitude,
            longitude: entity.longitude,
            radius_meters: entity.radius_meters,
            risk_level,
            active: entity.active,
            source,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            expires_at: entity.expires_at,
            deleted_at: entity.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_zone_entity() -> ZoneEntity {
        ZoneEntity {
            id: 1,
            zone_id: Uuid::new_v4(),
            name: "Landslide Risk Zone".to_string(),
            description: "AI-predicted landslide risk (82.0% confidence)".to_string(),
            latitude: 25.5788,
            longitude: 91.8933,
            radius_meters: 500.0,
            risk_level: "HIGH".to_string(),
            active: true,
            source_kind: "AI_GENERATED".to_string(),
            prediction_type: Some("landslide".to_string()),
            confidence: Some(0.82),
            estimated_time: None,
            created_by: "AI_SYSTEM".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: Some(Utc::now()),
            deleted_at: None,
        }
    }

    #[test]
    fn test_ai_entity_to_domain() {
        let entity = create_test_zone_entity();
        let zone = Zone::try_from(entity.clone()).unwrap();

        assert_eq!(zone.id, entity.zone_id);
        assert_eq!(zone.risk_level, RiskLevel::High);
        assert_eq!(zone.prediction_type(), Some(PredictionType::Landslide));
        assert_eq!(zone.expires_at, entity.expires_at);
        assert!(zone.is_ai_generated());
    }

    #[test]
    fn test_manual_entity_to_domain() {
        let mut entity = create_test_zone_entity();
        entity.source_kind = "MANUAL".to_string();
        entity.prediction_type = None;
        entity.confidence = None;

        let zone = Zone::try_from(entity).unwrap();
        assert_eq!(zone.source, ZoneSource::Manual);
    }

    #[test]
    fn test_unknown_risk_level_is_rejected() {
        let mut entity = create_test_zone_entity();
        entity.risk_level = "EXTREME".to_string();
        assert_eq!(
            Zone::try_from(entity).unwrap_err(),
            EntityError::RiskLevel("EXTREME".to_string())
        );
    }

    #[test]
    fn test_ai_entity_without_confidence_is_rejected() {
        let mut entity = create_test_zone_entity();
        entity.confidence = None;
        let id = entity.zone_id;
        assert_eq!(
            Zone::try_from(entity).unwrap_err(),
            EntityError::IncompletePrediction(id)
        );
    }

    #[test]
    fn test_source_columns() {
        let ai = ZoneSource::AiGenerated {
            prediction_type: PredictionType::Flood,
            confidence: 0.7,
            estimated_time: None,
        };
        let columns = SourceColumns::from(&ai);
        assert_eq!(columns.kind, "AI_GENERATED");
        assert_eq!(columns.prediction_type, Some("flood"));
        assert_eq!(columns.confidence, Some(0.7));

        let manual = SourceColumns::from(&ZoneSource::Manual);
        assert_eq!(manual.kind, "MANUAL");
        assert!(manual.prediction_type.is_none());
    }
}
