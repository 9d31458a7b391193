//! Domain models for the risk zone service.

pub mod geo;
pub mod notice;
pub mod prediction;
pub mod settings;
pub mod summary;
pub mod zone;

pub use geo::{BoundingBox, GeoPoint};
pub use notice::{Notice, NoticeSeverity};
pub use prediction::{
    CategoryFailure, ClearReport, CycleReport, PersistenceFailure, PredictedZone,
    PredictionRequest, PredictionResponse, ScoredCandidate, UpsertOutcome,
};
pub use settings::{PredictionSettings, UpdatePredictionSettingsRequest};
pub use summary::{ZoneBounds, ZoneSummary};
pub use zone::{NewZone, PredictionType, RiskLevel, Zone, ZonePatch, ZoneSource};
