//! Reconciliation of hazard predictions into persisted AI-generated zones.
//!
//! One prediction cycle queries every hazard category concurrently, keeps
//! candidates at or above the confidence threshold, drops repeats of the
//! same category at the same 4-decimal coordinate key, then upserts each
//! survivor. An upsert updates the nearest active AI zone of the same
//! category within `PROXIMITY_MATCH_DEGREES`, otherwise it creates a zone.
//! Manual zones are never matched or modified.
//!
//! At most one cycle runs at a time; a cycle requested while another is in
//! flight is rejected with `CycleInProgress`, never queued.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::models::geo::GeoPoint;
use crate::models::notice::Notice;
use crate::models::prediction::{
    CategoryFailure, ClearReport, CycleReport, FloodQuery, LandslideQuery, PersistenceFailure,
    PredictionRequest, PredictionResponse, ScoredCandidate, UpsertOutcome, WeatherQuery,
};
use crate::models::settings::PredictionSettings;
use crate::models::zone::{NewZone, PredictionType, Zone, ZonePatch, ZoneSource, AI_SYSTEM_AUTHOR};
use crate::services::prediction::{PredictionError, PredictionService};
use crate::services::zone_store::{validation_message, StoreError, ZoneSnapshot, ZoneStore};

/// Maximum Euclidean distance, in decimal degrees, for a candidate to update
/// an existing zone of the same category (~1.1 km at the equator).
pub const PROXIMITY_MATCH_DEGREES: f64 = 0.01;

/// Lifetime of an AI-generated zone after its latest prediction.
pub const PREDICTED_ZONE_TTL_HOURS: i64 = 48;

/// Why the prediction service as a whole could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    ConnectionRefused,
    AllCategoriesFailed,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::ConnectionRefused => write!(f, "connection refused"),
            UnavailableReason::AllCategoriesFailed => write!(f, "all hazard categories failed"),
        }
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A prediction cycle is already running")]
    CycleInProgress,

    #[error("Prediction service unavailable: {reason}")]
    ServiceUnavailable {
        reason: UnavailableReason,
        failures: Vec<CategoryFailure>,
    },

    #[error("Failed to clear {failed} predicted zones ({cleared} cleared)")]
    ClearIncomplete { cleared: usize, failed: usize },

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl ReconciliationError {
    /// Operator-facing rendering of the error.
    pub fn notice(&self) -> Notice {
        match self {
            ReconciliationError::InvalidInput(msg) => {
                Notice::warning(format!("Cannot run predictions: {}", msg))
            }
            ReconciliationError::CycleInProgress => {
                Notice::info("Predictions are already being generated")
            }
            ReconciliationError::ServiceUnavailable {
                reason: UnavailableReason::ConnectionRefused,
                ..
            } => Notice::error("Prediction service offline. Check that the prediction backend is running."),
            ReconciliationError::ServiceUnavailable { .. } => {
                Notice::error("Prediction service unavailable. Try again later.")
            }
            ReconciliationError::ClearIncomplete { cleared, failed } => Notice::error(format!(
                "Cleared {} predicted zones, {} could not be cleared",
                cleared, failed
            )),
            ReconciliationError::Persistence(err) => {
                Notice::error(format!("Error saving zone: {}", err))
            }
        }
    }
}

impl CycleReport {
    /// Operator-facing summary of the cycle.
    pub fn notice(&self) -> Notice {
        let mut problems = Vec::new();
        if !self.category_failures.is_empty() {
            let names: Vec<&str> = self
                .category_failures
                .iter()
                .map(|f| f.prediction_type.as_str())
                .collect();
            problems.push(format!("{} unavailable", names.join(", ")));
        }
        if !self.persistence_failures.is_empty() {
            problems.push(format!(
                "{} zone writes failed",
                self.persistence_failures.len()
            ));
        }

        if self.is_no_significant_risk() {
            if problems.is_empty() {
                return Notice::info("No significant risks detected. Stay safe!");
            }
            return Notice::info(format!(
                "No significant risks detected ({})",
                problems.join("; ")
            ));
        }

        let headline = format!("Generated {} risk predictions", self.processed());
        if problems.is_empty() {
            Notice::success(headline)
        } else {
            Notice::warning(format!("{} ({})", headline, problems.join("; ")))
        }
    }
}

/// Builds the three category queries for a cycle.
///
/// The flood query takes a bounding box whose half-width is the prediction
/// radius converted at 111 km per degree. The weather service expects its
/// radius in kilometres, the landslide service in meters.
pub fn category_requests(center: GeoPoint, settings: &PredictionSettings) -> [PredictionRequest; 3] {
    let radius_km = settings.prediction_radius_km();
    [
        PredictionRequest::Landslide(LandslideQuery {
            latitude: center.latitude,
            longitude: center.longitude,
            radius: settings.prediction_radius_meters,
            time_horizon: settings.time_horizon_hours,
        }),
        PredictionRequest::Flood(FloodQuery {
            area_bounds: center.bounding_box(radius_km),
            prediction_hours: settings.flood_prediction_hours,
        }),
        PredictionRequest::Weather(WeatherQuery {
            latitude: center.latitude,
            longitude: center.longitude,
            forecast_days: settings.forecast_days,
            radius: radius_km,
        }),
    ]
}

/// Applies the confidence filter and intra-cycle dedup.
///
/// `responses` are processed in order; within a category only the first
/// candidate per rounded coordinate key survives. The threshold is
/// inclusive.
pub fn select_candidates(
    responses: &[(PredictionType, PredictionResponse)],
    confidence_threshold: f64,
) -> Vec<ScoredCandidate> {
    let mut seen: HashSet<(PredictionType, i64, i64)> = HashSet::new();
    let mut selected = Vec::new();

    for (prediction_type, response) in responses {
        for zone in &response.predicted_zones {
            // also rejects NaN confidences
            if !(zone.confidence >= confidence_threshold) {
                continue;
            }
            let location = GeoPoint::new(zone.latitude, zone.longitude);
            if location.validate().is_err() {
                debug!(
                    prediction_type = %prediction_type,
                    latitude = zone.latitude,
                    longitude = zone.longitude,
                    "Skipping candidate with out-of-range coordinates"
                );
                continue;
            }
            let (lat_key, lon_key) = location.rounded_key();
            if !seen.insert((*prediction_type, lat_key, lon_key)) {
                continue;
            }
            selected.push(ScoredCandidate::from_predicted(*prediction_type, zone));
        }
    }

    selected
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Orchestrates prediction cycles against a zone store.
pub struct ReconciliationEngine {
    predictor: Arc<dyn PredictionService>,
    store: Arc<dyn ZoneStore>,
    zones: watch::Receiver<ZoneSnapshot>,
    in_flight: AtomicBool,
    last_report: RwLock<Option<CycleReport>>,
}

impl ReconciliationEngine {
    pub fn new(predictor: Arc<dyn PredictionService>, store: Arc<dyn ZoneStore>) -> Self {
        let zones = store.subscribe();
        Self {
            predictor,
            store,
            zones,
            in_flight: AtomicBool::new(false),
            last_report: RwLock::new(None),
        }
    }

    pub fn is_cycle_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Report of the most recent completed cycle.
    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Active AI-generated zones in the current snapshot.
    pub fn active_predicted_zones(&self) -> Vec<Zone> {
        self.zones
            .borrow()
            .iter()
            .filter(|z| z.active && z.is_ai_generated())
            .cloned()
            .collect()
    }

    fn try_begin_cycle(&self) -> Option<CycleGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                flag: &self.in_flight,
            })
    }

    /// Runs one prediction cycle around `center`.
    pub async fn run_prediction_cycle(
        &self,
        center: Option<GeoPoint>,
        settings: &PredictionSettings,
    ) -> Result<CycleReport, ReconciliationError> {
        let center = center.ok_or_else(|| {
            ReconciliationError::InvalidInput("location is not available".to_string())
        })?;
        center
            .validate()
            .map_err(|e| ReconciliationError::InvalidInput(validation_message(&e)))?;
        settings
            .validate()
            .map_err(|e| ReconciliationError::InvalidInput(validation_message(&e)))?;

        let _guard = self
            .try_begin_cycle()
            .ok_or(ReconciliationError::CycleInProgress)?;

        let started_at = Utc::now();
        info!(
            latitude = center.latitude,
            longitude = center.longitude,
            radius_meters = settings.prediction_radius_meters,
            confidence_threshold = settings.confidence_threshold,
            "Prediction cycle starting"
        );

        let timeout = Duration::from_secs(settings.request_timeout_secs);
        let [landslide, flood, weather] = category_requests(center, settings);
        let (landslide_result, flood_result, weather_result) = tokio::join!(
            self.query_category(&landslide, timeout),
            self.query_category(&flood, timeout),
            self.query_category(&weather, timeout),
        );

        let mut responses = Vec::with_capacity(3);
        let mut category_failures = Vec::new();
        for (prediction_type, result) in [
            (PredictionType::Landslide, landslide_result),
            (PredictionType::Flood, flood_result),
            (PredictionType::Weather, weather_result),
        ] {
            match result {
                Ok(response) => responses.push((prediction_type, response)),
                Err(err) => {
                    warn!(
                        prediction_type = %prediction_type,
                        error = %err,
                        "Hazard category unavailable, excluded from cycle"
                    );
                    category_failures.push(CategoryFailure {
                        prediction_type,
                        message: err.to_string(),
                        connection_refused: err.is_connection_refused(),
                    });
                }
            }
        }

        if responses.is_empty() {
            let reason = if category_failures.iter().any(|f| f.connection_refused) {
                UnavailableReason::ConnectionRefused
            } else {
                UnavailableReason::AllCategoriesFailed
            };
            error!(reason = %reason, "Prediction cycle failed, no category reachable");
            return Err(ReconciliationError::ServiceUnavailable {
                reason,
                failures: category_failures,
            });
        }

        let candidates = select_candidates(&responses, settings.confidence_threshold);
        let mut report = CycleReport {
            center,
            accepted_candidates: candidates.len(),
            created: Vec::new(),
            updated: Vec::new(),
            category_failures,
            persistence_failures: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        for candidate in &candidates {
            match self.upsert_predicted_zone(candidate).await {
                Ok(UpsertOutcome::Created(id)) => report.created.push(id),
                Ok(UpsertOutcome::Updated(id)) => report.updated.push(id),
                Err(err) => {
                    error!(
                        prediction_type = %candidate.prediction_type,
                        latitude = candidate.location.latitude,
                        longitude = candidate.location.longitude,
                        error = %err,
                        "Failed to persist predicted zone"
                    );
                    report.persistence_failures.push(PersistenceFailure {
                        prediction_type: candidate.prediction_type,
                        location: candidate.location,
                        message: err.to_string(),
                    });
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            accepted = report.accepted_candidates,
            created = report.created.len(),
            updated = report.updated.len(),
            category_failures = report.category_failures.len(),
            persistence_failures = report.persistence_failures.len(),
            "Prediction cycle completed"
        );

        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    async fn query_category(
        &self,
        request: &PredictionRequest,
        timeout: Duration,
    ) -> Result<PredictionResponse, PredictionError> {
        let response = tokio::time::timeout(timeout, self.predictor.predict(request))
            .await
            .map_err(|_| PredictionError::Timeout(timeout.as_secs()))??;
        if !response.success {
            return Err(PredictionError::Unsuccessful);
        }
        debug!(
            prediction_type = %request.prediction_type(),
            candidates = response.predicted_zones.len(),
            "Hazard category answered"
        );
        Ok(response)
    }

    /// Nearest active AI zone of the candidate's category within range.
    fn find_matching_zone(&self, candidate: &ScoredCandidate) -> Option<Zone> {
        let snapshot = self.zones.borrow().clone();
        snapshot
            .iter()
            .filter(|z| z.active && z.prediction_type() == Some(candidate.prediction_type))
            .map(|z| (z.center().degree_distance(&candidate.location), z))
            .filter(|(distance, _)| *distance < PROXIMITY_MATCH_DEGREES)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, z)| z.clone())
    }

    /// Updates the matching predicted zone in place or creates a new one.
    pub async fn upsert_predicted_zone(
        &self,
        candidate: &ScoredCandidate,
    ) -> Result<UpsertOutcome, StoreError> {
        let expires_at = Utc::now() + chrono::Duration::hours(PREDICTED_ZONE_TTL_HOURS);
        let source = ZoneSource::AiGenerated {
            prediction_type: candidate.prediction_type,
            confidence: candidate.confidence,
            estimated_time: candidate.estimated_time,
        };

        if let Some(existing) = self.find_matching_zone(candidate) {
            let patch = ZonePatch {
                name: Some(candidate.zone_name()),
                description: Some(candidate.zone_description()),
                latitude: Some(candidate.location.latitude),
                longitude: Some(candidate.location.longitude),
                radius_meters: Some(candidate.radius_meters),
                risk_level: Some(candidate.risk_level),
                active: Some(true),
                source: Some(source),
                expires_at: Some(expires_at),
            };
            let zone = self.store.update(existing.id, patch).await?;
            debug!(zone_id = %zone.id, prediction_type = %candidate.prediction_type, "Predicted zone updated");
            return Ok(UpsertOutcome::Updated(zone.id));
        }

        let zone = self
            .store
            .create(NewZone {
                name: candidate.zone_name(),
                description: candidate.zone_description(),
                latitude: candidate.location.latitude,
                longitude: candidate.location.longitude,
                radius_meters: candidate.radius_meters,
                risk_level: candidate.risk_level,
                source,
                created_by: AI_SYSTEM_AUTHOR.to_string(),
                expires_at: Some(expires_at),
            })
            .await?;
        debug!(zone_id = %zone.id, prediction_type = %candidate.prediction_type, "Predicted zone created");
        Ok(UpsertOutcome::Created(zone.id))
    }

    /// Soft-deletes every active AI-generated zone.
    pub async fn clear_all_predicted(&self) -> Result<ClearReport, ReconciliationError> {
        let report = self.deactivate_predicted(|_| true).await?;
        info!(cleared = report.cleared, "Cleared all predicted zones");
        Ok(report)
    }

    /// Soft-deletes AI-generated zones whose expiry is at or before `now`.
    pub async fn expire_predicted(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ClearReport, ReconciliationError> {
        let report = self.deactivate_predicted(|z| z.is_expired(now)).await?;
        if report.cleared > 0 {
            info!(expired = report.cleared, "Expired predicted zones");
        }
        Ok(report)
    }

    async fn deactivate_predicted<F>(&self, select: F) -> Result<ClearReport, ReconciliationError>
    where
        F: Fn(&Zone) -> bool,
    {
        let targets: Vec<Zone> = self
            .active_predicted_zones()
            .into_iter()
            .filter(|z| select(z))
            .collect();

        let results = futures::future::join_all(
            targets
                .iter()
                .map(|z| self.store.update(z.id, ZonePatch::deactivate())),
        )
        .await;

        let mut cleared = 0;
        let mut failed = 0;
        for (zone, result) in targets.iter().zip(results) {
            match result {
                Ok(_) => cleared += 1,
                Err(err) => {
                    failed += 1;
                    error!(zone_id = %zone.id, error = %err, "Failed to deactivate predicted zone");
                }
            }
        }

        if failed > 0 {
            return Err(ReconciliationError::ClearIncomplete { cleared, failed });
        }
        Ok(ClearReport { cleared, failed })
    }
}
