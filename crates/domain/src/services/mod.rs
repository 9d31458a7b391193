//! Domain services for the risk zone backend.
//!
//! Services contain business logic that operates on domain models.

pub mod prediction;
pub mod reconciliation;
pub mod zone_store;

pub use prediction::{MockBehavior, MockPredictionService, PredictionError, PredictionService};
pub use reconciliation::{
    ReconciliationEngine, ReconciliationError, UnavailableReason, PREDICTED_ZONE_TTL_HOURS,
    PROXIMITY_MATCH_DEGREES,
};
pub use zone_store::{InMemoryZoneStore, StoreError, ZoneSnapshot, ZoneStore};
