//! Zone store abstraction and the in-memory implementation.
//!
//! A store owns persisted zones and publishes the full set of active zones
//! on a `watch` channel after every change. Consumers hold a receiver and
//! always read a complete snapshot; snapshots are replaced, never mutated.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::Stream;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::models::zone::{NewZone, Zone, ZonePatch};

/// Full set of active zones, ordered by creation time.
pub type ZoneSnapshot = Arc<Vec<Zone>>;

/// Errors returned by zone store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Zone not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid zone: {0}")]
    Invalid(String),

    #[error("Zone store unavailable: {0}")]
    Unavailable(String),

    #[error("Zone store error: {0}")]
    Backend(String),
}

/// Flattens validator errors into a single readable message.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect();
    parts.sort();
    parts.join(", ")
}

/// Persistence for zones with a live active-only view.
#[async_trait::async_trait]
pub trait ZoneStore: Send + Sync {
    /// Live view of all zones with `active = true`.
    fn subscribe(&self) -> watch::Receiver<ZoneSnapshot>;

    /// Persist a new zone and return it with its assigned id.
    async fn create(&self, zone: NewZone) -> Result<Zone, StoreError>;

    /// Apply a partial update to an existing zone.
    async fn update(&self, id: Uuid, patch: ZonePatch) -> Result<Zone, StoreError>;

    /// Fetch a zone by id, including inactive ones.
    async fn get(&self, id: Uuid) -> Result<Option<Zone>, StoreError>;

    /// Re-read the active set from the backing store and republish it.
    async fn refresh(&self) -> Result<(), StoreError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Turns a snapshot receiver into a stream that yields the current snapshot
/// and then one snapshot per change. Ends when the store is dropped.
pub fn snapshot_stream(
    receiver: watch::Receiver<ZoneSnapshot>,
) -> impl Stream<Item = ZoneSnapshot> {
    futures::stream::unfold((receiver, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let snapshot = rx.borrow_and_update().clone();
        Some((snapshot, (rx, false)))
    })
}

/// Builds the active snapshot from a set of zones.
pub fn active_snapshot<'a, I>(zones: I) -> ZoneSnapshot
where
    I: IntoIterator<Item = &'a Zone>,
{
    let mut active: Vec<Zone> = zones.into_iter().filter(|z| z.active).cloned().collect();
    active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Arc::new(active)
}

/// Zone store kept entirely in memory.
///
/// Used for local development and tests. Writes can be made to fail, either
/// globally or for specific zone ids.
pub struct InMemoryZoneStore {
    zones: RwLock<HashMap<Uuid, Zone>>,
    snapshot_tx: watch::Sender<ZoneSnapshot>,
    fail_writes: AtomicBool,
    failing_ids: Mutex<HashSet<Uuid>>,
}

impl InMemoryZoneStore {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            zones: RwLock::new(HashMap::new()),
            snapshot_tx,
            fail_writes: AtomicBool::new(false),
            failing_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make updates to one specific zone fail.
    pub async fn fail_updates_for(&self, id: Uuid) {
        self.failing_ids.lock().await.insert(id);
    }

    /// Every stored zone, active or not.
    pub async fn all(&self) -> Vec<Zone> {
        let zones = self.zones.read().await;
        let mut all: Vec<Zone> = zones.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        Ok(())
    }

    fn publish(&self, zones: &HashMap<Uuid, Zone>) {
        self.snapshot_tx.send_replace(active_snapshot(zones.values()));
    }
}

impl Default for InMemoryZoneStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ZoneStore for InMemoryZoneStore {
    fn subscribe(&self) -> watch::Receiver<ZoneSnapshot> {
        self.snapshot_tx.subscribe()
    }

    async fn create(&self, zone: NewZone) -> Result<Zone, StoreError> {
        zone.validate()
            .map_err(|e| StoreError::Invalid(validation_message(&e)))?;
        self.check_writable()?;

        let now = Utc::now();
        let created = Zone {
            id: Uuid::new_v4(),
            name: zone.name,
            description: zone.description,
            latitude: zone.latitude,
            longitude: zone.longitude,
            radius_meters: zone.radius_meters,
            risk_level: zone.risk_level,
            active: true,
            source: zone.source,
            created_by: zone.created_by,
            created_at: now,
            updated_at: now,
            expires_at: zone.expires_at,
            deleted_at: None,
        };

        let mut zones = self.zones.write().await;
        zones.insert(created.id, created.clone());
        self.publish(&zones);
        debug!(zone_id = %created.id, "Zone stored in memory");
        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: ZonePatch) -> Result<Zone, StoreError> {
        patch
            .validate()
            .map_err(|e| StoreError::Invalid(validation_message(&e)))?;
        self.check_writable()?;
        if self.failing_ids.lock().await.contains(&id) {
            return Err(StoreError::Backend(format!(
                "simulated update failure for {}",
                id
            )));
        }

        let mut zones = self.zones.write().await;
        let zone = zones.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply_to(zone, Utc::now());
        let updated = zone.clone();
        self.publish(&zones);
        Ok(updated)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Zone>, StoreError> {
        Ok(self.zones.read().await.get(&id).cloned())
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        let zones = self.zones.read().await;
        self.publish(&zones);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
