//! PostgreSQL-backed zone store.
//!
//! Writes go to the database first; the returned row is then folded into
//! the published snapshot. `refresh` re-reads the full active set to pick up
//! changes made by other processes. A refresh whose read overlapped a local
//! write is discarded, so it can never roll back a zone that write published.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use domain::models::zone::{NewZone, Zone, ZonePatch};
use domain::services::zone_store::{
    active_snapshot, validation_message, StoreError, ZoneSnapshot, ZoneStore,
};

use crate::entities::ZoneEntity;
use crate::metrics::record_snapshot_size;
use crate::repositories::ZoneRepository;

fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db) if db.is_check_violation() => {
            StoreError::Invalid(db.message().to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

fn to_zone(entity: ZoneEntity) -> Result<Zone, StoreError> {
    Zone::try_from(entity).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Zone store persisted in the `risk_zones` table.
pub struct PgZoneStore {
    repo: ZoneRepository,
    snapshot_tx: watch::Sender<ZoneSnapshot>,
    /// Bumped under the snapshot lock by every local write.
    write_version: AtomicU64,
}

impl PgZoneStore {
    /// Creates a store with an empty snapshot. Call `refresh` to load it.
    pub fn new(pool: PgPool) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            repo: ZoneRepository::new(pool),
            snapshot_tx,
            write_version: AtomicU64::new(0),
        }
    }

    /// Creates a store and loads the current active set.
    pub async fn connect(pool: PgPool) -> Result<Self, StoreError> {
        let store = Self::new(pool);
        store.refresh().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        self.repo.pool()
    }

    /// Replaces one zone in the published snapshot.
    fn publish_zone(&self, zone: &Zone) {
        self.snapshot_tx.send_modify(|snapshot| {
            self.write_version.fetch_add(1, Ordering::AcqRel);
            let zones = snapshot
                .iter()
                .filter(|z| z.id != zone.id)
                .chain(std::iter::once(zone));
            *snapshot = active_snapshot(zones);
            record_snapshot_size(snapshot.len());
        });
    }

    /// Publishes a full re-read unless a local write was published after
    /// `read_version` was taken. Returns whether the snapshot was replaced.
    fn publish_refreshed(&self, read_version: u64, zones: &[Zone]) -> bool {
        self.snapshot_tx.send_if_modified(|snapshot| {
            if self.write_version.load(Ordering::Acquire) != read_version {
                return false;
            }
            *snapshot = active_snapshot(zones.iter());
            record_snapshot_size(snapshot.len());
            true
        })
    }
}

#[async_trait]
impl ZoneStore for PgZoneStore {
    fn subscribe(&self) -> watch::Receiver<ZoneSnapshot> {
        self.snapshot_tx.subscribe()
    }

    async fn create(&self, zone: NewZone) -> Result<Zone, StoreError> {
        zone.validate()
            .map_err(|e| StoreError::Invalid(validation_message(&e)))?;

        let entity = self
            .repo
            .create(Uuid::new_v4(), &zone)
            .await
            .map_err(store_error)?;
        let created = to_zone(entity)?;
        self.publish_zone(&created);
        debug!(zone_id = %created.id, "Zone created");
        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: ZonePatch) -> Result<Zone, StoreError> {
        patch
            .validate()
            .map_err(|e| StoreError::Invalid(validation_message(&e)))?;

        let entity = self
            .repo
            .update(id, &patch)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound(id))?;
        let updated = to_zone(entity)?;
        self.publish_zone(&updated);
        debug!(zone_id = %updated.id, active = updated.active, "Zone updated");
        Ok(updated)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Zone>, StoreError> {
        self.repo
            .find_by_zone_id(id)
            .await
            .map_err(store_error)?
            .map(to_zone)
            .transpose()
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        let read_version = self.write_version.load(Ordering::Acquire);
        let entities = self.repo.find_active().await.map_err(store_error)?;
        let mut zones = Vec::with_capacity(entities.len());
        for entity in entities {
            let zone_id = entity.zone_id;
            match Zone::try_from(entity) {
                Ok(zone) => zones.push(zone),
                Err(err) => warn!(zone_id = %zone_id, error = %err, "Skipping malformed zone row"),
            }
        }
        if !self.publish_refreshed(read_version, &zones) {
            debug!("Zone write landed during refresh, keeping published snapshot");
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.repo.ping().await.map_err(store_error)
    }
}
