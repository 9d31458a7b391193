//! Re-reads the active zone set so writes from other processes reach
//! subscribers. Only registered for the postgres backend.

use std::sync::Arc;

use domain::services::ZoneStore;
use persistence::PgZoneStore;

use super::scheduler::{Job, JobFrequency};

pub struct RefreshSnapshotJob {
    store: Arc<PgZoneStore>,
    every_secs: u64,
}

impl RefreshSnapshotJob {
    pub fn new(store: Arc<PgZoneStore>, every_secs: u64) -> Self {
        Self { store, every_secs }
    }
}

#[async_trait::async_trait]
impl Job for RefreshSnapshotJob {
    fn name(&self) -> &'static str {
        "refresh_zone_snapshot"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.every_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        persistence::metrics::record_pool_metrics(self.store.pool());
        self.store.refresh().await.map_err(|e| e.to_string())
    }
}
