//! Soft-deletes AI zones whose prediction has expired.

use std::sync::Arc;

use chrono::Utc;

use domain::services::ReconciliationEngine;

use super::scheduler::{Job, JobFrequency};

pub struct ExpirePredictionsJob {
    engine: Arc<ReconciliationEngine>,
    every_secs: u64,
}

impl ExpirePredictionsJob {
    pub fn new(engine: Arc<ReconciliationEngine>, every_secs: u64) -> Self {
        Self { engine, every_secs }
    }
}

#[async_trait::async_trait]
impl Job for ExpirePredictionsJob {
    fn name(&self) -> &'static str {
        "expire_predictions"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.every_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        self.engine
            .expire_predicted(Utc::now())
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
