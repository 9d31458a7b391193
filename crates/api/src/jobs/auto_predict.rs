//! Periodic prediction cycle.
//!
//! The period is the current `update_interval_minutes`; changing it, or
//! toggling `enable_auto_predict`, restarts the countdown. Other settings
//! are picked up by the next tick without a restart. A tick that lands while a cycle is running is
//! dropped.

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use domain::models::PredictionSettings;
use domain::services::ReconciliationError;

use super::scheduler::{Job, JobFrequency};
use crate::app::AppState;
use crate::middleware::metrics::record_cycle_result;

/// The settings that shape the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Schedule {
    update_interval_minutes: u64,
    enable_auto_predict: bool,
}

impl From<&PredictionSettings> for Schedule {
    fn from(settings: &PredictionSettings) -> Self {
        Self {
            update_interval_minutes: settings.update_interval_minutes,
            enable_auto_predict: settings.enable_auto_predict,
        }
    }
}

struct ScheduleWatch {
    changes: watch::Receiver<PredictionSettings>,
    current: Schedule,
}

pub struct AutoPredictJob {
    state: AppState,
    schedule: Mutex<ScheduleWatch>,
}

impl AutoPredictJob {
    pub fn new(state: AppState) -> Self {
        let mut changes = state.settings.subscribe();
        let current = Schedule::from(&*changes.borrow_and_update());
        Self {
            state,
            schedule: Mutex::new(ScheduleWatch { changes, current }),
        }
    }
}

#[async_trait::async_trait]
impl Job for AutoPredictJob {
    fn name(&self) -> &'static str {
        "auto_predict"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.state.settings.borrow().update_interval_minutes)
    }

    async fn execute(&self) -> Result<(), String> {
        let settings = self.state.settings_snapshot();
        if !settings.enable_auto_predict {
            debug!("Auto-prediction disabled, skipping");
            return Ok(());
        }
        let Some(center) = self.state.current_location() else {
            debug!("No operator location yet, skipping auto-prediction");
            return Ok(());
        };

        let result = self
            .state
            .engine
            .run_prediction_cycle(Some(center), &settings)
            .await;
        record_cycle_result(&result);

        match result {
            Ok(report) => {
                info!(notice = %report.notice().message, "Auto-prediction finished");
                Ok(())
            }
            Err(ReconciliationError::CycleInProgress) => {
                info!("Prediction cycle already running, auto-prediction tick dropped");
                Ok(())
            }
            Err(err) => {
                warn!(notice = %err.notice().message, "Auto-prediction failed");
                Err(err.to_string())
            }
        }
    }

    async fn rescheduled(&self) {
        let mut schedule = self.schedule.lock().await;
        loop {
            if schedule.changes.changed().await.is_err() {
                // settings sender dropped; nothing will ever change again
                std::future::pending::<()>().await;
            }
            let next = Schedule::from(&*schedule.changes.borrow_and_update());
            if next != schedule.current {
                debug!(
                    update_interval_minutes = next.update_interval_minutes,
                    enable_auto_predict = next.enable_auto_predict,
                    "Auto-prediction schedule changed"
                );
                schedule.current = next;
                return;
            }
        }
    }
}
