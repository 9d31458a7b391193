//! Job scheduler infrastructure for background tasks.
//!
//! Each job runs in its own task. The delay before the next run is taken
//! from `Job::frequency` every iteration, so jobs whose period comes from
//! runtime settings pick up changes without a restart. A job can also
//! signal `rescheduled` to restart its countdown immediately.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Job frequency for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    /// Run every N seconds.
    Seconds(u64),
    /// Run every N minutes.
    Minutes(u64),
}

impl JobFrequency {
    /// Get the duration between job executions (never zero).
    pub fn duration(&self) -> Duration {
        let secs = match self {
            JobFrequency::Seconds(secs) => *secs,
            JobFrequency::Minutes(mins) => mins.saturating_mul(60),
        };
        Duration::from_secs(secs.max(1))
    }
}

/// Trait for implementing background jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// The name of this job (used for logging).
    fn name(&self) -> &'static str;

    /// The delay before the next execution.
    fn frequency(&self) -> JobFrequency;

    /// Execute the job. Returns Ok(()) on success, Err with message on failure.
    async fn execute(&self) -> Result<(), String>;

    /// Resolves when the schedule changed and the countdown should restart.
    async fn rescheduled(&self) {
        std::future::pending::<()>().await
    }
}

/// Background job scheduler.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

async fn run_job(job: Arc<dyn Job>, mut shutdown_rx: watch::Receiver<bool>) {
    let name = job.name();
    info!(job = name, frequency = ?job.frequency(), "Job scheduled");

    loop {
        let period = job.frequency().duration();
        tokio::select! {
            _ = tokio::time::sleep(period) => {
                let start = std::time::Instant::now();
                debug!(job = name, "Job starting");

                match job.execute().await {
                    Ok(()) => debug!(
                        job = name,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Job completed successfully"
                    ),
                    Err(e) => error!(
                        job = name,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        error = %e,
                        "Job failed"
                    ),
                }
            }
            _ = job.rescheduled() => {
                info!(job = name, frequency = ?job.frequency(), "Job rescheduled");
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!(job = name, "Job shutting down");
                    break;
                }
            }
        }
    }
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a job with the scheduler.
    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    /// Start all registered jobs.
    pub fn start(&mut self) {
        info!(jobs = self.jobs.len(), "Starting job scheduler");

        for job in &self.jobs {
            let handle = tokio::spawn(run_job(Arc::clone(job), self.shutdown_rx.clone()));
            self.handles.push(handle);
        }
    }

    /// Signal all jobs to stop. Returns immediately.
    pub fn shutdown(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all jobs to complete with timeout.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let shutdown_future = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Job task panicked");
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All jobs completed gracefully"),
            Err(_) => warn!(timeout = ?timeout, "Job shutdown timed out"),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}
