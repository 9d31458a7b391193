//! Background job scheduler and job implementations.

mod auto_predict;
mod expire_predictions;
mod refresh_snapshot;
mod scheduler;

pub use auto_predict::AutoPredictJob;
pub use expire_predictions::ExpirePredictionsJob;
pub use refresh_snapshot::RefreshSnapshotJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
