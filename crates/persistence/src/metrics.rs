//! Zone store metrics: query latency, pool occupancy and snapshot size.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Record how long a zone query took and whether it succeeded.
pub fn record_query_duration(query_name: &'static str, ok: bool, duration_secs: f64) {
    let outcome = if ok { "ok" } else { "error" };
    histogram!(
        "zone_store_query_duration_seconds",
        "query" => query_name,
        "outcome" => outcome
    )
    .record(duration_secs);
    if !ok {
        counter!("zone_store_query_errors_total", "query" => query_name).increment(1);
    }
}

/// Record connection pool occupancy. Called from the snapshot refresh job.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("zone_store_connections_active").set(size.saturating_sub(idle) as f64);
    gauge!("zone_store_connections_idle").set(idle as f64);
    gauge!("zone_store_connections_total").set(size as f64);
}

/// Record how many zones the published snapshot holds.
pub fn record_snapshot_size(active_zones: usize) {
    gauge!("zone_store_active_zones").set(active_zones as f64);
}

/// Times one repository call.
///
/// ```ignore
/// let timer = QueryTimer::new("find_active_zones");
/// let result = sqlx::query_as::<_, ZoneEntity>(...).fetch_all(&pool).await;
/// timer.finish(&result);
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    /// Records the elapsed time labelled with the result's outcome.
    pub fn finish<T, E>(self, result: &Result<T, E>) {
        record_query_duration(
            self.query_name,
            result.is_ok(),
            self.start.elapsed().as_secs_f64(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::new("find_active_zones");
        assert_eq!(timer.query_name, "find_active_zones");
    }

    #[test]
    fn test_finish_without_recorder_is_noop() {
        let ok: Result<(), ()> = Ok(());
        QueryTimer::new("update_zone").finish(&ok);
        let failed: Result<(), ()> = Err(());
        QueryTimer::new("update_zone").finish(&failed);
        record_snapshot_size(3);
    }
}
