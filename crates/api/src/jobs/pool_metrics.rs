//! Gauges for the PostgreSQL pool shared by the application, roster and
//! admin repositories and the change feed listener.

use sqlx::PgPool;

use super::scheduler::{Job, JobFrequency};

const INTERVAL_SECS: u64 = 10;

/// Publishes pool size, active and idle connections every 10 seconds.
pub struct PoolMetricsJob {
    pool: PgPool,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(INTERVAL_SECS)
    }

    async fn execute(&self) -> Result<(), String> {
        persistence::metrics::record_pool_metrics(&self.pool);
        Ok(())
    }
}
