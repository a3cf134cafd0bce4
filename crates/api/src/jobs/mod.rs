//! Background job scheduler and job implementations.

mod image_expiry;
mod pool_metrics;
mod scheduler;

pub use image_expiry::ImageExpiryJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
