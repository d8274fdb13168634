//! Background jobs.

pub mod pool_metrics;
pub mod scheduler;
pub mod status_sweeper;

pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobScheduler};
pub use status_sweeper::StatusSweeperJob;
