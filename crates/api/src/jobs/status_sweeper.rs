//! Scheduled sweep of expired member statuses.
//!
//! Two independent phases: expired global statuses are reset to the
//! default status, and expired per-group statuses are deleted. A failure
//! in one phase does not stop the other.

use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

use persistence::repositories::StatusRepository;

use crate::config::SweeperConfig;
use crate::jobs::scheduler::Job;

pub struct StatusSweeperJob {
    repo: StatusRepository,
    interval_secs: u64,
    batch_size: i64,
    default_status_id: String,
}

impl StatusSweeperJob {
    pub fn new(pool: PgPool, config: &SweeperConfig) -> Self {
        Self {
            repo: StatusRepository::new(pool),
            interval_secs: config.interval_secs,
            batch_size: config.batch_size,
            default_status_id: config.default_status_id.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Job for StatusSweeperJob {
    fn name(&self) -> &'static str {
        "status_sweeper"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let mut failures = Vec::new();

        match self
            .repo
            .reset_expired_global_statuses(&self.default_status_id, self.batch_size)
            .await
        {
            Ok(reset) => {
                if reset > 0 {
                    info!(reset, "Reset expired global statuses");
                }
            }
            Err(e) => {
                warn!(error = %e, "Global status sweep failed");
                failures.push(format!("global statuses: {}", e));
            }
        }

        match self.repo.delete_expired_group_statuses(self.batch_size).await {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(deleted, "Deleted expired group statuses");
                }
            }
            Err(e) => {
                warn!(error = %e, "Group status sweep failed");
                failures.push(format!("group statuses: {}", e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweeperConfig;

    #[tokio::test]
    async fn test_interval_from_config() {
        let config = SweeperConfig {
            interval_secs: 120,
            batch_size: 250,
            default_status_id: "available".to_string(),
        };
        let pool_opts = sqlx::postgres::PgPoolOptions::new();
        let pool = pool_opts.connect_lazy("postgres://localhost/unused");
        let job = StatusSweeperJob::new(pool.unwrap(), &config);

        assert_eq!(job.interval(), Duration::from_secs(120));
        assert_eq!(job.name(), "status_sweeper");
        assert_eq!(job.batch_size, 250);
    }
}
