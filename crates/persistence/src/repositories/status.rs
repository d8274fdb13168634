//! Status expiry repository, backing the scheduled sweeper.
//!
//! Both sweeps are idempotent: a cleared row no longer matches the expiry
//! predicate, so reruns and crash-restarts converge on the same state.

use sqlx::PgPool;

use crate::metrics::QueryTimer;

/// Repository for status expiry sweeps.
#[derive(Clone)]
pub struct StatusRepository {
    pool: PgPool,
}

impl StatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reset expired global statuses to the default, clearing custom text,
    /// icon and expiry. Runs in bounded batches; returns the number of
    /// users reset.
    pub async fn reset_expired_global_statuses(
        &self,
        default_status_id: &str,
        batch_size: i64,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("reset_expired_global_statuses");
        let mut total = 0u64;
        loop {
            let affected = sqlx::query(
                r#"
                UPDATE users
                SET active_status_id = $1,
                    status_custom_text = NULL,
                    status_custom_icon_key = NULL,
                    status_expires_at = NULL
                WHERE id IN (
                    SELECT id FROM users
                    WHERE status_expires_at <= NOW()
                    ORDER BY id
                    LIMIT $2
                )
                "#,
            )
            .bind(default_status_id)
            .bind(batch_size)
            .execute(&self.pool)
            .await?
            .rows_affected();
            total += affected;
            if affected < batch_size as u64 {
                break;
            }
        }
        timer.record();
        Ok(total)
    }

    /// Delete expired per-group statuses in bounded batches; returns the
    /// number of rows deleted.
    pub async fn delete_expired_group_statuses(
        &self,
        batch_size: i64,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_expired_group_statuses");
        let mut total = 0u64;
        loop {
            let affected = sqlx::query(
                r#"
                DELETE FROM group_member_statuses
                WHERE (group_id, user_id) IN (
                    SELECT group_id, user_id FROM group_member_statuses
                    WHERE expires_at <= NOW()
                    LIMIT $1
                )
                "#,
            )
            .bind(batch_size)
            .execute(&self.pool)
            .await?
            .rows_affected();
            total += affected;
            if affected < batch_size as u64 {
                break;
            }
        }
        timer.record();
        Ok(total)
    }
}
