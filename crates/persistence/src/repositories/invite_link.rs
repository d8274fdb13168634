//! Invite link repository.
//!
//! Redemption is the contended path: the `uses` counter only moves through
//! a conditional UPDATE whose WHERE clause re-checks the limit, so two
//! racing redeemers of a one-use link cannot both win.

use chrono::{DateTime, Utc};
use domain::models::role::GroupRole;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{GroupRoleDb, InvitationEntity, InviteLinkEntity};
use crate::metrics::QueryTimer;
use crate::repositories::generate_invite_code;

const LINK_COLUMNS: &str =
    "id, group_id, code, created_by, role, uses, max_uses, expires_at, is_active, created_at";
const INVITATION_COLUMNS: &str = "id, group_id, invited_by, invitee_id, email, username, phone, \
     role, status, created_at, expires_at, link_id";

const CODE_GENERATION_ATTEMPTS: usize = 5;

/// Result of a redemption attempt against a live link.
#[derive(Debug)]
pub enum RedeemOutcome {
    /// The caller already holds a pending invitation from this link.
    Existing(InvitationEntity),
    /// A use was consumed and a new pending invitation created.
    Created(InvitationEntity),
    /// The usage limit was reached; the link has been deactivated.
    Exhausted,
    /// The link expired between lookup and redemption.
    Expired,
    /// The link is gone or no longer active.
    Inactive,
}

/// Repository for invite link operations.
#[derive(Clone)]
pub struct InviteLinkRepository {
    pool: PgPool,
}

impl InviteLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a link with a freshly generated code, retrying on the rare
    /// code collision.
    pub async fn create(
        &self,
        group_id: Uuid,
        created_by: Uuid,
        role: GroupRole,
        max_uses: Option<i32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<InviteLinkEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_invite_link");
        let role_db: GroupRoleDb = role.into();

        for _ in 0..CODE_GENERATION_ATTEMPTS {
            let code = generate_invite_code();
            let inserted = sqlx::query_as::<_, InviteLinkEntity>(&format!(
                r#"
                INSERT INTO invite_links (group_id, code, created_by, role, max_uses, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {LINK_COLUMNS}
                "#
            ))
            .bind(group_id)
            .bind(&code)
            .bind(created_by)
            .bind(role_db)
            .bind(max_uses)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(link) => {
                    timer.record();
                    return Ok(link);
                }
                Err(err) if is_code_collision(&err) => continue,
                Err(err) => return Err(err),
            }
        }

        Err(sqlx::Error::Protocol(
            "could not generate a unique invite code".to_string(),
        ))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<InviteLinkEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_invite_link_by_code");
        let result = sqlx::query_as::<_, InviteLinkEntity>(&format!(
            "SELECT {LINK_COLUMNS} FROM invite_links WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_by_group(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<InviteLinkEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_group_invite_links");
        let result = sqlx::query_as::<_, InviteLinkEntity>(&format!(
            "SELECT {LINK_COLUMNS} FROM invite_links WHERE group_id = $1 ORDER BY created_at DESC"
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Deactivate a link within its group. Returns false when no such
    /// link exists.
    pub async fn revoke(&self, group_id: Uuid, link_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("revoke_invite_link");
        let result = sqlx::query(
            "UPDATE invite_links SET is_active = FALSE WHERE id = $1 AND group_id = $2",
        )
        .bind(link_id)
        .bind(group_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    /// Deactivate a link found dead on arrival (expired or exhausted at
    /// lookup time).
    pub async fn deactivate(&self, link_id: Uuid) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("deactivate_invite_link");
        sqlx::query("UPDATE invite_links SET is_active = FALSE WHERE id = $1")
            .bind(link_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(())
    }

    /// Redeem a link for the caller.
    ///
    /// Idempotent: an existing pending invitation from this link is
    /// returned as-is without consuming a use. Otherwise a use is consumed
    /// atomically and a pending invitation pre-bound to the caller is
    /// created; consuming the final use deactivates the link.
    pub async fn redeem(
        &self,
        link_id: Uuid,
        user_id: Uuid,
    ) -> Result<RedeemOutcome, sqlx::Error> {
        let timer = QueryTimer::new("redeem_invite_link");
        let mut tx = self.pool.begin().await?;

        let link = sqlx::query_as::<_, InviteLinkEntity>(&format!(
            "SELECT {LINK_COLUMNS} FROM invite_links WHERE id = $1 FOR UPDATE"
        ))
        .bind(link_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(link) = link else {
            timer.record();
            return Ok(RedeemOutcome::Inactive);
        };
        if !link.is_active {
            timer.record();
            return Ok(RedeemOutcome::Inactive);
        }
        if link.expires_at.is_some_and(|exp| exp <= Utc::now()) {
            timer.record();
            return Ok(RedeemOutcome::Expired);
        }

        let existing = sqlx::query_as::<_, InvitationEntity>(&format!(
            r#"
            SELECT {INVITATION_COLUMNS}
            FROM invitations
            WHERE link_id = $1 AND invitee_id = $2 AND status = 'pending'
            "#
        ))
        .bind(link_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(invitation) = existing {
            timer.record();
            return Ok(RedeemOutcome::Existing(invitation));
        }

        let consumed = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE invite_links
            SET uses = uses + 1
            WHERE id = $1 AND (max_uses IS NULL OR uses < max_uses)
            RETURNING uses
            "#,
        )
        .bind(link_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(uses) = consumed else {
            sqlx::query("UPDATE invite_links SET is_active = FALSE WHERE id = $1")
                .bind(link_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            timer.record();
            return Ok(RedeemOutcome::Exhausted);
        };
        if link.max_uses.is_some_and(|max| uses >= max) {
            sqlx::query("UPDATE invite_links SET is_active = FALSE WHERE id = $1")
                .bind(link_id)
                .execute(&mut *tx)
                .await?;
        }

        let invitation = sqlx::query_as::<_, InvitationEntity>(&format!(
            r#"
            INSERT INTO invitations (group_id, invited_by, invitee_id, role, link_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(link.group_id)
        .bind(link.created_by)
        .bind(user_id)
        .bind(link.role)
        .bind(link_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(RedeemOutcome::Created(invitation))
    }
}

fn is_code_collision(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.constraint() == Some("invite_links_code_key"))
}
