//! Invitation repository.
//!
//! Invitations move PENDING -> {ACCEPTED, DECLINED, EXPIRED, REVOKED};
//! terminal states never transition again. Duplicate-pending protection
//! lives in partial unique indexes, so concurrent sends race safely.

use chrono::{DateTime, Utc};
use domain::models::role::GroupRole;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

use crate::entities::{GroupRoleDb, InvitationEntity, InvitationStatusDb};
use crate::metrics::QueryTimer;
use crate::repositories::group::{append_joined_group, bump_member_count, insert_member};

const INVITATION_COLUMNS: &str = "id, group_id, invited_by, invitee_id, email, username, phone, \
     role, status, created_at, expires_at, link_id";

/// Result of sending an invitation.
#[derive(Debug)]
pub enum SendOutcome {
    Created(InvitationEntity),
    AlreadyMember,
}

/// Result of an accept attempt.
#[derive(Debug)]
pub enum AcceptOutcome {
    Accepted(InvitationEntity),
    NotFound,
    NotAddressee,
    NotPending(InvitationStatusDb),
    Expired,
}

/// Result of a decline attempt.
#[derive(Debug)]
pub enum DeclineOutcome {
    Declined(InvitationEntity),
    NotFound,
    NotAddressee,
    NotPending(InvitationStatusDb),
    Expired,
}

/// Result of a revoke attempt.
#[derive(Debug)]
pub enum RevokeOutcome {
    Revoked,
    NotPending,
    NotFound,
}

/// The caller's identity, for matching against an invitation's addressee.
#[derive(Debug, Clone, Copy)]
pub struct Addressee<'a> {
    pub user_id: Uuid,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
}

impl Addressee<'_> {
    /// Whether this caller is who the invitation is addressed to. An
    /// invitation with no target at all is claimable by anyone who holds
    /// its id.
    fn matches(&self, inv: &InvitationEntity) -> bool {
        if let Some(invitee_id) = inv.invitee_id {
            return invitee_id == self.user_id;
        }
        let email_match = match (&inv.email, self.email) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };
        let phone_match = match (&inv.phone, self.phone) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        let untargeted = inv.email.is_none() && inv.username.is_none() && inv.phone.is_none();
        email_match || phone_match || untargeted
    }
}

/// Repository for invitation operations.
#[derive(Clone)]
pub struct InvitationRepository {
    pool: PgPool,
}

impl InvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a PENDING invitation. At most one of `email`/`username`/
    /// `phone` is set when `invitee_id` is unresolved; a duplicate pending
    /// target surfaces as a unique violation for the caller to map.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        group_id: Uuid,
        invited_by: Uuid,
        invitee_id: Option<Uuid>,
        email: Option<&str>,
        username: Option<&str>,
        phone: Option<&str>,
        role: GroupRole,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<SendOutcome, sqlx::Error> {
        let timer = QueryTimer::new("create_invitation");
        let mut tx = self.pool.begin().await?;

        if let Some(invitee) = invitee_id {
            let is_member = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
            )
            .bind(group_id)
            .bind(invitee)
            .fetch_one(&mut *tx)
            .await?;
            if is_member {
                timer.record();
                return Ok(SendOutcome::AlreadyMember);
            }
        }

        let role_db: GroupRoleDb = role.into();
        let invitation = sqlx::query_as::<_, InvitationEntity>(&format!(
            r#"
            INSERT INTO invitations (group_id, invited_by, invitee_id, email, username, phone, role, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(group_id)
        .bind(invited_by)
        .bind(invitee_id)
        .bind(email)
        .bind(username)
        .bind(phone)
        .bind(role_db)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(SendOutcome::Created(invitation))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_invitation_by_id");
        let result = sqlx::query_as::<_, InvitationEntity>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List a group's invitations, optionally filtered by status.
    pub async fn list_by_group(
        &self,
        group_id: Uuid,
        status: Option<InvitationStatusDb>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_group_invitations");
        let result = if let Some(status) = status {
            sqlx::query_as::<_, InvitationEntity>(&format!(
                r#"
                SELECT {INVITATION_COLUMNS}
                FROM invitations
                WHERE group_id = $1 AND status = $2
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#
            ))
            .bind(group_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, InvitationEntity>(&format!(
                r#"
                SELECT {INVITATION_COLUMNS}
                FROM invitations
                WHERE group_id = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#
            ))
            .bind(group_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        };
        timer.record();
        result
    }

    pub async fn count_by_group(
        &self,
        group_id: Uuid,
        status: Option<InvitationStatusDb>,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_group_invitations");
        let result = if let Some(status) = status {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM invitations WHERE group_id = $1 AND status = $2",
            )
            .bind(group_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await
        } else {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invitations WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&self.pool)
                .await
        };
        timer.record();
        result
    }

    /// Pending invitations addressed to the caller: bound to their id, or
    /// still unresolved but matching their verified email/phone.
    pub async fn list_for_addressee(
        &self,
        addressee: Addressee<'_>,
    ) -> Result<Vec<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_invitations_for_addressee");
        let result = sqlx::query_as::<_, InvitationEntity>(&format!(
            r#"
            SELECT {INVITATION_COLUMNS}
            FROM invitations
            WHERE status = 'pending'
              AND (
                  invitee_id = $1
                  OR (invitee_id IS NULL AND $2::text IS NOT NULL AND LOWER(email) = LOWER($2))
                  OR (invitee_id IS NULL AND $3::text IS NOT NULL AND phone = $3)
              )
            ORDER BY created_at DESC
            "#
        ))
        .bind(addressee.user_id)
        .bind(addressee.email)
        .bind(addressee.phone)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Accept an invitation: bind it to the caller if unresolved, add the
    /// membership, and mark ACCEPTED, all in one transaction.
    pub async fn accept(
        &self,
        invitation_id: Uuid,
        addressee: Addressee<'_>,
    ) -> Result<AcceptOutcome, sqlx::Error> {
        let timer = QueryTimer::new("accept_invitation");
        let mut tx = self.pool.begin().await?;

        let invitation = match lock_pending(&mut tx, invitation_id, &addressee).await? {
            Ok(inv) => inv,
            Err(outcome) => {
                tx.commit().await?;
                timer.record();
                return Ok(outcome);
            }
        };

        if invitation.invitee_id.is_none() {
            sqlx::query("UPDATE invitations SET invitee_id = $2 WHERE id = $1")
                .bind(invitation_id)
                .bind(addressee.user_id)
                .execute(&mut *tx)
                .await?;
        }

        let is_member = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(invitation.group_id)
        .bind(addressee.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if !is_member {
            insert_member(
                &mut tx,
                invitation.group_id,
                addressee.user_id,
                invitation.role.into(),
            )
            .await?;
            bump_member_count(&mut tx, invitation.group_id, 1).await?;
        }
        append_joined_group(&mut tx, addressee.user_id, invitation.group_id).await?;

        let accepted = sqlx::query_as::<_, InvitationEntity>(&format!(
            "UPDATE invitations SET status = 'accepted' WHERE id = $1 RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(invitation_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(AcceptOutcome::Accepted(accepted))
    }

    /// Decline an invitation; only the status changes.
    pub async fn decline(
        &self,
        invitation_id: Uuid,
        addressee: Addressee<'_>,
    ) -> Result<DeclineOutcome, sqlx::Error> {
        let timer = QueryTimer::new("decline_invitation");
        let mut tx = self.pool.begin().await?;

        if let Err(outcome) = lock_pending(&mut tx, invitation_id, &addressee).await? {
            tx.commit().await?;
            timer.record();
            return Ok(match outcome {
                AcceptOutcome::NotFound => DeclineOutcome::NotFound,
                AcceptOutcome::NotAddressee => DeclineOutcome::NotAddressee,
                AcceptOutcome::NotPending(s) => DeclineOutcome::NotPending(s),
                AcceptOutcome::Expired => DeclineOutcome::Expired,
                AcceptOutcome::Accepted(_) => unreachable!(),
            });
        }

        let declined = sqlx::query_as::<_, InvitationEntity>(&format!(
            "UPDATE invitations SET status = 'declined' WHERE id = $1 RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(invitation_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(DeclineOutcome::Declined(declined))
    }

    /// Revoke a PENDING invitation belonging to the given group.
    pub async fn revoke(
        &self,
        group_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<RevokeOutcome, sqlx::Error> {
        let timer = QueryTimer::new("revoke_invitation");
        let affected = sqlx::query(
            r#"
            UPDATE invitations
            SET status = 'revoked'
            WHERE id = $1 AND group_id = $2 AND status = 'pending'
            "#,
        )
        .bind(invitation_id)
        .bind(group_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let outcome = if affected > 0 {
            RevokeOutcome::Revoked
        } else {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM invitations WHERE id = $1 AND group_id = $2)",
            )
            .bind(invitation_id)
            .bind(group_id)
            .fetch_one(&self.pool)
            .await?;
            if exists {
                RevokeOutcome::NotPending
            } else {
                RevokeOutcome::NotFound
            }
        };
        timer.record();
        Ok(outcome)
    }

    /// Bind pending unresolved invitations matching a freshly created
    /// identity's email or phone. Runs in bounded batches; a failing batch
    /// is logged and abandoned, leaving its invitations claimable later
    /// through the accept-time match path.
    pub async fn bind_unresolved(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        phone: Option<&str>,
        batch_size: i64,
    ) -> Result<u64, sqlx::Error> {
        if email.is_none() && phone.is_none() {
            return Ok(0);
        }
        let timer = QueryTimer::new("bind_unresolved_invitations");
        let mut total = 0u64;
        loop {
            let batch = sqlx::query(
                r#"
                UPDATE invitations
                SET invitee_id = $1
                WHERE id IN (
                    SELECT i.id
                    FROM invitations i
                    WHERE i.status = 'pending'
                      AND i.invitee_id IS NULL
                      AND (
                          ($2::text IS NOT NULL AND LOWER(i.email) = LOWER($2))
                          OR ($3::text IS NOT NULL AND i.phone = $3)
                      )
                      AND NOT EXISTS (
                          SELECT 1 FROM invitations dup
                          WHERE dup.group_id = i.group_id
                            AND dup.invitee_id = $1
                            AND dup.status = 'pending'
                      )
                    LIMIT $4
                )
                "#,
            )
            .bind(user_id)
            .bind(email)
            .bind(phone)
            .bind(batch_size)
            .execute(&self.pool)
            .await;

            match batch {
                Ok(result) => {
                    let affected = result.rows_affected();
                    total += affected;
                    if affected < batch_size as u64 {
                        break;
                    }
                }
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "invitation binding batch failed");
                    break;
                }
            }
        }
        timer.record();
        Ok(total)
    }
}

/// Fetch and lock an invitation, checking state and addressee. Returns the
/// row when it is actionable by this caller; otherwise the outcome to
/// report. A lazily detected expiry is persisted before returning.
async fn lock_pending(
    tx: &mut Transaction<'_, Postgres>,
    invitation_id: Uuid,
    addressee: &Addressee<'_>,
) -> Result<Result<InvitationEntity, AcceptOutcome>, sqlx::Error> {
    let invitation = sqlx::query_as::<_, InvitationEntity>(&format!(
        "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1 FOR UPDATE"
    ))
    .bind(invitation_id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(invitation) = invitation else {
        return Ok(Err(AcceptOutcome::NotFound));
    };
    if invitation.status != InvitationStatusDb::Pending {
        return Ok(Err(AcceptOutcome::NotPending(invitation.status)));
    }
    if let Some(expires_at) = invitation.expires_at {
        if expires_at <= Utc::now() {
            sqlx::query("UPDATE invitations SET status = 'expired' WHERE id = $1")
                .bind(invitation_id)
                .execute(&mut **tx)
                .await?;
            return Ok(Err(AcceptOutcome::Expired));
        }
    }
    if !addressee.matches(&invitation) {
        return Ok(Err(AcceptOutcome::NotAddressee));
    }
    Ok(Ok(invitation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn invitation(invitee_id: Option<Uuid>, email: Option<&str>) -> InvitationEntity {
        InvitationEntity {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            invited_by: Uuid::new_v4(),
            invitee_id,
            email: email.map(str::to_string),
            username: None,
            phone: None,
            role: GroupRoleDb::Member,
            status: InvitationStatusDb::Pending,
            created_at: Utc::now(),
            expires_at: None,
            link_id: None,
        }
    }

    #[test]
    fn test_addressee_matches_resolved_id() {
        let user_id = Uuid::new_v4();
        let inv = invitation(Some(user_id), Some("other@example.com"));
        let me = Addressee {
            user_id,
            email: None,
            phone: None,
        };
        assert!(me.matches(&inv));

        let stranger = Addressee {
            user_id: Uuid::new_v4(),
            email: Some("other@example.com"),
            phone: None,
        };
        // Once resolved, only the bound id counts.
        assert!(!stranger.matches(&inv));
    }

    #[test]
    fn test_addressee_matches_unresolved_email_case_insensitive() {
        let inv = invitation(None, Some("Casey@Example.com"));
        let caller = Addressee {
            user_id: Uuid::new_v4(),
            email: Some("casey@example.com"),
            phone: None,
        };
        assert!(caller.matches(&inv));
    }

    #[test]
    fn test_untargeted_invitation_claimable_by_anyone() {
        let inv = invitation(None, None);
        let caller = Addressee {
            user_id: Uuid::new_v4(),
            email: None,
            phone: None,
        };
        assert!(caller.matches(&inv));
    }

    #[test]
    fn test_unresolved_username_target_not_claimable_by_identifier() {
        let mut inv = invitation(None, None);
        inv.username = Some("someone_else".to_string());
        let caller = Addressee {
            user_id: Uuid::new_v4(),
            email: Some("me@example.com"),
            phone: None,
        };
        assert!(!caller.matches(&inv));
    }
}
