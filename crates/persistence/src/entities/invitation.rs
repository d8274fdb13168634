//! Invitation entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::invitation::InvitationStatus;
use sqlx::FromRow;
use uuid::Uuid;

use super::group::GroupRoleDb;

/// Database enum mapping for the `invitation_status` PostgreSQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
pub enum InvitationStatusDb {
    Pending,
    Accepted,
    Declined,
    Expired,
    Revoked,
}

impl From<InvitationStatusDb> for InvitationStatus {
    fn from(db_status: InvitationStatusDb) -> Self {
        match db_status {
            InvitationStatusDb::Pending => InvitationStatus::Pending,
            InvitationStatusDb::Accepted => InvitationStatus::Accepted,
            InvitationStatusDb::Declined => InvitationStatus::Declined,
            InvitationStatusDb::Expired => InvitationStatus::Expired,
            InvitationStatusDb::Revoked => InvitationStatus::Revoked,
        }
    }
}

impl From<InvitationStatus> for InvitationStatusDb {
    fn from(status: InvitationStatus) -> Self {
        match status {
            InvitationStatus::Pending => InvitationStatusDb::Pending,
            InvitationStatus::Accepted => InvitationStatusDb::Accepted,
            InvitationStatus::Declined => InvitationStatusDb::Declined,
            InvitationStatus::Expired => InvitationStatusDb::Expired,
            InvitationStatus::Revoked => InvitationStatusDb::Revoked,
        }
    }
}

/// Database row mapping for the `invitations` table.
#[derive(Debug, Clone, FromRow)]
pub struct InvitationEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub invited_by: Uuid,
    pub invitee_id: Option<Uuid>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub role: GroupRoleDb,
    pub status: InvitationStatusDb,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub link_id: Option<Uuid>,
}

impl From<InvitationEntity> for domain::models::Invitation {
    fn from(entity: InvitationEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            invited_by: entity.invited_by,
            invitee_id: entity.invitee_id,
            email: entity.email,
            username: entity.username,
            phone: entity.phone,
            role: entity.role.into(),
            status: entity.status.into(),
            created_at: entity.created_at,
            expires_at: entity.expires_at,
            link_id: entity.link_id,
        }
    }
}
