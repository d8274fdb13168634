//! Invite link entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::group::GroupRoleDb;

/// Database row mapping for the `invite_links` table.
#[derive(Debug, Clone, FromRow)]
pub struct InviteLinkEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub code: String,
    pub created_by: Uuid,
    pub role: GroupRoleDb,
    pub uses: i32,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<InviteLinkEntity> for domain::models::InviteLink {
    fn from(entity: InviteLinkEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            code: entity.code,
            created_by: entity.created_by,
            role: entity.role.into(),
            uses: entity.uses,
            max_uses: entity.max_uses,
            expires_at: entity.expires_at,
            is_active: entity.is_active,
            created_at: entity.created_at,
        }
    }
}
