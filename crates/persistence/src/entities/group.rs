//! Group and membership entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::role::GroupRole;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum mapping for the `group_role` PostgreSQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "group_role", rename_all = "lowercase")]
pub enum GroupRoleDb {
    Member,
    Moderator,
    Admin,
    Owner,
}

impl From<GroupRoleDb> for GroupRole {
    fn from(db_role: GroupRoleDb) -> Self {
        match db_role {
            GroupRoleDb::Member => GroupRole::Member,
            GroupRoleDb::Moderator => GroupRole::Moderator,
            GroupRoleDb::Admin => GroupRole::Admin,
            GroupRoleDb::Owner => GroupRole::Owner,
        }
    }
}

impl From<GroupRole> for GroupRoleDb {
    fn from(role: GroupRole) -> Self {
        match role {
            GroupRole::Member => GroupRoleDb::Member,
            GroupRole::Moderator => GroupRoleDb::Moderator,
            GroupRole::Admin => GroupRoleDb::Admin,
            GroupRole::Owner => GroupRoleDb::Owner,
        }
    }
}

/// Database row mapping for the `groups` table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub member_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<GroupEntity> for domain::models::Group {
    fn from(entity: GroupEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            is_public: entity.is_public,
            member_count: entity.member_count,
            created_by: entity.created_by,
            created_at: entity.created_at,
        }
    }
}

/// A group row joined with the requesting user's membership role.
#[derive(Debug, Clone, FromRow)]
pub struct GroupWithRoleEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub member_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub role: GroupRoleDb,
}

impl GroupWithRoleEntity {
    pub fn into_parts(self) -> (domain::models::Group, GroupRole) {
        let role = self.role.into();
        let group = domain::models::Group {
            id: self.id,
            name: self.name,
            description: self.description,
            is_public: self.is_public,
            member_count: self.member_count,
            created_by: self.created_by,
            created_at: self.created_at,
        };
        (group, role)
    }
}

/// Database row mapping for the `group_members` table.
#[derive(Debug, Clone, FromRow)]
pub struct MemberEntity {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: GroupRoleDb,
    pub joined_at: DateTime<Utc>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<MemberEntity> for domain::models::Member {
    fn from(entity: MemberEntity) -> Self {
        Self {
            group_id: entity.group_id,
            user_id: entity.user_id,
            role: entity.role.into(),
            joined_at: entity.joined_at,
            display_name: entity.display_name,
            avatar_url: entity.avatar_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_db_roundtrip() {
        for role in [
            GroupRole::Member,
            GroupRole::Moderator,
            GroupRole::Admin,
            GroupRole::Owner,
        ] {
            let db: GroupRoleDb = role.into();
            let back: GroupRole = db.into();
            assert_eq!(back, role);
        }
    }
}
