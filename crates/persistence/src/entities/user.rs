//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub joined_group_ids: Vec<Uuid>,
    pub active_status_id: String,
    pub status_custom_text: Option<String>,
    pub status_custom_icon_key: Option<String>,
    pub status_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<UserEntity> for domain::models::User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            email: entity.email,
            username: entity.username,
            phone: entity.phone,
            display_name: entity.display_name,
            avatar_url: entity.avatar_url,
            joined_group_ids: entity.joined_group_ids,
            created_at: entity.created_at,
        }
    }
}

