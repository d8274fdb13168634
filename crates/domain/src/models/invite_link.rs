//! Managed invite link domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::role::GroupRole;

/// A reusable invite code scoped to a group.
///
/// Invariant: `uses` never exceeds `max_uses` when set; reaching the limit
/// or the expiry deactivates the link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InviteLink {
    pub id: Uuid,
    pub group_id: Uuid,
    pub code: String,
    pub created_by: Uuid,
    pub role: GroupRole,
    pub uses: i32,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl InviteLink {
    /// Whether the link's expiry has passed.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    /// Whether the use counter has reached its cap.
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.map(|max| self.uses >= max).unwrap_or(false)
    }
}

/// Request payload for creating an invite link.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateLinkRequest {
    pub role: GroupRole,

    #[validate(range(min = 1, max = 10_000, message = "Max uses must be 1-10000"))]
    pub max_uses: Option<i32>,

    #[validate(custom(function = "shared::validation::validate_future_timestamp"))]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A single link in API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InviteLinkResponse {
    pub id: Uuid,
    pub group_id: Uuid,
    pub code: String,
    pub created_by: Uuid,
    pub role: GroupRole,
    pub uses: i32,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<InviteLink> for InviteLinkResponse {
    fn from(link: InviteLink) -> Self {
        Self {
            id: link.id,
            group_id: link.group_id,
            code: link.code,
            created_by: link.created_by,
            role: link.role,
            uses: link.uses,
            max_uses: link.max_uses,
            expires_at: link.expires_at,
            is_active: link.is_active,
            created_at: link.created_at,
        }
    }
}

/// Response for listing a group's invite links.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ListInviteLinksResponse {
    pub data: Vec<InviteLinkResponse>,
    pub count: usize,
}

/// Response for redeeming a link: the pending invitation issued (or
/// re-returned) for the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RedeemLinkResponse {
    pub invitation_id: Uuid,
    pub group_id: Uuid,
    pub role: GroupRole,
    pub status: super::invitation::InvitationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(uses: i32, max_uses: Option<i32>, expires_at: Option<DateTime<Utc>>) -> InviteLink {
        InviteLink {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            code: "AbCdEfGh".to_string(),
            created_by: Uuid::new_v4(),
            role: GroupRole::Member,
            uses,
            max_uses,
            expires_at,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_exhaustion() {
        assert!(!link(0, None, None).is_exhausted());
        assert!(!link(100, None, None).is_exhausted());
        assert!(!link(2, Some(3), None).is_exhausted());
        assert!(link(3, Some(3), None).is_exhausted());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        assert!(!link(0, None, None).is_past_expiry(now));
        assert!(link(0, None, Some(now - Duration::hours(1))).is_past_expiry(now));
        assert!(!link(0, None, Some(now + Duration::hours(1))).is_past_expiry(now));
    }

    #[test]
    fn test_create_link_request_validation() {
        let ok = CreateLinkRequest {
            role: GroupRole::Member,
            max_uses: Some(5),
            expires_at: Some(Utc::now() + Duration::days(7)),
        };
        assert!(ok.validate().is_ok());

        let zero_uses = CreateLinkRequest {
            role: GroupRole::Member,
            max_uses: Some(0),
            expires_at: None,
        };
        assert!(zero_uses.validate().is_err());

        let past_expiry = CreateLinkRequest {
            role: GroupRole::Member,
            max_uses: None,
            expires_at: Some(Utc::now() - Duration::days(1)),
        };
        assert!(past_expiry.validate().is_err());
    }
}
