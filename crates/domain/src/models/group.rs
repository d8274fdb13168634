//! Group domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::role::GroupRole;

/// A social group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    /// Denormalized count of live member rows; maintained inside the same
    /// transaction as every membership mutation.
    pub member_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateGroupRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub is_public: bool,
}

/// Request payload for updating group details.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateGroupRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub is_public: Option<bool>,
}

/// Response for group detail endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub member_count: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_role: Option<GroupRole>,
}

impl GroupResponse {
    pub fn from_group(group: Group, your_role: Option<GroupRole>) -> Self {
        Self {
            id: group.id,
            name: group.name,
            description: group.description,
            is_public: group.is_public,
            member_count: group.member_count,
            created_by: group.created_by,
            created_at: group.created_at,
            your_role,
        }
    }
}

/// Response for listing the caller's groups.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ListGroupsResponse {
    pub data: Vec<GroupResponse>,
    pub count: usize,
}

/// Result of leaving a group or removing a member.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LeaveGroupResponse {
    /// True when the departure dissolved the group.
    pub group_deleted: bool,
    /// Set when the departing owner's role was handed to another member.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_owner_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_create_group_request_name_bounds() {
        let ok = CreateGroupRequest {
            name: "Tuesday Hikers".to_string(),
            description: Some("Weekly hikes".to_string()),
            is_public: true,
        };
        assert!(ok.validate().is_ok());

        let empty_name = CreateGroupRequest {
            name: String::new(),
            description: None,
            is_public: false,
        };
        assert!(empty_name.validate().is_err());

        let long_name = CreateGroupRequest {
            name: "x".repeat(101),
            description: None,
            is_public: false,
        };
        assert!(long_name.validate().is_err());
    }

    #[test]
    fn test_create_group_request_description_bound() {
        let long_description = CreateGroupRequest {
            name: "ok".to_string(),
            description: Some("d".repeat(1001)),
            is_public: false,
        };
        assert!(long_description.validate().is_err());

        let max_description = CreateGroupRequest {
            name: "ok".to_string(),
            description: Some("d".repeat(1000)),
            is_public: false,
        };
        assert!(max_description.validate().is_ok());
    }
}
