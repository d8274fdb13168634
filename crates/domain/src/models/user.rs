//! User domain models.
//!
//! Authentication belongs to the identity provider; this service only
//! stores the directory fields it needs for invitation resolution plus
//! denormalized display data and status fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A user as this service sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Denormalized list of groups the user belongs to; maintained inside
    /// the same transaction as every membership mutation.
    pub joined_group_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Event payload delivered by the identity provider when a new identity is
/// created. Drives invitation reconciliation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct IdentityCreatedEvent {
    pub user_id: Uuid,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    #[validate(custom(function = "shared::validation::validate_username"))]
    pub username: Option<String>,

    #[validate(custom(function = "shared::validation::validate_phone_number"))]
    pub phone: Option<String>,

    pub display_name: Option<String>,
}

/// Response for the identity-created hook: how many pending invitations
/// were bound to the new identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconciliationResponse {
    pub invitations_bound: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_event_validation() {
        let ok = IdentityCreatedEvent {
            user_id: Uuid::new_v4(),
            email: Some("new.user@example.com".to_string()),
            username: Some("new_user".to_string()),
            phone: Some("+14155550123".to_string()),
            display_name: Some("New User".to_string()),
        };
        assert!(ok.validate().is_ok());

        let bad_email = IdentityCreatedEvent {
            user_id: Uuid::new_v4(),
            email: Some("not-an-email".to_string()),
            username: None,
            phone: None,
            display_name: None,
        };
        assert!(bad_email.validate().is_err());

        let bad_phone = IdentityCreatedEvent {
            user_id: Uuid::new_v4(),
            email: None,
            username: None,
            phone: Some("5550123".to_string()),
            display_name: None,
        };
        assert!(bad_phone.validate().is_err());
    }
}
