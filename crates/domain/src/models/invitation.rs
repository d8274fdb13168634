//! Invitation domain models and the invitation state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::role::GroupRole;

/// Lifecycle state of an invitation.
///
/// `Pending` is the only non-terminal state; no transition leaves a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Revoked => "revoked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The addressee of an invitation: exactly one identifier kind.
///
/// A `UserId` target is born resolved; the other kinds are resolved against
/// the user directory at send time when possible, otherwise reconciled when
/// a matching identity is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum InviteTarget {
    UserId(Uuid),
    Email(String),
    Username(String),
    PhoneNumber(String),
}

/// An offer to join a group, addressed to one identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Invitation {
    pub id: Uuid,
    pub group_id: Uuid,
    pub invited_by: Uuid,
    /// Resolved identity, if known.
    pub invitee_id: Option<Uuid>,
    /// Unresolved identifiers; at most one is set while `invitee_id` is
    /// empty.
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub role: GroupRole,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Back-reference to the invite link this invitation was redeemed from.
    pub link_id: Option<Uuid>,
}

impl Invitation {
    /// Whether the invitation's expiry has passed.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

/// Request payload for sending an invitation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SendInvitationRequest {
    pub target: InviteTarget,
    pub role: GroupRole,
    #[validate(range(min = 1, max = 365, message = "Expiry must be 1-365 days"))]
    pub expires_in_days: Option<i32>,
}

/// Query parameters for listing a group's invitations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListInvitationsQuery {
    /// One of `pending`, `accepted`, `declined`, `expired`, `revoked`;
    /// anything else (or absence) lists all.
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListInvitationsQuery {
    pub fn page_query(&self) -> shared::pagination::PageQuery {
        shared::pagination::PageQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// A single invitation in API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationResponse {
    pub id: Uuid,
    pub group_id: Uuid,
    pub invited_by: Uuid,
    pub invitee_id: Option<Uuid>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub role: GroupRole,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub link_id: Option<Uuid>,
}

impl From<Invitation> for InvitationResponse {
    fn from(inv: Invitation) -> Self {
        Self {
            id: inv.id,
            group_id: inv.group_id,
            invited_by: inv.invited_by,
            invitee_id: inv.invitee_id,
            email: inv.email,
            username: inv.username,
            phone: inv.phone,
            role: inv.role,
            status: inv.status,
            created_at: inv.created_at,
            expires_at: inv.expires_at,
            link_id: inv.link_id,
        }
    }
}

/// Response for listing invitations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ListInvitationsResponse {
    pub data: Vec<InvitationResponse>,
    pub pagination: shared::pagination::PageInfo,
}
