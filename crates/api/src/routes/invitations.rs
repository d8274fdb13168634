//! Invitation endpoints: send, list, accept, decline, revoke.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

use domain::models::invitation::{
    InvitationResponse, InviteTarget, ListInvitationsQuery, ListInvitationsResponse,
    SendInvitationRequest,
};
use persistence::entities::InvitationStatusDb;
use persistence::repositories::{
    AcceptOutcome, Addressee, DeclineOutcome, GroupRepository, InvitationRepository, RevokeOutcome,
    SendOutcome, UserRepository,
};
use shared::pagination::PageInfo;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;
use crate::routes::groups::require_membership;

/// The invitation's addressee columns after identifier resolution.
struct ResolvedTarget {
    invitee_id: Option<Uuid>,
    email: Option<String>,
    username: Option<String>,
    phone: Option<String>,
}

impl ResolvedTarget {
    fn resolved(user_id: Uuid) -> Self {
        Self {
            invitee_id: Some(user_id),
            email: None,
            username: None,
            phone: None,
        }
    }
}

/// Resolves an invite target against the user directory. An identifier
/// with no matching user is kept unresolved for later reconciliation.
async fn resolve_target(
    users: &UserRepository,
    target: InviteTarget,
) -> Result<ResolvedTarget, ApiError> {
    match target {
        InviteTarget::UserId(user_id) => {
            users
                .find_by_id(user_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
            Ok(ResolvedTarget {
                invitee_id: Some(user_id),
                email: None,
                username: None,
                phone: None,
            })
        }
        InviteTarget::Email(email) => {
            if !email.validate_email() {
                return Err(ApiError::InvalidArgument("Invalid email address".to_string()));
            }
            match users.find_by_email(&email).await? {
                Some(user) => Ok(ResolvedTarget::resolved(user.id)),
                None => Ok(ResolvedTarget {
                    invitee_id: None,
                    email: Some(email),
                    username: None,
                    phone: None,
                }),
            }
        }
        InviteTarget::Username(username) => {
            shared::validation::validate_username(&username)
                .map_err(|_| ApiError::InvalidArgument("Invalid username".to_string()))?;
            match users.find_by_username(&username).await? {
                Some(user) => Ok(ResolvedTarget::resolved(user.id)),
                None => Ok(ResolvedTarget {
                    invitee_id: None,
                    email: None,
                    username: Some(username),
                    phone: None,
                }),
            }
        }
        InviteTarget::PhoneNumber(phone) => {
            shared::validation::validate_phone_number(&phone)
                .map_err(|_| ApiError::InvalidArgument("Invalid phone number".to_string()))?;
            match users.find_by_phone(&phone).await? {
                Some(user) => Ok(ResolvedTarget::resolved(user.id)),
                None => Ok(ResolvedTarget {
                    invitee_id: None,
                    email: None,
                    username: None,
                    phone: Some(phone),
                }),
            }
        }
    }
}

/// POST /api/v1/groups/:id/invitations
pub async fn send_invitation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(req): Json<SendInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ApiError> {
    req.validate()?;

    if !req.role.is_grantable() {
        return Err(ApiError::InvalidArgument(
            "Invitations cannot grant the owner role".to_string(),
        ));
    }

    let groups = GroupRepository::new(state.pool.clone());
    let actor_role = require_membership(&groups, group_id, auth.user_id).await?;
    if !actor_role.can_manage_settings() {
        return Err(ApiError::PermissionDenied(
            "Only admins and the owner can send invitations".to_string(),
        ));
    }

    let users = UserRepository::new(state.pool.clone());
    let target = resolve_target(&users, req.target).await?;

    let expires_at = req
        .expires_in_days
        .map(|days| Utc::now() + Duration::days(days as i64));

    let repo = InvitationRepository::new(state.pool.clone());
    match repo
        .create(
            group_id,
            auth.user_id,
            target.invitee_id,
            target.email.as_deref(),
            target.username.as_deref(),
            target.phone.as_deref(),
            req.role,
            expires_at,
        )
        .await
    {
        Ok(SendOutcome::Created(invitation)) => {
            let invitation: domain::models::invitation::Invitation = invitation.into();
            Ok((StatusCode::CREATED, Json(invitation.into())))
        }
        Ok(SendOutcome::AlreadyMember) => Err(ApiError::AlreadyExists(
            "The invited user is already a member".to_string(),
        )),
        // Partial unique indexes reject a duplicate pending invitation for
        // the same addressee.
        Err(e) => match ApiError::from(e) {
            ApiError::AlreadyExists(_) => Err(ApiError::AlreadyExists(
                "A pending invitation for this target already exists".to_string(),
            )),
            other => Err(other),
        },
    }
}

/// GET /api/v1/groups/:id/invitations
pub async fn list_group_invitations(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Query(query): Query<ListInvitationsQuery>,
) -> Result<Json<ListInvitationsResponse>, ApiError> {
    let groups = GroupRepository::new(state.pool.clone());
    let actor_role = require_membership(&groups, group_id, auth.user_id).await?;
    if !actor_role.can_manage_settings() {
        return Err(ApiError::PermissionDenied(
            "Only admins and the owner can list invitations".to_string(),
        ));
    }

    let status = query.status.as_deref().and_then(parse_status);
    let page = query.page_query();

    let repo = InvitationRepository::new(state.pool.clone());
    let invitations = repo
        .list_by_group(group_id, status, page.per_page(), page.offset())
        .await?;
    let total = repo.count_by_group(group_id, status).await?;

    Ok(Json(ListInvitationsResponse {
        data: invitations
            .into_iter()
            .map(|entity| {
                let inv: domain::models::invitation::Invitation = entity.into();
                inv.into()
            })
            .collect(),
        pagination: PageInfo::new(&page, total),
    }))
}

fn parse_status(s: &str) -> Option<InvitationStatusDb> {
    match s {
        "pending" => Some(InvitationStatusDb::Pending),
        "accepted" => Some(InvitationStatusDb::Accepted),
        "declined" => Some(InvitationStatusDb::Declined),
        "expired" => Some(InvitationStatusDb::Expired),
        "revoked" => Some(InvitationStatusDb::Revoked),
        _ => None,
    }
}

/// Builds the caller's addressee identity from the user directory. Callers
/// without a directory row can still act on invitations bound to their id.
async fn caller_addressee(
    users: &UserRepository,
    user_id: Uuid,
) -> Result<(Option<String>, Option<String>), ApiError> {
    let row = users.find_by_id(user_id).await?;
    Ok(match row {
        Some(user) => (user.email, user.phone),
        None => (None, None),
    })
}

/// GET /api/v1/invitations
pub async fn list_my_invitations(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<ListInvitationsResponse>, ApiError> {
    let users = UserRepository::new(state.pool.clone());
    let (email, phone) = caller_addressee(&users, auth.user_id).await?;

    let repo = InvitationRepository::new(state.pool.clone());
    let invitations = repo
        .list_for_addressee(Addressee {
            user_id: auth.user_id,
            email: email.as_deref(),
            phone: phone.as_deref(),
        })
        .await?;

    let data: Vec<InvitationResponse> = invitations
        .into_iter()
        .map(|entity| {
            let inv: domain::models::invitation::Invitation = entity.into();
            inv.into()
        })
        .collect();
    let total = data.len() as i64;

    Ok(Json(ListInvitationsResponse {
        data,
        pagination: PageInfo::new(&Default::default(), total),
    }))
}

/// POST /api/v1/invitations/:id/accept
pub async fn accept_invitation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(invitation_id): Path<Uuid>,
) -> Result<Json<InvitationResponse>, ApiError> {
    let users = UserRepository::new(state.pool.clone());
    let (email, phone) = caller_addressee(&users, auth.user_id).await?;

    let repo = InvitationRepository::new(state.pool.clone());
    let outcome = repo
        .accept(
            invitation_id,
            Addressee {
                user_id: auth.user_id,
                email: email.as_deref(),
                phone: phone.as_deref(),
            },
        )
        .await?;

    match outcome {
        AcceptOutcome::Accepted(invitation) => {
            let inv: domain::models::invitation::Invitation = invitation.into();
            Ok(Json(inv.into()))
        }
        AcceptOutcome::NotFound => Err(ApiError::NotFound("Invitation not found".to_string())),
        AcceptOutcome::NotAddressee => Err(ApiError::PermissionDenied(
            "This invitation is addressed to someone else".to_string(),
        )),
        AcceptOutcome::NotPending(status) => Err(ApiError::FailedPrecondition(format!(
            "Invitation is already {}",
            domain::models::invitation::InvitationStatus::from(status)
        ))),
        AcceptOutcome::Expired => Err(ApiError::DeadlineExceeded(
            "Invitation has expired".to_string(),
        )),
    }
}

/// POST /api/v1/invitations/:id/decline
pub async fn decline_invitation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(invitation_id): Path<Uuid>,
) -> Result<Json<InvitationResponse>, ApiError> {
    let users = UserRepository::new(state.pool.clone());
    let (email, phone) = caller_addressee(&users, auth.user_id).await?;

    let repo = InvitationRepository::new(state.pool.clone());
    let outcome = repo
        .decline(
            invitation_id,
            Addressee {
                user_id: auth.user_id,
                email: email.as_deref(),
                phone: phone.as_deref(),
            },
        )
        .await?;

    match outcome {
        DeclineOutcome::Declined(invitation) => {
            let inv: domain::models::invitation::Invitation = invitation.into();
            Ok(Json(inv.into()))
        }
        DeclineOutcome::NotFound => Err(ApiError::NotFound("Invitation not found".to_string())),
        DeclineOutcome::NotAddressee => Err(ApiError::PermissionDenied(
            "This invitation is addressed to someone else".to_string(),
        )),
        DeclineOutcome::NotPending(status) => Err(ApiError::FailedPrecondition(format!(
            "Invitation is already {}",
            domain::models::invitation::InvitationStatus::from(status)
        ))),
        DeclineOutcome::Expired => Err(ApiError::DeadlineExceeded(
            "Invitation has expired".to_string(),
        )),
    }
}

/// DELETE /api/v1/groups/:id/invitations/:invitation_id
pub async fn revoke_invitation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path((group_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let groups = GroupRepository::new(state.pool.clone());
    let actor_role = require_membership(&groups, group_id, auth.user_id).await?;
    if !actor_role.can_manage_settings() {
        return Err(ApiError::PermissionDenied(
            "Only admins and the owner can revoke invitations".to_string(),
        ));
    }

    let repo = InvitationRepository::new(state.pool.clone());
    match repo.revoke(group_id, invitation_id).await? {
        RevokeOutcome::Revoked => Ok(StatusCode::NO_CONTENT),
        RevokeOutcome::NotPending => Err(ApiError::FailedPrecondition(
            "Only pending invitations can be revoked".to_string(),
        )),
        RevokeOutcome::NotFound => Err(ApiError::NotFound("Invitation not found".to_string())),
    }
}
