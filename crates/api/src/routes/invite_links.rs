//! Invite link endpoints: create, list, revoke, redeem.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use domain::models::invite_link::{
    CreateLinkRequest, InviteLinkResponse, ListInviteLinksResponse, RedeemLinkResponse,
};
use persistence::repositories::{GroupRepository, InviteLinkRepository, RedeemOutcome};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;
use crate::routes::groups::require_membership;

/// POST /api/v1/groups/:id/links
pub async fn create_link(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(req): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<InviteLinkResponse>), ApiError> {
    req.validate()?;

    if !req.role.is_grantable() {
        return Err(ApiError::InvalidArgument(
            "Invite links cannot grant the owner role".to_string(),
        ));
    }

    let groups = GroupRepository::new(state.pool.clone());
    let actor_role = require_membership(&groups, group_id, auth.user_id).await?;
    if !actor_role.can_manage_settings() {
        return Err(ApiError::PermissionDenied(
            "Only admins and the owner can create invite links".to_string(),
        ));
    }

    let repo = InviteLinkRepository::new(state.pool.clone());
    let link = repo
        .create(group_id, auth.user_id, req.role, req.max_uses, req.expires_at)
        .await?;

    let link: domain::models::invite_link::InviteLink = link.into();
    Ok((StatusCode::CREATED, Json(link.into())))
}

/// GET /api/v1/groups/:id/links
pub async fn list_links(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<ListInviteLinksResponse>, ApiError> {
    let groups = GroupRepository::new(state.pool.clone());
    let actor_role = require_membership(&groups, group_id, auth.user_id).await?;
    if !actor_role.can_manage_settings() {
        return Err(ApiError::PermissionDenied(
            "Only admins and the owner can list invite links".to_string(),
        ));
    }

    let repo = InviteLinkRepository::new(state.pool.clone());
    let links = repo.list_by_group(group_id).await?;

    let data: Vec<InviteLinkResponse> = links
        .into_iter()
        .map(|entity| {
            let link: domain::models::invite_link::InviteLink = entity.into();
            link.into()
        })
        .collect();
    let count = data.len();

    Ok(Json(ListInviteLinksResponse { data, count }))
}

/// DELETE /api/v1/groups/:id/links/:link_id
pub async fn revoke_link(
    State(state): State<AppState>,
    auth: UserAuth,
    Path((group_id, link_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let groups = GroupRepository::new(state.pool.clone());
    let actor_role = require_membership(&groups, group_id, auth.user_id).await?;
    if !actor_role.can_manage_settings() {
        return Err(ApiError::PermissionDenied(
            "Only admins and the owner can revoke invite links".to_string(),
        ));
    }

    let repo = InviteLinkRepository::new(state.pool.clone());
    if repo.revoke(group_id, link_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Invite link not found".to_string()))
    }
}

/// POST /api/v1/links/:code/redeem
///
/// Two phases: a cheap un-transacted lookup rejects dead links and
/// deactivates expired or exhausted ones, then the transactional redemption
/// consumes a use (or returns the caller's existing pending invitation).
pub async fn redeem_link(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(code): Path<String>,
) -> Result<(StatusCode, Json<RedeemLinkResponse>), ApiError> {
    let repo = InviteLinkRepository::new(state.pool.clone());

    let entity = repo
        .find_by_code(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invite link not found".to_string()))?;
    let link: domain::models::invite_link::InviteLink = entity.into();

    // Expiry and exhaustion outrank the active flag so a link that died on
    // its own terms keeps reporting why, not just that it is gone.
    if link.is_past_expiry(Utc::now()) {
        if link.is_active {
            repo.deactivate(link.id).await?;
        }
        return Err(ApiError::DeadlineExceeded("Invite link has expired".to_string()));
    }
    if link.is_exhausted() {
        if link.is_active {
            repo.deactivate(link.id).await?;
        }
        return Err(ApiError::ResourceExhausted(
            "Invite link has no uses left".to_string(),
        ));
    }
    if !link.is_active {
        return Err(ApiError::NotFound("Invite link not found".to_string()));
    }

    match repo.redeem(link.id, auth.user_id).await? {
        RedeemOutcome::Existing(invitation) | RedeemOutcome::Created(invitation) => {
            let inv: domain::models::invitation::Invitation = invitation.into();
            Ok((
                StatusCode::CREATED,
                Json(RedeemLinkResponse {
                    invitation_id: inv.id,
                    group_id: inv.group_id,
                    role: inv.role,
                    status: inv.status,
                }),
            ))
        }
        RedeemOutcome::Exhausted => Err(ApiError::ResourceExhausted(
            "Invite link has no uses left".to_string(),
        )),
        RedeemOutcome::Expired => Err(ApiError::DeadlineExceeded(
            "Invite link has expired".to_string(),
        )),
        RedeemOutcome::Inactive => Err(ApiError::NotFound("Invite link not found".to_string())),
    }
}
