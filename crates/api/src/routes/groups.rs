//! Group CRUD and join endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use domain::models::group::{
    CreateGroupRequest, GroupResponse, ListGroupsResponse, UpdateGroupRequest,
};
use domain::models::member::MemberResponse;
use domain::models::role::GroupRole;
use persistence::repositories::{GroupRepository, JoinOutcome};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;

/// Looks up the caller's role in a group, hiding private groups from
/// non-members.
pub(crate) async fn require_membership(
    repo: &GroupRepository,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<GroupRole, ApiError> {
    let group = repo
        .find_by_id(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    match repo.get_membership(group_id, user_id).await? {
        Some(member) => Ok(member.role.into()),
        None if group.is_public => {
            Err(ApiError::PermissionDenied("You are not a member of this group".to_string()))
        }
        None => Err(ApiError::NotFound("Group not found".to_string())),
    }
}

/// POST /api/v1/groups
pub async fn create_group(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupResponse>), ApiError> {
    req.validate()?;

    let repo = GroupRepository::new(state.pool.clone());
    let group = repo
        .create_group(&req.name, req.description.as_deref(), req.is_public, auth.user_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GroupResponse::from_group(group.into(), Some(GroupRole::Owner))),
    ))
}

/// GET /api/v1/groups
pub async fn list_my_groups(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<ListGroupsResponse>, ApiError> {
    let repo = GroupRepository::new(state.pool.clone());
    let groups = repo.find_user_groups(auth.user_id).await?;

    let data: Vec<GroupResponse> = groups
        .into_iter()
        .map(|entity| {
            let (group, role) = entity.into_parts();
            GroupResponse::from_group(group, Some(role))
        })
        .collect();
    let count = data.len();

    Ok(Json(ListGroupsResponse { data, count }))
}

/// GET /api/v1/groups/:id
pub async fn get_group(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupResponse>, ApiError> {
    let repo = GroupRepository::new(state.pool.clone());
    let group = repo
        .find_by_id(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    let membership = repo.get_membership(group_id, auth.user_id).await?;

    // Private groups do not exist for outsiders.
    if !group.is_public && membership.is_none() {
        return Err(ApiError::NotFound("Group not found".to_string()));
    }

    let your_role = membership.map(|m| m.role.into());
    Ok(Json(GroupResponse::from_group(group.into(), your_role)))
}

/// PUT /api/v1/groups/:id
pub async fn update_group(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    req.validate()?;

    let repo = GroupRepository::new(state.pool.clone());
    let role = require_membership(&repo, group_id, auth.user_id).await?;
    if !role.can_manage_settings() {
        return Err(ApiError::PermissionDenied(
            "Only admins and the owner can change group settings".to_string(),
        ));
    }

    let updated = repo
        .update_group(group_id, req.name.as_deref(), req.description.as_deref(), req.is_public)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))?;

    Ok(Json(GroupResponse::from_group(updated.into(), Some(role))))
}

/// POST /api/v1/groups/:id/join
pub async fn join_group(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    let repo = GroupRepository::new(state.pool.clone());

    match repo.join_public_group(group_id, auth.user_id).await? {
        JoinOutcome::Joined(member) => {
            let member: domain::models::member::Member = member.into();
            Ok((StatusCode::CREATED, Json(member.into())))
        }
        JoinOutcome::AlreadyMember => Err(ApiError::AlreadyExists(
            "You are already a member of this group".to_string(),
        )),
        JoinOutcome::NotPublic => Err(ApiError::FailedPrecondition(
            "This group is invite-only".to_string(),
        )),
        JoinOutcome::GroupMissing => Err(ApiError::NotFound("Group not found".to_string())),
    }
}

/// DELETE /api/v1/groups/:id
pub async fn delete_group(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = GroupRepository::new(state.pool.clone());
    let role = require_membership(&repo, group_id, auth.user_id).await?;
    if role != GroupRole::Owner {
        return Err(ApiError::PermissionDenied(
            "Only the owner can delete the group".to_string(),
        ));
    }

    if !repo.delete_group(group_id).await? {
        return Err(ApiError::NotFound("Group not found".to_string()));
    }

    let scrubbed = repo
        .scrub_joined_group_refs(group_id, state.config.sweeper.batch_size)
        .await?;
    tracing::info!(group_id = %group_id, scrubbed, "Group deleted");

    Ok(StatusCode::NO_CONTENT)
}
