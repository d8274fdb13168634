//! Membership endpoints: listing, role changes, removal, leaving.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use domain::models::group::LeaveGroupResponse;
use domain::models::member::{ListMembersResponse, MemberResponse, UpdateMemberRoleRequest};
use domain::models::role::GroupRole;
use persistence::entities::GroupRoleDb;
use persistence::repositories::{GroupRepository, LeaveOutcome};
use shared::pagination::{PageInfo, PageQuery};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;
use crate::routes::groups::require_membership;

/// GET /api/v1/groups/:id/members
pub async fn list_members(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListMembersResponse>, ApiError> {
    let repo = GroupRepository::new(state.pool.clone());
    require_membership(&repo, group_id, auth.user_id).await?;

    let members = repo
        .list_members(group_id, page.per_page(), page.offset())
        .await?;
    let total = repo.count_members(group_id).await?;

    let data: Vec<MemberResponse> = members
        .into_iter()
        .map(|entity| {
            let member: domain::models::member::Member = entity.into();
            member.into()
        })
        .collect();

    Ok(Json(ListMembersResponse {
        data,
        pagination: PageInfo::new(&page, total),
    }))
}

/// PUT /api/v1/groups/:id/members/:user_id/role
pub async fn update_member_role(
    State(state): State<AppState>,
    auth: UserAuth,
    Path((group_id, target_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    if !req.role.is_grantable() {
        return Err(ApiError::InvalidArgument(
            "The owner role cannot be assigned; ownership moves when the owner leaves".to_string(),
        ));
    }

    let repo = GroupRepository::new(state.pool.clone());
    let actor_role = require_membership(&repo, group_id, auth.user_id).await?;

    let target = repo
        .get_membership(group_id, target_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    if target.role == GroupRoleDb::Owner {
        return Err(ApiError::FailedPrecondition(
            "The owner's role cannot be changed".to_string(),
        ));
    }
    let target_role: GroupRole = target.role.into();

    if !actor_role.can_promote_to(req.role) || !actor_role.can_remove(target_role) {
        return Err(ApiError::PermissionDenied(
            "You cannot assign this role".to_string(),
        ));
    }

    let updated = repo
        .update_member_role(group_id, target_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    let member: domain::models::member::Member = updated.into();
    Ok(Json(member.into()))
}

/// DELETE /api/v1/groups/:id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    auth: UserAuth,
    Path((group_id, target_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<LeaveGroupResponse>, ApiError> {
    if target_id == auth.user_id {
        return Err(ApiError::InvalidArgument(
            "Use the leave endpoint to leave a group".to_string(),
        ));
    }

    let repo = GroupRepository::new(state.pool.clone());
    let actor_role = require_membership(&repo, group_id, auth.user_id).await?;

    let target = repo
        .get_membership(group_id, target_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    let target_role: GroupRole = target.role.into();

    if !actor_role.can_remove(target_role) {
        return Err(ApiError::PermissionDenied(
            "You cannot remove this member".to_string(),
        ));
    }

    depart(&state, &repo, group_id, target_id).await
}

/// POST /api/v1/groups/:id/leave
pub async fn leave_group(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<LeaveGroupResponse>, ApiError> {
    let repo = GroupRepository::new(state.pool.clone());
    depart(&state, &repo, group_id, auth.user_id).await
}

async fn depart(
    state: &AppState,
    repo: &GroupRepository,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<Json<LeaveGroupResponse>, ApiError> {
    match repo.leave_or_remove(group_id, user_id).await? {
        LeaveOutcome::Left => Ok(Json(LeaveGroupResponse {
            group_deleted: false,
            new_owner_id: None,
        })),
        LeaveOutcome::OwnershipTransferred { new_owner_id } => Ok(Json(LeaveGroupResponse {
            group_deleted: false,
            new_owner_id: Some(new_owner_id),
        })),
        LeaveOutcome::GroupDeleted => {
            let scrubbed = repo
                .scrub_joined_group_refs(group_id, state.config.sweeper.batch_size)
                .await?;
            tracing::info!(group_id = %group_id, scrubbed, "Group dissolved by last departure");
            Ok(Json(LeaveGroupResponse {
                group_deleted: true,
                new_owner_id: None,
            }))
        }
        LeaveOutcome::NotMember => {
            Err(ApiError::NotFound("Not a member of this group".to_string()))
        }
        LeaveOutcome::GroupMissing => Err(ApiError::NotFound("Group not found".to_string())),
    }
}
