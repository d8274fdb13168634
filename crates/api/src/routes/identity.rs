//! Identity provider event hook.
//!
//! When a new identity is created upstream, the directory row is upserted
//! and pending unresolved invitations matching the new user's email or
//! phone are bound to it.

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use domain::models::user::{IdentityCreatedEvent, ReconciliationResponse};
use persistence::repositories::{InvitationRepository, UserRepository};

use crate::app::AppState;
use crate::error::ApiError;

/// POST /api/v1/identity/events/user-created
pub async fn user_created(
    State(state): State<AppState>,
    Json(event): Json<IdentityCreatedEvent>,
) -> Result<(StatusCode, Json<ReconciliationResponse>), ApiError> {
    event.validate()?;

    let users = UserRepository::new(state.pool.clone());
    users
        .upsert_from_identity(
            event.user_id,
            event.email.as_deref(),
            event.username.as_deref(),
            event.phone.as_deref(),
            event.display_name.as_deref(),
        )
        .await?;

    let invitations = InvitationRepository::new(state.pool.clone());
    let invitations_bound = invitations
        .bind_unresolved(
            event.user_id,
            event.email.as_deref(),
            event.phone.as_deref(),
            state.config.sweeper.batch_size,
        )
        .await?;

    tracing::info!(
        user_id = %event.user_id,
        invitations_bound,
        "Identity created event processed"
    );

    Ok((
        StatusCode::OK,
        Json(ReconciliationResponse { invitations_bound }),
    ))
}
