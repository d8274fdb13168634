//! Axum extractor for the authenticated user.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // The auth middleware stores the verified identity in extensions.
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }

        // Routes mounted outside the auth layer validate the header here.
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| {
                ApiError::Unauthenticated("Missing or invalid Authorization header".to_string())
            })?;

        let jwt_config = UserAuth::create_jwt_config(&state.config.jwt)
            .map_err(|e| ApiError::Internal(format!("JWT configuration error: {}", e)))?;

        UserAuth::validate(&jwt_config, token)
            .map_err(|_| ApiError::Unauthenticated("Invalid or expired token".to_string()))
    }
}
