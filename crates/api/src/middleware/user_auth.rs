//! Session token authentication middleware.
//!
//! The identity provider signs RS256 session tokens; this middleware
//! verifies the Bearer token and exposes the caller's user id to handlers.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::JwtAuthConfig;
use shared::jwt::JwtConfig;

/// Authenticated caller information extracted from the session token.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// User ID from the token's subject claim.
    pub user_id: Uuid,
    /// Token id (jti) for session tracking.
    pub jti: String,
}

impl UserAuth {
    /// Validates a session token and returns the caller's identity.
    pub fn validate(jwt_config: &JwtConfig, token: &str) -> Result<Self, String> {
        let claims = jwt_config
            .validate_token(token)
            .map_err(|e| format!("Invalid token: {}", e))?;

        let user_id = shared::jwt::extract_user_id(&claims)
            .map_err(|_| "Invalid user ID in token".to_string())?;

        Ok(UserAuth {
            user_id,
            jti: claims.jti,
        })
    }

    /// Builds the token verifier from configuration. A signing key is only
    /// wired in when one is configured (tests and local tooling).
    pub fn create_jwt_config(config: &JwtAuthConfig) -> Result<JwtConfig, String> {
        let result = if config.private_key.is_empty() {
            JwtConfig::verifier(&config.public_key, config.leeway_secs)
        } else {
            JwtConfig::new(
                &config.private_key,
                &config.public_key,
                config.token_expiry_secs,
                config.leeway_secs,
            )
        };
        result.map_err(|e| format!("Failed to initialize JWT config: {}", e))
    }
}

/// Middleware that requires a valid session token.
///
/// The verified [`UserAuth`] is stored in request extensions for handlers
/// and for the rate limiter, which keys on the user id.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return unauthenticated_response("Missing or invalid Authorization header");
        }
    };

    let jwt_config = match UserAuth::create_jwt_config(&state.config.jwt) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to create JWT config: {}", e);
            return internal_error_response("Authentication service unavailable");
        }
    };

    match UserAuth::validate(&jwt_config, token) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Session token validation failed: {}", e);
            unauthenticated_response("Invalid or expired token")
        }
    }
}

fn unauthenticated_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthenticated",
            "message": message
        })),
    )
        .into_response()
}

fn internal_error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "internal_error",
            "message": message
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_response_status() {
        let response = unauthenticated_response("Missing or invalid Authorization header");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_error_response_status() {
        let response = internal_error_response("Authentication service unavailable");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validate_roundtrip() {
        let jwt = JwtConfig::new_for_testing("middleware_test_secret_key_123456");
        let user_id = Uuid::new_v4();
        let (token, jti) = jwt.generate_token(user_id).unwrap();

        let auth = UserAuth::validate(&jwt, &token).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.jti, jti);
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let jwt = JwtConfig::new_for_testing("middleware_test_secret_key_123456");
        assert!(UserAuth::validate(&jwt, "garbage").is_err());
    }
}
