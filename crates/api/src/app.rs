//! Application state and router assembly.

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_user_auth, trace_id,
    RateLimiterState,
};
use crate::routes;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    pub fn new(config: Arc<Config>, pool: PgPool) -> Self {
        let rate_limiter = if config.security.rate_limit_per_minute > 0 {
            Some(Arc::new(RateLimiterState::new(
                config.security.rate_limit_per_minute,
            )))
        } else {
            None
        };

        Self {
            pool,
            config,
            rate_limiter,
        }
    }
}

/// Builds the application router with all routes and middleware.
pub fn create_app(config: Arc<Config>, pool: PgPool) -> Router {
    let state = AppState::new(config.clone(), pool);

    let group_routes = Router::new()
        .route("/groups", post(routes::groups::create_group))
        .route("/groups", get(routes::groups::list_my_groups))
        .route("/groups/:id", get(routes::groups::get_group))
        .route("/groups/:id", put(routes::groups::update_group))
        .route("/groups/:id", delete(routes::groups::delete_group))
        .route("/groups/:id/join", post(routes::groups::join_group))
        .route("/groups/:id/leave", post(routes::members::leave_group))
        .route("/groups/:id/members", get(routes::members::list_members))
        .route(
            "/groups/:id/members/:user_id/role",
            put(routes::members::update_member_role),
        )
        .route(
            "/groups/:id/members/:user_id",
            delete(routes::members::remove_member),
        );

    let invitation_routes = Router::new()
        .route(
            "/groups/:id/invitations",
            post(routes::invitations::send_invitation),
        )
        .route(
            "/groups/:id/invitations",
            get(routes::invitations::list_group_invitations),
        )
        .route(
            "/groups/:id/invitations/:invitation_id",
            delete(routes::invitations::revoke_invitation),
        )
        .route("/invitations", get(routes::invitations::list_my_invitations))
        .route(
            "/invitations/:id/accept",
            post(routes::invitations::accept_invitation),
        )
        .route(
            "/invitations/:id/decline",
            post(routes::invitations::decline_invitation),
        );

    let link_routes = Router::new()
        .route("/groups/:id/links", post(routes::invite_links::create_link))
        .route("/groups/:id/links", get(routes::invite_links::list_links))
        .route(
            "/groups/:id/links/:link_id",
            delete(routes::invite_links::revoke_link),
        )
        .route("/links/:code/redeem", post(routes::invite_links::redeem_link));

    let identity_routes = Router::new().route(
        "/identity/events/user-created",
        post(routes::identity::user_created),
    );

    let protected = Router::new()
        .merge(group_routes)
        .merge(invitation_routes)
        .merge(link_routes)
        .merge(identity_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    let public = Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/health/live", get(routes::health::liveness))
        .route("/api/health/ready", get(routes::health::readiness))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .nest("/api/v1", protected)
        .merge(public)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(CompressionLayer::new())
        .layer(build_cors(&config))
        .with_state(state)
}

fn build_cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.security.cors_origins.iter().any(|o| o == "*") {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        layer.allow_origin(origins)
    }
}
