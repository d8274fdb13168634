//! Integration tests for reusable invite links.
//!
//! Requires a running PostgreSQL instance; set TEST_DATABASE_URL.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    create_group_via_api, create_test_app, create_test_pool, create_test_user,
    json_request_with_auth, parse_response_body, request_with_auth, run_migrations, test_config,
};
use persistence::repositories::{InviteLinkRepository, RedeemOutcome};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

async fn create_link(
    app: &axum::Router,
    owner: &common::TestUser,
    group_id: Uuid,
    body: serde_json::Value,
) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/links", group_id),
            body,
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    parse_response_body(response).await
}

#[tokio::test]
async fn test_link_redeem_accept_role_roundtrip() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let redeemer = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let link = create_link(&app, &owner, group_id, json!({ "role": "moderator" })).await;
    let code = link["code"].as_str().unwrap();
    assert_eq!(link["uses"], 0);
    assert_eq!(link["is_active"], true);

    let response = app
        .clone()
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/links/{}/redeem", code),
            &redeemer.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["role"], "moderator");
    assert_eq!(body["group_id"], group_id.to_string());
    let invitation_id = Uuid::parse_str(body["invitation_id"].as_str().unwrap()).unwrap();

    // Accepting grants the link's role.
    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/accept", invitation_id),
            &redeemer.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let role: String = sqlx::query_scalar(
        "SELECT role::text FROM group_members WHERE group_id = $1 AND user_id = $2",
    )
    .bind(group_id)
    .bind(redeemer.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(role, "moderator");
}

#[tokio::test]
async fn test_redeem_is_idempotent() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let redeemer = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let link = create_link(&app, &owner, group_id, json!({ "role": "member", "max_uses": 5 })).await;
    let code = link["code"].as_str().unwrap();
    let link_id = Uuid::parse_str(link["id"].as_str().unwrap()).unwrap();

    let mut invitation_ids = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request_with_auth(
                Method::POST,
                &format!("/api/v1/links/{}/redeem", code),
                &redeemer.token,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = parse_response_body(response).await;
        invitation_ids.push(body["invitation_id"].as_str().unwrap().to_string());
    }
    assert_eq!(invitation_ids[0], invitation_ids[1]);

    // Only the first redemption consumed a use.
    let uses: i32 = sqlx::query_scalar("SELECT uses FROM invite_links WHERE id = $1")
        .bind(link_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(uses, 1);
}

#[tokio::test]
async fn test_single_use_link_has_one_winner() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let first = create_test_user(&pool).await;
    let second = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let link = create_link(&app, &owner, group_id, json!({ "role": "member", "max_uses": 1 })).await;
    let code = link["code"].as_str().unwrap();
    let link_id = Uuid::parse_str(link["id"].as_str().unwrap()).unwrap();

    let response = app
        .clone()
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/links/{}/redeem", code),
            &first.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/links/{}/redeem", code),
            &second.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "resource_exhausted");

    // Consuming the last use deactivated the link.
    let is_active: bool = sqlx::query_scalar("SELECT is_active FROM invite_links WHERE id = $1")
        .bind(link_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!is_active);
}

#[tokio::test]
async fn test_redeem_rechecks_limit_inside_transaction() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let redeemer = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;
    let repo = InviteLinkRepository::new(pool.clone());

    // A racer spent the final use after this caller's lookup: counter at
    // the limit, flag not yet flipped.
    let link = create_link(&app, &owner, group_id, json!({ "role": "member", "max_uses": 1 })).await;
    let link_id = Uuid::parse_str(link["id"].as_str().unwrap()).unwrap();
    sqlx::query("UPDATE invite_links SET uses = max_uses WHERE id = $1")
        .bind(link_id)
        .execute(&pool)
        .await
        .unwrap();

    let outcome = repo.redeem(link_id, redeemer.id).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::Exhausted));

    // The losing attempt retires the link and mints nothing.
    let is_active: bool = sqlx::query_scalar("SELECT is_active FROM invite_links WHERE id = $1")
        .bind(link_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!is_active);
    let minted: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invitations WHERE link_id = $1")
        .bind(link_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(minted, 0);

    // A link revoked between lookup and redemption is likewise rejected.
    let link = create_link(&app, &owner, group_id, json!({ "role": "member" })).await;
    let link_id = Uuid::parse_str(link["id"].as_str().unwrap()).unwrap();
    sqlx::query("UPDATE invite_links SET is_active = FALSE WHERE id = $1")
        .bind(link_id)
        .execute(&pool)
        .await
        .unwrap();

    let outcome = repo.redeem(link_id, redeemer.id).await.unwrap();
    assert!(matches!(outcome, RedeemOutcome::Inactive));
    let minted: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invitations WHERE link_id = $1")
        .bind(link_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(minted, 0);
}

#[tokio::test]
async fn test_concurrent_single_use_redemptions_have_one_winner() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let first = create_test_user(&pool).await;
    let second = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let link = create_link(&app, &owner, group_id, json!({ "role": "member", "max_uses": 1 })).await;
    let code = link["code"].as_str().unwrap();
    let link_id = Uuid::parse_str(link["id"].as_str().unwrap()).unwrap();

    let uri = format!("/api/v1/links/{}/redeem", code);
    let (first_response, second_response) = tokio::join!(
        app.clone()
            .oneshot(request_with_auth(Method::POST, &uri, &first.token)),
        app.clone()
            .oneshot(request_with_auth(Method::POST, &uri, &second.token)),
    );
    let statuses = [
        first_response.unwrap().status(),
        second_response.unwrap().status(),
    ];

    // Exactly one winner; the loser is turned away either before the
    // transaction (exhausted) or inside it (the winner deactivated the
    // link first).
    assert_eq!(
        statuses
            .iter()
            .filter(|status| **status == StatusCode::CREATED)
            .count(),
        1
    );
    let loser = statuses
        .iter()
        .find(|status| **status != StatusCode::CREATED)
        .unwrap();
    assert!(
        *loser == StatusCode::TOO_MANY_REQUESTS || *loser == StatusCode::NOT_FOUND,
        "unexpected loser status: {loser}"
    );

    let minted: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invitations WHERE link_id = $1")
        .bind(link_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(minted, 1);

    let (uses, is_active): (i32, bool) =
        sqlx::query_as("SELECT uses, is_active FROM invite_links WHERE id = $1")
            .bind(link_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(uses, 1);
    assert!(!is_active);
}

#[tokio::test]
async fn test_expired_link_rejected_and_deactivated() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let redeemer = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let link = create_link(&app, &owner, group_id, json!({ "role": "member" })).await;
    let code = link["code"].as_str().unwrap();
    let link_id = Uuid::parse_str(link["id"].as_str().unwrap()).unwrap();

    sqlx::query("UPDATE invite_links SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(link_id)
        .execute(&pool)
        .await
        .unwrap();

    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/links/{}/redeem", code),
            &redeemer.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "deadline_exceeded");

    let is_active: bool = sqlx::query_scalar("SELECT is_active FROM invite_links WHERE id = $1")
        .bind(link_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!is_active);
}

#[tokio::test]
async fn test_revoked_link_not_redeemable() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let redeemer = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let link = create_link(&app, &owner, group_id, json!({ "role": "member" })).await;
    let code = link["code"].as_str().unwrap();
    let link_id = Uuid::parse_str(link["id"].as_str().unwrap()).unwrap();

    let response = app
        .clone()
        .oneshot(request_with_auth(
            Method::DELETE,
            &format!("/api/v1/groups/{}/links/{}", group_id, link_id),
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/links/{}/redeem", code),
            &redeemer.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_link_permissions_and_validation() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let member = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, true).await;

    app.clone()
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/join", group_id),
            &member.token,
        ))
        .await
        .unwrap();

    // Owner role can never ride on a link.
    let response = app
        .clone()
        .oneshot(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/links", group_id),
            json!({ "role": "owner" }),
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Zero max_uses is invalid.
    let response = app
        .clone()
        .oneshot(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/links", group_id),
            json!({ "role": "member", "max_uses": 0 }),
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Plain members cannot create links.
    let response = app
        .clone()
        .oneshot(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/links", group_id),
            json!({ "role": "member" }),
            &member.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Members cannot list links either.
    let response = app
        .oneshot(request_with_auth(
            Method::GET,
            &format!("/api/v1/groups/{}/links", group_id),
            &member.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
