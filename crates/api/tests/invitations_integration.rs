//! Integration tests for the invitation lifecycle.
//!
//! Requires a running PostgreSQL instance; set TEST_DATABASE_URL.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    create_group_via_api, create_test_app, create_test_pool, create_test_user, invite_via_api,
    json_request_with_auth, parse_response_body, request_with_auth, run_migrations, test_config,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_invite_by_user_id_and_accept() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let invitee = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let invitation_id = invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "user_id", "value": invitee.id }),
        "moderator",
    )
    .await;

    // The invitee sees it in their inbox.
    let response = app
        .clone()
        .oneshot(request_with_auth(
            Method::GET,
            "/api/v1/invitations",
            &invitee.token,
        ))
        .await
        .unwrap();
    let body = parse_response_body(response).await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&invitation_id.to_string().as_str()));

    // Accept: membership materializes with the invitation's role.
    let response = app
        .clone()
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/accept", invitation_id),
            &invitee.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "accepted");

    let role: String = sqlx::query_scalar(
        "SELECT role::text FROM group_members WHERE group_id = $1 AND user_id = $2",
    )
    .bind(group_id)
    .bind(invitee.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(role, "moderator");

    let member_count: i32 = sqlx::query_scalar("SELECT member_count FROM groups WHERE id = $1")
        .bind(group_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(member_count, 2);

    // Terminal state: accepting again fails.
    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/accept", invitation_id),
            &invitee.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "failed_precondition");
}

#[tokio::test]
async fn test_owner_role_invitation_always_rejected() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let member = create_test_user(&pool).await;
    let invitee = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, true).await;

    app.clone()
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/join", group_id),
            &member.token,
        ))
        .await
        .unwrap();

    // Rejected for the owner and for a plain member alike.
    for actor in [&owner, &member] {
        let response = app
            .clone()
            .oneshot(json_request_with_auth(
                Method::POST,
                &format!("/api/v1/groups/{}/invitations", group_id),
                json!({
                    "target": { "kind": "user_id", "value": invitee.id },
                    "role": "owner"
                }),
                &actor.token,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = parse_response_body(response).await;
        assert_eq!(body["error"], "invalid_argument");
    }
}

#[tokio::test]
async fn test_send_invitation_requires_admin() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let member = create_test_user(&pool).await;
    let invitee = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, true).await;

    app.clone()
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/join", group_id),
            &member.token,
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/invitations", group_id),
            json!({
                "target": { "kind": "user_id", "value": invitee.id },
                "role": "member"
            }),
            &member.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_pending_invitation_conflicts() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let invitee = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "user_id", "value": invitee.id }),
        "member",
    )
    .await;

    let response = app
        .oneshot(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/invitations", group_id),
            json!({
                "target": { "kind": "user_id", "value": invitee.id },
                "role": "member"
            }),
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "already_exists");
}

#[tokio::test]
async fn test_invite_existing_member_conflicts() {
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

    let response = app
        .oneshot(json_request_with_auth(
            Method::POST,
            &format!("/api/v1/groups/{}/invitations", group_id),
            json!({
                "target": { "kind": "user_id", "value": member.id },
                "role": "member"
            }),
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_decline_is_terminal() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let invitee = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let invitation_id = invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "user_id", "value": invitee.id }),
        "member",
    )
    .await;

    let response = app
        .clone()
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/decline", invitation_id),
            &invitee.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "declined");

    // No membership was created.
    let is_member: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
    )
    .bind(group_id)
    .bind(invitee.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(!is_member);

    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/accept", invitation_id),
            &invitee.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_accept_by_wrong_addressee_forbidden() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let invitee = create_test_user(&pool).await;
    let interloper = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let invitation_id = invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "user_id", "value": invitee.id }),
        "member",
    )
    .await;

    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/accept", invitation_id),
            &interloper.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let status: String =
        sqlx::query_scalar("SELECT status::text FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "pending");
}

#[tokio::test]
async fn test_expired_invitation_transitions_on_accept() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let invitee = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let invitation_id = invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "user_id", "value": invitee.id }),
        "member",
    )
    .await;

    sqlx::query("UPDATE invitations SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(invitation_id)
        .execute(&pool)
        .await
        .unwrap();

    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/accept", invitation_id),
            &invitee.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "deadline_exceeded");

    // The lazy expiry transition persisted.
    let status: String =
        sqlx::query_scalar("SELECT status::text FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "expired");
}

#[tokio::test]
async fn test_revoke_invitation() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let invitee = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let invitation_id = invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "user_id", "value": invitee.id }),
        "member",
    )
    .await;

    let response = app
        .clone()
        .oneshot(request_with_auth(
            Method::DELETE,
            &format!("/api/v1/groups/{}/invitations/{}", group_id, invitation_id),
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Revoking a terminal invitation conflicts.
    let response = app
        .clone()
        .oneshot(request_with_auth(
            Method::DELETE,
            &format!("/api/v1/groups/{}/invitations/{}", group_id, invitation_id),
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // A revoked invitation cannot be accepted.
    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/accept", invitation_id),
            &invitee.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unresolved_email_reconciliation_and_accept() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    // Invite an address with no matching user yet.
    let ghost_email = format!("ghost_{}@example.com", Uuid::new_v4().simple());
    let invitation_id = invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "email", "value": ghost_email }),
        "member",
    )
    .await;

    let invitee_id: Option<Uuid> =
        sqlx::query_scalar("SELECT invitee_id FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(invitee_id.is_none());

    // The identity provider reports the matching signup.
    let new_user_id = Uuid::new_v4();
    let response = app
        .clone()
        .oneshot(json_request_with_auth(
            Method::POST,
            "/api/v1/identity/events/user-created",
            json!({
                "user_id": new_user_id,
                "email": ghost_email,
                "display_name": "Ghost"
            }),
            &common::mint_token(new_user_id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["invitations_bound"], 1);

    let invitee_id: Option<Uuid> =
        sqlx::query_scalar("SELECT invitee_id FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(invitee_id, Some(new_user_id));

    // The bound invitation is acceptable by the new identity.
    let response = app
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/accept", invitation_id),
            &common::mint_token(new_user_id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let is_member: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
    )
    .bind(group_id)
    .bind(new_user_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(is_member);
}

#[tokio::test]
async fn test_list_group_invitations_with_status_filter() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    let app = create_test_app(test_config(), pool.clone());

    let owner = create_test_user(&pool).await;
    let a = create_test_user(&pool).await;
    let b = create_test_user(&pool).await;
    let group_id = create_group_via_api(&app, &owner, false).await;

    let first = invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "user_id", "value": a.id }),
        "member",
    )
    .await;
    invite_via_api(
        &app,
        &owner,
        group_id,
        json!({ "kind": "user_id", "value": b.id }),
        "member",
    )
    .await;

    app.clone()
        .oneshot(request_with_auth(
            Method::POST,
            &format!("/api/v1/invitations/{}/decline", first),
            &a.token,
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request_with_auth(
            Method::GET,
            &format!("/api/v1/groups/{}/invitations?status=pending", group_id),
            &owner.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["invitee_id"], b.id.to_string());
}
