mod common;

use academy_auth::models::{PrincipalKind, ResetToken};
use axum::http::StatusCode;
use common::{read_json, TestApp, TEST_PASSWORD};
use serde_json::json;

/// Plant a reset token directly, the way forgot_password would, and return
/// the raw value a user would receive out of band.
async fn plant_reset_token(app: &TestApp, email: &str, kind: PrincipalKind) -> String {
    let raw = ResetToken::generate_raw();
    app.state
        .db
        .insert_reset_token(&ResetToken::hash_raw(&raw), email, kind, 15)
        .await
        .expect("Failed to insert reset token");
    raw
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_forgot_password_response_is_uniform() {
    let app = TestApp::spawn().await;

    let known = app
        .post_json(
            "/auth/forgot_password",
            json!({ "email": "student1@test.com" }),
            None,
        )
        .await;
    assert_eq!(known.status(), StatusCode::OK);
    let known_body = read_json(known).await;

    let unknown = app
        .post_json(
            "/auth/forgot_password",
            json!({ "email": "nobody@test.com" }),
            None,
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::OK);
    let unknown_body = read_json(unknown).await;

    assert_eq!(known_body, unknown_body);
    // The raw token never appears in the response.
    assert!(known_body.get("reset_token").is_none());

    // But only the real account got a stored token, and only its hash.
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM password_reset_tokens WHERE email = 'student1@test.com'",
    )
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_reset_password_end_to_end() {
    let app = TestApp::spawn().await;
    let raw = plant_reset_token(&app, "student1@test.com", PrincipalKind::Student).await;

    let response = app
        .post_json(
            "/auth/reset_password",
            json!({
                "email": "student1@test.com",
                "user_type": "student",
                "reset_token": raw,
                "new_password": "FreshPassword1"
            }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Old password no longer works, new one does.
    let old = app
        .post_json(
            "/auth/login",
            json!({ "email": "student1@test.com", "password": TEST_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    app.login("student1@test.com", "FreshPassword1").await;
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_reset_token_is_single_use() {
    let app = TestApp::spawn().await;
    let raw = plant_reset_token(&app, "student1@test.com", PrincipalKind::Student).await;

    let body = json!({
        "email": "student1@test.com",
        "user_type": "student",
        "reset_token": raw,
        "new_password": "FreshPassword1"
    });

    let first = app.post_json("/auth/reset_password", body.clone(), None).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.post_json("/auth/reset_password", body, None).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_expired_reset_token_rejected_and_deleted() {
    let app = TestApp::spawn().await;

    // Plant a token that is already past its expiry.
    let raw = ResetToken::generate_raw();
    app.state
        .db
        .insert_reset_token(
            &ResetToken::hash_raw(&raw),
            "student1@test.com",
            PrincipalKind::Student,
            -1,
        )
        .await
        .unwrap();

    let response = app
        .post_json(
            "/auth/reset_password",
            json!({
                "email": "student1@test.com",
                "user_type": "student",
                "reset_token": raw,
                "new_password": "FreshPassword1"
            }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The expired row was removed on encounter.
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM password_reset_tokens WHERE email = 'student1@test.com'",
    )
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_reset_token_pinned_to_account() {
    let app = TestApp::spawn().await;
    let raw = plant_reset_token(&app, "student1@test.com", PrincipalKind::Student).await;

    // Wrong kind.
    let response = app
        .post_json(
            "/auth/reset_password",
            json!({
                "email": "student1@test.com",
                "user_type": "coach",
                "reset_token": &raw,
                "new_password": "FreshPassword1"
            }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Wrong email.
    let response = app
        .post_json(
            "/auth/reset_password",
            json!({
                "email": "student2@test.com",
                "user_type": "student",
                "reset_token": &raw,
                "new_password": "FreshPassword1"
            }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_reset_rejects_weak_password() {
    let app = TestApp::spawn().await;
    let raw = plant_reset_token(&app, "student1@test.com", PrincipalKind::Student).await;

    let response = app
        .post_json(
            "/auth/reset_password",
            json!({
                "email": "student1@test.com",
                "user_type": "student",
                "reset_token": &raw,
                "new_password": "weak"
            }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The weak attempt must not have consumed the token.
    let response = app
        .post_json(
            "/auth/reset_password",
            json!({
                "email": "student1@test.com",
                "user_type": "student",
                "reset_token": &raw,
                "new_password": "FreshPassword1"
            }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_reset_invalidates_existing_sessions() {
    let app = TestApp::spawn().await;
    let (access, refresh) = app.login("student1@test.com", TEST_PASSWORD).await;

    let raw = plant_reset_token(&app, "student1@test.com", PrincipalKind::Student).await;
    let response = app
        .post_json(
            "/auth/reset_password",
            json!({
                "email": "student1@test.com",
                "user_type": "student",
                "reset_token": raw,
                "new_password": "FreshPassword1"
            }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let me = app.get("/auth/me", Some(&access)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    let refreshed = app
        .post_json("/auth/refresh", json!({ "refresh_token": refresh }), None)
        .await;
    assert_eq!(refreshed.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_change_password_requires_current_password() {
    let app = TestApp::spawn().await;
    let (access, _) = app.login("coach@test.com", TEST_PASSWORD).await;

    // Wrong old password is a 400; 401 stays reserved for token failures.
    let response = app
        .post_json(
            "/auth/change_password",
            json!({ "old_password": "wrong", "new_password": "FreshPassword1" }),
            Some(&access),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/auth/change_password",
            json!({ "old_password": TEST_PASSWORD, "new_password": "FreshPassword1" }),
            Some(&access),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Change invalidates every session, the caller's included.
    let me = app.get("/auth/me", Some(&access)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    app.login("coach@test.com", "FreshPassword1").await;
}
