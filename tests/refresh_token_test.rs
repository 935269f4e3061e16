mod common;

use axum::http::StatusCode;
use common::{read_json, TestApp, TEST_PASSWORD};
use serde_json::json;

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_refresh_rotates_the_pair() {
    let app = TestApp::spawn().await;
    let (access, refresh) = app.login("coach@test.com", TEST_PASSWORD).await;

    let response = app
        .post_json("/auth/refresh", json!({ "refresh_token": refresh }), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let new_access = body["access_token"].as_str().unwrap();
    let new_refresh = body["refresh_token"].as_str().unwrap();
    assert_ne!(new_access, access);
    assert_ne!(new_refresh, refresh);

    // The new access token works against a protected endpoint.
    let me = app.get("/auth/me", Some(new_access)).await;
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_rotated_refresh_token_is_dead() {
    let app = TestApp::spawn().await;
    let (_, refresh) = app.login("coach@test.com", TEST_PASSWORD).await;

    let first = app
        .post_json("/auth/refresh", json!({ "refresh_token": &refresh }), None)
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .post_json("/auth/refresh", json!({ "refresh_token": &refresh }), None)
        .await;
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_refresh_reuse_kills_all_sessions() {
    let app = TestApp::spawn().await;
    let (_, refresh) = app.login("coach@test.com", TEST_PASSWORD).await;

    // Legitimate rotation, then a replay of the consumed token.
    let first = app
        .post_json("/auth/refresh", json!({ "refresh_token": &refresh }), None)
        .await;
    let body = read_json(first).await;
    let rotated_access = body["access_token"].as_str().unwrap().to_string();
    let rotated_refresh = body["refresh_token"].as_str().unwrap().to_string();

    let replay = app
        .post_json("/auth/refresh", json!({ "refresh_token": &refresh }), None)
        .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    // The reuse nuked everything, including the legitimately rotated pair.
    let me = app.get("/auth/me", Some(&rotated_access)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let rotated = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": rotated_refresh }),
            None,
        )
        .await;
    assert_eq!(rotated.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_access_token_rejected_on_refresh_endpoint() {
    let app = TestApp::spawn().await;
    let (access, _) = app.login("coach@test.com", TEST_PASSWORD).await;

    let response = app
        .post_json("/auth/refresh", json!({ "refresh_token": access }), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_garbage_refresh_token_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": "not.a.token" }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
