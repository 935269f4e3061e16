//! Device/session management for the authenticated principal.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;

use crate::{
    dtos::{ErrorResponse, MessageResponse, SessionsResponse},
    error::AppError,
    middleware::AuthPrincipal,
    services::ClientMeta,
    utils::request_meta,
    AppState,
};

/// List the caller's live sessions
#[utoipa::path(
    get,
    path = "/auth/sessions",
    responses(
        (status = 200, description = "Live sessions, newest first", body = SessionsResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Sessions",
    security(("bearer_auth" = []))
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    actor: AuthPrincipal,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state.auth.list_sessions(&actor).await?;

    Ok((
        StatusCode::OK,
        Json(SessionsResponse {
            success: true,
            sessions,
        }),
    ))
}

/// Revoke one of the caller's sessions by id
#[utoipa::path(
    delete,
    path = "/auth/sessions/{session_id}",
    params(("session_id" = i32, Path, description = "Session row id")),
    responses(
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 404, description = "Session not found or not yours", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Sessions",
    security(("bearer_auth" = []))
)]
pub async fn revoke_session(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    actor: AuthPrincipal,
    Path(session_id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let (ip_address, user_agent) = request_meta(&headers, Some(addr));
    let meta = ClientMeta {
        ip_address,
        user_agent,
    };

    state.auth.revoke_session(&actor, session_id, &meta).await?;

    Ok((StatusCode::OK, Json(MessageResponse::ok("Session revoked"))))
}
