use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;

use crate::{
    dtos::{
        ErrorResponse, LoginRequest, LoginResponse, LogoutRequest, MessageResponse,
        RefreshRequest, RefreshResponse,
    },
    error::AppError,
    middleware::AuthPrincipal,
    models::PrincipalSummary,
    services::ClientMeta,
    utils::{request_meta, ValidatedJson},
    AppState,
};

fn client_meta(headers: &HeaderMap, addr: SocketAddr) -> ClientMeta {
    let (ip_address, user_agent) = request_meta(headers, Some(addr));
    ClientMeta {
        ip_address,
        user_agent,
    }
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account locked or deactivated", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(&headers, addr);
    let outcome = state.auth.login(&req.email, &req.password, &meta).await?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            user_type: outcome.principal.kind,
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
            token_type: "bearer".to_string(),
            expires_in: state.tokens.access_ttl_seconds(),
            user: outcome.principal.summary(),
        }),
    ))
}

/// Refresh the token pair, rotating the refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid, expired or revoked token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(&headers, addr);
    let tokens = state.auth.refresh(&req.refresh_token, &meta).await?;

    Ok((
        StatusCode::OK,
        Json(RefreshResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "bearer".to_string(),
            expires_in: state.tokens.access_ttl_seconds(),
        }),
    ))
}

/// Logout the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let access_exp = DateTime::from_timestamp(actor.exp, 0).unwrap_or_else(Utc::now);
    state
        .auth
        .logout(&actor, req.refresh_token.as_deref(), access_exp)
        .await?;

    Ok((StatusCode::OK, Json(MessageResponse::ok("Logged out successfully"))))
}

/// Logout everywhere: invalidate every session for the caller
#[utoipa::path(
    post,
    path = "/auth/logout_all",
    responses(
        (status = 200, description = "All sessions revoked", body = MessageResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn logout_all(
    State(state): State<AppState>,
    actor: AuthPrincipal,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout_all(&actor).await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok("All sessions have been logged out")),
    ))
}

/// Current principal, resolved from the access token
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current principal", body = PrincipalSummary),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    actor: AuthPrincipal,
) -> Result<impl IntoResponse, AppError> {
    let principal = state
        .db
        .find_principal(actor.kind, actor.id)
        .await?
        .ok_or(AppError::TokenInvalid)?;

    Ok((StatusCode::OK, Json(principal.summary())))
}
