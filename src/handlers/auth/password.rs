//! Password lifecycle: forgot/reset (unauthenticated) and change
//! (authenticated).

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;

use crate::{
    dtos::{
        ChangePasswordRequest, ErrorResponse, ForgotPasswordRequest, MessageResponse,
        ResetPasswordRequest,
    },
    error::AppError,
    middleware::AuthPrincipal,
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

/// Request a password reset token
///
/// The response is identical whether or not the email exists.
#[utoipa::path(
    post,
    path = "/auth/forgot_password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset initiated if the account exists", body = MessageResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(&headers, addr);
    state.auth.forgot_password(&req.email, &meta).await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok(
            "If the email exists, a reset link has been sent",
        )),
    ))
}

/// Complete a password reset with a previously issued token
#[utoipa::path(
    post,
    path = "/auth/reset_password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid token or weak password", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(&headers, addr);
    state
        .auth
        .reset_password(
            &req.email,
            req.user_type,
            &req.reset_token,
            &req.new_password,
            &meta,
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok("Password has been reset")),
    ))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/auth/change_password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, all sessions invalidated", body = MessageResponse),
        (status = 400, description = "Weak password", body = ErrorResponse),
        (status = 401, description = "Current password incorrect", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    actor: AuthPrincipal,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(&headers, addr);
    state
        .auth
        .change_password(&actor, &req.old_password, &req.new_password, &meta)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok(
            "Password changed. Please log in again.",
        )),
    ))
}
