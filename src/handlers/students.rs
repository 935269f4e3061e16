//! Protected resource handlers demonstrating the scope rules: student
//! records and the owner-only login history feed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::{
    dtos::ErrorResponse,
    error::AppError,
    middleware::AuthPrincipal,
    models::{LoginHistory, PrincipalKind, PrincipalSummary},
    services::authz,
    AppState,
};

const LOGIN_HISTORY_LIMIT: i64 = 200;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LoginHistoryResponse {
    pub success: bool,
    pub history: Vec<LoginHistory>,
}

/// Fetch a student record
///
/// Owners see any student, coaches only students on their batch rosters,
/// students only themselves.
#[utoipa::path(
    get,
    path = "/students/{student_id}",
    params(("student_id" = i32, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student record", body = PrincipalSummary),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 403, description = "Outside the caller's scope", body = ErrorResponse),
        (status = 404, description = "Student not found", body = ErrorResponse)
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
pub async fn get_student(
    State(state): State<AppState>,
    actor: AuthPrincipal,
    Path(student_id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    authz::ensure_student_access(&state.db, &actor, student_id).await?;

    let student = state
        .db
        .find_principal(PrincipalKind::Student, student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    Ok((StatusCode::OK, Json(student.summary())))
}

/// Recent login history across all principals (owner only)
#[utoipa::path(
    get,
    path = "/login_history",
    responses(
        (status = 200, description = "Recent login attempts", body = LoginHistoryResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 403, description = "Owner access required", body = ErrorResponse)
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
pub async fn login_history(
    State(state): State<AppState>,
    actor: AuthPrincipal,
) -> Result<impl IntoResponse, AppError> {
    authz::ensure_owner(&actor)?;

    let history = state.db.list_login_history(LOGIN_HISTORY_LIMIT).await?;

    Ok((
        StatusCode::OK,
        Json(LoginHistoryResponse {
            success: true,
            history,
        }),
    ))
}
