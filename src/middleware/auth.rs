//! Request authentication gate. Verifies the bearer token, consults the
//! revocation store, and re-checks the principal's state on every request.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::PrincipalKind;
use crate::services::TokenType;
use crate::AppState;

/// The authenticated caller, attached as a request extension once the gate
/// has passed.
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub id: i32,
    pub kind: PrincipalKind,
    pub email: String,
    pub role: String,
    /// jti of the presented access token
    pub jti: String,
    /// Expiry of the presented access token (Unix timestamp)
    pub exp: i64,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers().get(AUTHORIZATION))?;

    let claims = state.tokens.verify(token, TokenType::Access)?;

    if state.db.is_revoked(&claims.jti).await? {
        return Err(AppError::TokenRevoked);
    }

    let principal = state
        .db
        .find_principal(claims.user_type, claims.principal_id()?)
        .await?
        .ok_or(AppError::TokenInvalid)?;

    if !principal.is_active() {
        return Err(AppError::AccountDisabled);
    }

    if principal.token_issued_before_invalidation(claims.iat) {
        return Err(AppError::TokenRevoked);
    }

    request.extensions_mut().insert(AuthPrincipal {
        id: principal.id,
        kind: principal.kind,
        email: principal.email,
        role: principal.role,
        jti: claims.jti,
        exp: claims.exp,
    });

    Ok(next.run(request).await)
}

fn bearer_token(header: Option<&axum::http::HeaderValue>) -> Result<&str, AppError> {
    let value = header
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized("Missing authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("Invalid authorization header".to_string()))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthPrincipal>()
            .cloned()
            .ok_or(AppError::Unauthorized("Not authenticated".to_string()))
    }
}
