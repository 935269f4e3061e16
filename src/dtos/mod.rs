pub mod auth;

pub use auth::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    MessageResponse, RefreshRequest, RefreshResponse, ResetPasswordRequest, SessionsResponse,
};

use serde::Serialize;
use utoipa::ToSchema;

/// Uniform error body. Mirrors the shape produced by the error adapter so
/// extractor rejections and handler failures look the same to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
