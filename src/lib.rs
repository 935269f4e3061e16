pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod services;
pub mod utils;

use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AcademyConfig;
use crate::error::AppError;
use crate::middleware::{ip_rate_limit_middleware, IpRateLimiter};
use crate::services::{AuditLogger, AuthService, Database, TokenService};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::session::login,
        handlers::auth::session::refresh,
        handlers::auth::session::logout,
        handlers::auth::session::logout_all,
        handlers::auth::session::me,
        handlers::auth::sessions::list_sessions,
        handlers::auth::sessions::revoke_session,
        handlers::auth::password::forgot_password,
        handlers::auth::password::reset_password,
        handlers::auth::password::change_password,
        handlers::students::get_student,
        handlers::students::login_history,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::RefreshRequest,
            dtos::auth::RefreshResponse,
            dtos::auth::LogoutRequest,
            dtos::auth::ForgotPasswordRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::auth::ChangePasswordRequest,
            dtos::auth::SessionsResponse,
            dtos::auth::MessageResponse,
            handlers::students::LoginHistoryResponse,
            models::PrincipalKind,
            models::PrincipalSummary,
            models::SessionInfo,
            models::LoginHistory,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, token refresh and logout"),
        (name = "Sessions", description = "Active session management"),
        (name = "Password", description = "Password reset and change"),
        (name = "Students", description = "Student records"),
        (name = "Audit", description = "Login history"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AcademyConfig,
    pub db: Database,
    pub tokens: TokenService,
    pub auth: AuthService,
    pub audit: AuditLogger,
    pub login_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    // Login and forgot-password carry their own IP quotas.
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::session::login))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    let reset_limiter = state.password_reset_rate_limiter.clone();
    let forgot_route = Router::new()
        .route(
            "/auth/forgot_password",
            post(handlers::auth::password::forgot_password),
        )
        .layer(from_fn_with_state(reset_limiter, ip_rate_limit_middleware));

    let protected = Router::new()
        .route("/auth/logout", post(handlers::auth::session::logout))
        .route("/auth/logout_all", post(handlers::auth::session::logout_all))
        .route("/auth/me", get(handlers::auth::session::me))
        .route("/auth/sessions", get(handlers::auth::sessions::list_sessions))
        .route(
            "/auth/sessions/:session_id",
            delete(handlers::auth::sessions::revoke_session),
        )
        .route(
            "/auth/change_password",
            post(handlers::auth::password::change_password),
        )
        .route("/students/:student_id", get(handlers::students::get_student))
        .route("/login_history", get(handlers::students::login_history))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new().route("/health", get(health_check));

    if state.config.security.enable_swagger {
        app = app
            .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));
    }

    let cors = cors_layer(&state.config)?;

    let app = app
        .merge(login_route)
        .merge(forgot_route)
        .route("/auth/refresh", post(handlers::auth::session::refresh))
        .route(
            "/auth/reset_password",
            post(handlers::auth::password::reset_password),
        )
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

fn cors_layer(config: &AcademyConfig) -> Result<CorsLayer, AppError> {
    let origins = config
        .security
        .allowed_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| AppError::Config(anyhow::anyhow!("Invalid CORS origin {}: {}", o, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]))
}

/// Service health, including a database round-trip
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Database unreachable")
    ),
    tag = "Observability"
)]
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::health_check(state.db.pool()).await?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
