use academy_auth::{
    build_router,
    config::AcademyConfig,
    db,
    middleware::create_ip_rate_limiter,
    observability::init_tracing,
    services::{AuditLogger, AuthService, Database, TokenService},
    AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;

const REVOKED_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), academy_auth::error::AppError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = AcademyConfig::from_env()?;

    init_tracing(&config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authentication service"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database initialized");

    let database = Database::new(pool);
    let tokens = TokenService::new(&config.jwt);
    let audit = AuditLogger::new(database.clone());
    let auth = AuthService::new(
        database.clone(),
        tokens.clone(),
        audit.clone(),
        config.security.clone(),
    );

    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let password_reset_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.password_reset_attempts,
        config.rate_limit.password_reset_window_seconds,
    );
    tracing::info!("Rate limiters initialized: Login and Password Reset");

    // Periodic cleanup of revocation rows whose tokens have expired anyway,
    // and of reset tokens that were issued but never consumed.
    let prune_db = database.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REVOKED_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            match prune_db.prune_revoked().await {
                Ok(0) => {}
                Ok(n) => tracing::info!(pruned = n, "Pruned expired revoked tokens"),
                Err(err) => tracing::warn!(error = %err, "Failed to prune revoked tokens"),
            }
            match prune_db.prune_reset_tokens().await {
                Ok(0) => {}
                Ok(n) => tracing::info!(pruned = n, "Pruned expired reset tokens"),
                Err(err) => tracing::warn!(error = %err, "Failed to prune reset tokens"),
            }
        }
    });

    let state = AppState {
        config: config.clone(),
        db: database,
        tokens,
        auth,
        audit,
        login_rate_limiter,
        password_reset_rate_limiter,
    };

    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
