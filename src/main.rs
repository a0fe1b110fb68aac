//! ProfileVault Backend Server
//!
//! HTTP entry point: loads configuration, connects to PostgreSQL, wires the
//! media store and serves the versioned API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};

use profilevault_server::auth::{PasswordHasher, SessionManager, TokenKeys};
use profilevault_server::config::Config;
use profilevault_server::state::AppState;
use profilevault_server::storage::{
    CloudinaryStore, InMemoryObjectStore, ObjectStore, Staging, UploadCoordinator,
};
use profilevault_server::users::{PgUserRepository, UserRepository, UserService};
use profilevault_server::{db, middleware, routes};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = ?e, "Server failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(environment = config.environment.as_str(), "Starting ProfileVault");

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let store: Arc<dyn ObjectStore> = match &config.cloudinary {
        Some(cloudinary) => {
            tracing::info!(cloud = %cloudinary.cloud_name, "Using Cloudinary media store");
            Arc::new(CloudinaryStore::new(cloudinary)?)
        }
        None => {
            tracing::warn!("Cloudinary not configured, media is kept in memory and lost on restart");
            Arc::new(InMemoryObjectStore::new())
        }
    };

    let staging = Staging::new(&config.upload_dir);
    staging
        .ensure_dir()
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;

    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db_pool));
    let token_keys = Arc::new(TokenKeys::from_config(&config));
    let user_service = Arc::new(UserService::new(
        users.clone(),
        SessionManager::new(users, token_keys.clone()),
        UploadCoordinator::new(store),
        PasswordHasher::new(config.bcrypt_cost),
    ));

    let app_state = AppState::new(
        user_service,
        token_keys,
        staging,
        config.secure_cookies(),
        config.max_upload_bytes,
    );

    let mut app = routes::build_router(app_state).layer(configure_cors(&config));
    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}{}/healthcheck", addr, routes::API_PREFIX);

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Cookies carry the session, so credentials are allowed; that rules out a
/// wildcard origin.
fn configure_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [header::AUTHORIZATION, header::CONTENT_TYPE];

    let origins: Vec<HeaderValue> = config
        .cors_origin
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ORIGIN not set, mirroring request origins (permissive)");
        return CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true);
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
