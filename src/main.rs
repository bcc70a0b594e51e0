//! ContentDesk - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rand::Rng;

use contentdesk_backend::{
    api,
    config::Config,
    db,
    error::{AppError, Result},
    services::{auth_service::AuthService, permission_service::PermissionService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contentdesk_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; missing SESSION_SECRET or ENCRYPTION_KEY fails here
    let config = Config::from_env()?;
    tracing::info!("Starting ContentDesk backend");

    // Connect to database
    let db_pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Database migrations complete");

    // Refuse to start with grants pointing at permissions that no longer exist
    PermissionService::new(db_pool.clone())
        .validate_grants()
        .await?;

    // Provision admin user on first boot
    provision_admin_user(&db_pool, &config).await?;

    // Create application state
    let state = Arc::new(api::AppState::new(config.clone(), db_pool));

    // Build router
    let app = Router::new()
        .merge(api::routes::create_router(state))
        .layer({
            // In production the frontend is served from the same origin, so
            // credentials + same-origin work without an explicit allow-origin.
            // In development the dashboard dev server runs on a different
            // port, so we must whitelist that origin and enable credentials
            // for the session cookie.
            if config.environment == "development" {
                let origins: Vec<_> = config
                    .cors_origins
                    .split(',')
                    .map(|s| s.trim().parse().expect("invalid CORS origin"))
                    .collect();
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::PATCH,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([
                        header::CONTENT_TYPE,
                        header::AUTHORIZATION,
                        header::ACCEPT,
                        header::COOKIE,
                    ])
                    .allow_credentials(true)
            } else {
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        })
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Provision the initial admin user on first boot.
///
/// The `admin` role itself is seeded by migrations; this creates a user
/// holding it when none exists, with `ADMIN_PASSWORD` or a generated one.
async fn provision_admin_user(db: &sqlx::PgPool, config: &Config) -> Result<()> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE role_id = 'admin' AND is_active = true",
    )
    .fetch_one(db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    if existing > 0 {
        return Ok(());
    }

    let (password, generated) = match &config.admin_password {
        Some(p) if !p.is_empty() => (p.clone(), false),
        _ => {
            const CHARSET: &[u8] =
                b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789!@#$%&*";
            let mut rng = rand::rng();
            let p: String = (0..20)
                .map(|_| {
                    let idx = rng.random_range(0..CHARSET.len());
                    CHARSET[idx] as char
                })
                .collect();
            (p, true)
        }
    };

    let password_hash = AuthService::hash_password(&password)?;

    sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, display_name, role_id)
        VALUES ($1, $2, 'Administrator', 'admin')
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(&config.admin_email)
    .bind(&password_hash)
    .execute(db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    if generated {
        tracing::info!(
            "\n\
            ===========================================================\n\
            \n\
              Initial admin user created.\n\
            \n\
              Email:     {}\n\
              Password:  {}\n\
            \n\
              Set ADMIN_PASSWORD to control this on next first boot.\n\
            \n\
            ===========================================================",
            config.admin_email,
            password,
        );
    } else {
        tracing::info!("Admin user created with password from ADMIN_PASSWORD env var");
    }

    Ok(())
}
