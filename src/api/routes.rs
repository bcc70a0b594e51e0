//! Route definitions for the API.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use std::sync::Arc;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers;
use super::middleware::auth::session_middleware;
use super::middleware::rate_limit::{rate_limit_middleware, RateLimiter};
use super::middleware::security_headers::security_headers_middleware;
use super::SharedState;
use crate::services::auth_service::AuthService;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    // Build OpenAPI spec once at startup
    let openapi = super::openapi::build_openapi();

    Router::new()
        // Health endpoints (no auth required)
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        // OpenAPI spec (served by SwaggerUi at /api/v1/openapi.json) and Swagger UI
        .merge(SwaggerUi::new("/docs").url("/api/v1/openapi.json", openapi))
        // API v1 routes
        .nest("/api/v1", api_v1_routes(state.clone()))
        .layer(middleware::from_fn(security_headers_middleware))
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes(state: SharedState) -> Router<SharedState> {
    // Create an AuthService for middleware use
    let auth_service = Arc::new(AuthService::new(
        state.db.clone(),
        Arc::new(state.config.clone()),
    ));

    // Rate limiters: strict for login (30 req/min), general for API (1000 req/min)
    let auth_rate_limiter = Arc::new(RateLimiter::new(30, 60));
    let api_rate_limiter = Arc::new(RateLimiter::new(1000, 60));

    Router::new()
        // Login/logout - no session required, tight rate limit against
        // credential stuffing
        .nest(
            "/auth",
            handlers::auth::public_router().layer(middleware::from_fn_with_state(
                auth_rate_limiter,
                rate_limit_middleware,
            )),
        )
        // Session introspection (me, my permissions)
        .nest(
            "/auth",
            handlers::auth::protected_router().layer(middleware::from_fn_with_state(
                auth_service.clone(),
                session_middleware,
            )),
        )
        // User management routes
        .nest(
            "/users",
            handlers::users::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    session_middleware,
                )),
        )
        // Role and grant management routes
        .nest(
            "/roles",
            handlers::roles::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    session_middleware,
                )),
        )
        // Permission catalog (any signed-in user)
        .nest(
            "/permissions",
            handlers::permissions::router().layer(middleware::from_fn_with_state(
                auth_service.clone(),
                session_middleware,
            )),
        )
        // Connected social accounts
        .nest(
            "/accounts",
            handlers::accounts::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    session_middleware,
                )),
        )
        // Project routes
        .nest(
            "/projects",
            handlers::projects::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    session_middleware,
                )),
        )
        // Content idea routes
        .nest(
            "/ideas",
            handlers::ideas::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    session_middleware,
                )),
        )
        // Post drafting and scheduling routes
        .nest(
            "/posts",
            handlers::posts::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    session_middleware,
                )),
        )
        // Activity log routes
        .nest(
            "/activity",
            handlers::activity::router().layer(middleware::from_fn_with_state(
                auth_service.clone(),
                session_middleware,
            )),
        )
        // Automation webhook proxies
        .nest(
            "/automation",
            handlers::automation::router()
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
                .layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    session_middleware,
                )),
        )
        // Domain event stream (SSE)
        .nest(
            "/events",
            handlers::events::router().layer(middleware::from_fn_with_state(
                auth_service,
                session_middleware,
            )),
        )
        // General API rate limiting
        .layer(middleware::from_fn_with_state(
            api_rate_limiter,
            rate_limit_middleware,
        ))
}
