//! Shared helpers for integration tests.
//!
//! Every test here runs against the in-process router; no HTTP server or
//! live database is needed. The state behind the router holds a lazily
//! created pool pointing at an unreachable address (port 1), so any code
//! path that actually touches storage fails fast with a connection error.
//! The fail-closed tests rely on exactly that.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use contentdesk_backend::api::routes::create_router;
use contentdesk_backend::api::{AppState, SharedState};
use contentdesk_backend::config::Config;
use contentdesk_backend::models::user::User;
use contentdesk_backend::services::auth_service::AuthService;

pub const UNREACHABLE_DB: &str = "postgresql://cd:cd@127.0.0.1:1/contentdesk";

/// Production-shaped configuration pointing at nothing reachable.
pub fn test_config() -> Config {
    Config {
        database_url: UNREACHABLE_DB.to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        environment: "development".to_string(),
        cors_origins: String::new(),
        session_secret: "integration-test-session-secret".to_string(),
        encryption_key: "integration-test-encryption-key".to_string(),
        session_ttl_days: 7,
        webhook_schedule_post_url: None,
        webhook_edit_media_url: None,
        webhook_update_post_url: None,
        webhook_remove_post_url: None,
        webhook_engagement_url: None,
        media_upload_url: None,
        admin_email: "admin@localhost".to_string(),
        admin_password: None,
    }
}

pub fn test_state() -> SharedState {
    let config = test_config();
    let db = PgPool::connect_lazy(&config.database_url).expect("lazy pool");
    Arc::new(AppState::new(config, db))
}

/// The full application router, exactly as `main` assembles it.
pub fn test_app() -> Router {
    create_router(test_state())
}

/// Cookie header value carrying a freshly signed session for `role`.
pub fn session_cookie(role: &str) -> String {
    let config = test_config();
    let db = PgPool::connect_lazy(&config.database_url).expect("lazy pool");
    let auth = AuthService::new(db, Arc::new(config));
    let user = User {
        id: Uuid::new_v4(),
        email: format!("{role}@example.com"),
        password_hash: String::new(),
        display_name: "Integration Probe".to_string(),
        role_id: role.to_string(),
        is_active: true,
        last_login_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let token = auth.issue_session(&user).expect("issue session");
    format!("cd_session={token}")
}

/// Request with optional session cookie and optional JSON body.
pub fn json_request(
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<&serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub fn get(uri: &str) -> Request<Body> {
    json_request(Method::GET, uri, None, None)
}

pub fn get_as(uri: &str, cookie: &str) -> Request<Body> {
    json_request(Method::GET, uri, Some(cookie), None)
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    json_request(Method::POST, uri, None, Some(body))
}

pub fn post_json_as(uri: &str, cookie: &str, body: &serde_json::Value) -> Request<Body> {
    json_request(Method::POST, uri, Some(cookie), Some(body))
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Collect a response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("UTF-8 body")
}
