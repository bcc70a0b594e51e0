//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;

/// Application configuration.
///
/// Loaded once at startup. The session signing secret and the cipher
/// passphrase are required; the process refuses to start without them rather
/// than falling back to a built-in value.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub environment: String,
    pub cors_origins: String,
    /// Secret that signs session credentials.
    pub session_secret: String,
    /// Passphrase the secret cipher derives its AES key from.
    pub encryption_key: String,
    /// Session lifetime in days.
    pub session_ttl_days: i64,
    pub webhook_schedule_post_url: Option<String>,
    pub webhook_edit_media_url: Option<String>,
    pub webhook_update_post_url: Option<String>,
    pub webhook_remove_post_url: Option<String>,
    pub webhook_engagement_url: Option<String>,
    pub media_upload_url: Option<String>,
    pub admin_email: String,
    pub admin_password: Option<String>,
}

redacted_debug!(Config {
    show database_url,
    show bind_address,
    show environment,
    show cors_origins,
    redact session_secret,
    redact encryption_key,
    show session_ttl_days,
    show webhook_schedule_post_url,
    show webhook_edit_media_url,
    show webhook_update_post_url,
    show webhook_remove_post_url,
    show webhook_engagement_url,
    show media_upload_url,
    show admin_email,
    redact_option admin_password,
});

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL not set".to_string()))?,
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            session_secret: env::var("SESSION_SECRET")
                .map_err(|_| AppError::Config("SESSION_SECRET not set".to_string()))?,
            encryption_key: env::var("ENCRYPTION_KEY")
                .map_err(|_| AppError::Config("ENCRYPTION_KEY not set".to_string()))?,
            session_ttl_days: env::var("SESSION_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            webhook_schedule_post_url: env::var("WEBHOOK_SCHEDULE_POST_URL").ok(),
            webhook_edit_media_url: env::var("WEBHOOK_EDIT_MEDIA_URL").ok(),
            webhook_update_post_url: env::var("WEBHOOK_UPDATE_POST_URL").ok(),
            webhook_remove_post_url: env::var("WEBHOOK_REMOVE_POST_URL").ok(),
            webhook_engagement_url: env::var("WEBHOOK_ENGAGEMENT_URL").ok(),
            media_upload_url: env::var("MEDIA_UPLOAD_URL").ok(),
            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@localhost".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        })
    }
}
