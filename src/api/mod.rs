//! API module - HTTP handlers and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;

use crate::config::Config;
use crate::services::encryption::SecretCipher;
use crate::services::event_bus::EventBus;
use crate::services::webhook_service::WebhookService;
use sqlx::PgPool;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: PgPool,
    pub cipher: Arc<SecretCipher>,
    pub event_bus: Arc<EventBus>,
    pub webhooks: Arc<WebhookService>,
}

impl AppState {
    pub fn new(config: Config, db: PgPool) -> Self {
        let cipher = Arc::new(SecretCipher::from_passphrase(&config.encryption_key));
        let webhooks = Arc::new(WebhookService::new(config.clone()));
        Self {
            config,
            db,
            cipher,
            event_bus: Arc::new(EventBus::new(256)),
            webhooks,
        }
    }
}

/// Shared application state type used by all handlers.
pub type SharedState = Arc<AppState>;
