//! Connected social account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Sentinel that replaces a stored secret in every outbound response.
/// Receiving it back on an update means "leave the stored value unchanged".
pub const SECRET_MASK: &str = "******";

/// Social platform an account is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "platform", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
    Facebook,
    Linkedin,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Facebook => "facebook",
            Platform::Linkedin => "linkedin",
        }
    }
}

/// Connected social account row.
///
/// `access_token_enc` and `client_secret_enc` hold cipher output, never
/// plaintext. The struct deliberately does not implement `Serialize`; the
/// only serializable view is the masked response type in the accounts
/// handler, so ciphertext cannot leak through a forgotten code path.
#[derive(Clone, FromRow)]
pub struct ConnectedAccount {
    pub id: Uuid,
    pub platform: Platform,
    pub channel_id: String,
    pub channel_name: String,
    pub channel_link: Option<String>,
    pub access_token_enc: String,
    pub client_id: Option<String>,
    pub client_secret_enc: Option<String>,
    pub project_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

redacted_debug!(ConnectedAccount {
    show id,
    show platform,
    show channel_id,
    show channel_name,
    show channel_link,
    redact access_token_enc,
    show client_id,
    redact_option client_secret_enc,
    show project_id,
    show is_active,
});
