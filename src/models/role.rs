//! Role model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Reserved super-role id. Holders pass every permission check without a
/// stored grant; the role itself cannot be edited or deleted.
pub const ADMIN_ROLE: &str = "admin";

/// Role grouping a set of permission grants.
///
/// The id doubles as a URL-safe slug and as the foreign key users carry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validate a role id: lowercase alphanumeric with `-` or `_`, starting
/// with a letter, 2 to 40 characters.
pub fn valid_role_id(id: &str) -> bool {
    let len_ok = (2..=40).contains(&id.len());
    let starts_ok = id.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    len_ok
        && starts_ok
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
