//! Activity log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of event an activity entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "activity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Create,
    Update,
    Delete,
    Approve,
    Publish,
    Schedule,
    Login,
    Logout,
    UnauthorizedAccess,
    VisitPage,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Create => "create",
            ActivityType::Update => "update",
            ActivityType::Delete => "delete",
            ActivityType::Approve => "approve",
            ActivityType::Publish => "publish",
            ActivityType::Schedule => "schedule",
            ActivityType::Login => "login",
            ActivityType::Logout => "logout",
            ActivityType::UnauthorizedAccess => "unauthorized_access",
            ActivityType::VisitPage => "visit_page",
        }
    }
}

/// Kind of entity an activity entry points at.
///
/// `Page` covers dashboard views and denied modules, where the entity id is
/// a page or module name rather than a row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "entity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Idea,
    Post,
    Account,
    Project,
    User,
    Role,
    Page,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Idea => "idea",
            EntityType::Post => "post",
            EntityType::Account => "account",
            EntityType::Project => "project",
            EntityType::User => "user",
            EntityType::Role => "role",
            EntityType::Page => "page",
        }
    }
}

/// Persisted activity entry. Append-only; there is no update or delete path.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ActivityLog {
    pub id: Uuid,
    pub activity_type: ActivityType,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub actor_id: Option<Uuid>,
    pub description: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // ActivityType
    // -----------------------------------------------------------------------

    #[test]
    fn test_activity_type_as_str() {
        assert_eq!(ActivityType::Create.as_str(), "create");
        assert_eq!(ActivityType::UnauthorizedAccess.as_str(), "unauthorized_access");
        assert_eq!(ActivityType::VisitPage.as_str(), "visit_page");
    }

    #[test]
    fn test_activity_type_serde_matches_as_str() {
        for activity_type in [
            ActivityType::Create,
            ActivityType::Update,
            ActivityType::Delete,
            ActivityType::Approve,
            ActivityType::Publish,
            ActivityType::Schedule,
            ActivityType::Login,
            ActivityType::Logout,
            ActivityType::UnauthorizedAccess,
            ActivityType::VisitPage,
        ] {
            let json = serde_json::to_string(&activity_type).expect("json");
            assert_eq!(json, format!("\"{}\"", activity_type.as_str()));
        }
    }

    #[test]
    fn test_activity_type_deserializes_from_filter_value() {
        let parsed: ActivityType =
            serde_json::from_str("\"unauthorized_access\"").expect("parse");
        assert_eq!(parsed, ActivityType::UnauthorizedAccess);
    }

    // -----------------------------------------------------------------------
    // EntityType
    // -----------------------------------------------------------------------

    #[test]
    fn test_entity_type_as_str() {
        assert_eq!(EntityType::Account.as_str(), "account");
        assert_eq!(EntityType::Page.as_str(), "page");
    }

    #[test]
    fn test_entity_type_serde_matches_as_str() {
        for entity_type in [
            EntityType::Idea,
            EntityType::Post,
            EntityType::Account,
            EntityType::Project,
            EntityType::User,
            EntityType::Role,
            EntityType::Page,
        ] {
            let json = serde_json::to_string(&entity_type).expect("json");
            assert_eq!(json, format!("\"{}\"", entity_type.as_str()));
        }
    }
}
