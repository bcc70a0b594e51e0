//! Content idea model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Editorial state of a content idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "idea_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IdeaStatus {
    Draft,
    Approved,
    Rejected,
}

/// Content idea awaiting approval before production.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ContentIdea {
    pub id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub status: IdeaStatus,
    pub project_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(serde_json::to_string(&IdeaStatus::Approved).expect("json"), "\"approved\"");
        let parsed: IdeaStatus = serde_json::from_str("\"rejected\"").expect("parse");
        assert_eq!(parsed, IdeaStatus::Rejected);
    }
}
