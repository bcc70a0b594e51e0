//! Activity audit logging.
//!
//! Append-only record of business and security events. There is no update
//! or delete path; the table only grows. Writes triggered by another
//! operation go through [`ActivityService::record_detached`], which runs on
//! its own task so a logging failure can only produce a warning, never an
//! error in the operation that triggered it.

use crate::error::{AppError, Result};
use crate::models::activity::{ActivityLog, ActivityType, EntityType};
use sqlx::PgPool;
use uuid::Uuid;

/// One activity entry under construction.
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    activity_type: ActivityType,
    entity_type: EntityType,
    entity_id: Option<String>,
    actor_id: Option<Uuid>,
    description: String,
    old_values: Option<serde_json::Value>,
    new_values: Option<serde_json::Value>,
}

impl ActivityEntry {
    pub fn new(activity_type: ActivityType, entity_type: EntityType) -> Self {
        Self {
            activity_type,
            entity_type,
            entity_id: None,
            actor_id: None,
            description: String::new(),
            old_values: None,
            new_values: None,
        }
    }

    /// Row id or page name the entry points at.
    pub fn entity(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Acting user, when one is identifiable.
    pub fn actor(mut self, user_id: Uuid) -> Self {
        self.actor_id = Some(user_id);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// State before a mutation, for update and delete entries.
    pub fn old_values(mut self, values: serde_json::Value) -> Self {
        self.old_values = Some(values);
        self
    }

    /// State after a mutation.
    pub fn new_values(mut self, values: serde_json::Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

/// Optional filters for querying the log. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub activity_type: Option<ActivityType>,
    pub entity_type: Option<EntityType>,
    pub actor_id: Option<Uuid>,
}

/// Writes and queries the activity log.
#[derive(Clone)]
pub struct ActivityService {
    db: PgPool,
}

impl ActivityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Append one entry and return its id.
    pub async fn record(&self, entry: ActivityEntry) -> Result<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO activity_log
                (activity_type, entity_type, entity_id, actor_id, description, old_values, new_values)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(entry.activity_type)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.actor_id)
        .bind(entry.description)
        .bind(entry.old_values)
        .bind(entry.new_values)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Append one entry on a detached task.
    ///
    /// Used wherever logging rides along with a business operation: the
    /// operation's response never waits on the insert, and an insert
    /// failure only logs a warning.
    pub fn record_detached(&self, entry: ActivityEntry) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.record(entry).await {
                tracing::warn!(error = %e, "Activity log write failed");
            }
        });
    }

    /// Query the log, newest first, with optional filters and pagination.
    /// Returns the page of entries and the total match count.
    pub async fn query(
        &self,
        filter: &ActivityFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ActivityLog>, i64)> {
        let entries = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT * FROM activity_log
            WHERE ($1::activity_type IS NULL OR activity_type = $1)
              AND ($2::entity_type IS NULL OR entity_type = $2)
              AND ($3::uuid IS NULL OR actor_id = $3)
            ORDER BY created_at DESC
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(filter.activity_type)
        .bind(filter.entity_type)
        .bind(filter.actor_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM activity_log
            WHERE ($1::activity_type IS NULL OR activity_type = $1)
              AND ($2::entity_type IS NULL OR entity_type = $2)
              AND ($3::uuid IS NULL OR actor_id = $3)
            "#,
        )
        .bind(filter.activity_type)
        .bind(filter.entity_type)
        .bind(filter.actor_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((entries, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Entry builder
    // -----------------------------------------------------------------------

    #[test]
    fn test_entry_builder_minimal() {
        let entry = ActivityEntry::new(ActivityType::VisitPage, EntityType::Page);
        assert_eq!(entry.activity_type, ActivityType::VisitPage);
        assert_eq!(entry.entity_type, EntityType::Page);
        assert!(entry.entity_id.is_none());
        assert!(entry.actor_id.is_none());
        assert!(entry.description.is_empty());
    }

    #[test]
    fn test_entry_builder_full() {
        let actor = Uuid::new_v4();
        let entry = ActivityEntry::new(ActivityType::Update, EntityType::Post)
            .entity("42a1")
            .actor(actor)
            .description("Edited post title")
            .old_values(serde_json::json!({"title": "Before"}))
            .new_values(serde_json::json!({"title": "After"}));
        assert_eq!(entry.entity_id.as_deref(), Some("42a1"));
        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.description, "Edited post title");
        assert_eq!(entry.old_values.as_ref().and_then(|v| v["title"].as_str()), Some("Before"));
        assert_eq!(entry.new_values.as_ref().and_then(|v| v["title"].as_str()), Some("After"));
    }

    #[test]
    fn test_denial_entry_shape() {
        let actor = Uuid::new_v4();
        let entry = ActivityEntry::new(ActivityType::UnauthorizedAccess, EntityType::Page)
            .entity("roles")
            .actor(actor)
            .description("editor@example.com attempted to access roles without permission");
        assert_eq!(entry.activity_type, ActivityType::UnauthorizedAccess);
        assert_eq!(entry.entity_id.as_deref(), Some("roles"));
        assert_eq!(entry.actor_id, Some(actor));
    }

    // -----------------------------------------------------------------------
    // Detached writes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_record_detached_never_errors_caller() {
        // Unreachable database: the spawned insert fails, the caller does not.
        let pool = PgPool::connect_lazy("postgresql://cd:cd@127.0.0.1:1/contentdesk")
            .expect("lazy pool");
        let service = ActivityService::new(pool);
        service.record_detached(
            ActivityEntry::new(ActivityType::Login, EntityType::User).description("login"),
        );
        // Give the spawned task a chance to run and fail quietly.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    #[test]
    fn test_default_filter_matches_everything() {
        let filter = ActivityFilter::default();
        assert!(filter.activity_type.is_none());
        assert!(filter.entity_type.is_none());
        assert!(filter.actor_id.is_none());
    }
}
