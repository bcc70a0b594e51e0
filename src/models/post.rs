//! Scheduled post model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

/// Post prepared for one connected account.
///
/// `posting_time` stays empty on drafts; scheduling requires it.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ScheduledPost {
    pub id: Uuid,
    pub title: String,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub posting_time: Option<DateTime<Utc>>,
    pub status: PostStatus,
    pub project_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
