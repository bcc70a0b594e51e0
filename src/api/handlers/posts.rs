//! Scheduled post handlers.
//!
//! Posting times cross the API as `dd/mm/yyyy HH:mm` strings because that is
//! the contract with the automation flows; they are stored as UTC timestamps.
//! Scheduling is check-then-act: the flow is called first, and the post only
//! moves to `scheduled` after a 2xx reply.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{Pagination, PaginationQuery};
use crate::api::middleware::auth::{require_permission, CurrentUser};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::permission::Permission;
use crate::models::post::{PostStatus, ScheduledPost};
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::event_bus::DomainEvent;
use crate::services::webhook_service::{format_posting_time, parse_posting_time, AutomationHook};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/:id", get(get_post).patch(update_post).delete(delete_post))
        .route("/:id/schedule", post(schedule_post))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPostsQuery {
    pub status: Option<PostStatus>,
    pub project_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    /// Requested page number (default: 1)
    pub page: Option<u32>,
    /// Requested items per page (default: 20, max: 100)
    pub per_page: Option<u32>,
}

impl ListPostsQuery {
    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostListResponse {
    pub posts: Vec<ScheduledPost>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: Option<String>,
    pub media_url: Option<String>,
    /// `dd/mm/yyyy HH:mm`, interpreted as UTC
    pub posting_time: Option<String>,
    pub project_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub media_url: Option<String>,
    /// `dd/mm/yyyy HH:mm`, interpreted as UTC
    pub posting_time: Option<String>,
    pub status: Option<PostStatus>,
    pub project_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
}

/// Parses an inbound posting time, treating empty as absent.
fn parse_optional_posting_time(
    value: Option<&str>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(Some(parse_posting_time(v)?.and_utc())),
        _ => Ok(None),
    }
}

/// A status change counts as publishing only when it lands on `published`
/// from somewhere else.
fn is_publish_transition(old: PostStatus, new: Option<PostStatus>) -> bool {
    matches!(new, Some(PostStatus::Published)) && old != PostStatus::Published
}

async fn fetch_post(state: &SharedState, id: Uuid) -> Result<ScheduledPost> {
    sqlx::query_as::<_, ScheduledPost>("SELECT * FROM scheduled_posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/posts",
    tag = "posts",
    params(ListPostsQuery),
    responses(
        (status = 200, description = "List of posts", body = PostListResponse),
        (status = 403, description = "Missing posts.view permission")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_posts(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PostListResponse>> {
    require_permission(&state, &actor, Permission::PostsView).await?;

    let posts = sqlx::query_as::<_, ScheduledPost>(
        r#"
        SELECT * FROM scheduled_posts
        WHERE ($1::post_status IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR project_id = $2)
          AND ($3::uuid IS NULL OR account_id = $3)
        ORDER BY created_at DESC
        OFFSET $4 LIMIT $5
        "#,
    )
    .bind(query.status)
    .bind(query.project_id)
    .bind(query.account_id)
    .bind(query.pagination().offset())
    .bind(query.pagination().limit())
    .fetch_all(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM scheduled_posts
        WHERE ($1::post_status IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR project_id = $2)
          AND ($3::uuid IS NULL OR account_id = $3)
        "#,
    )
    .bind(query.status)
    .bind(query.project_id)
    .bind(query.account_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(PostListResponse {
        posts,
        pagination: Pagination::from_query_and_total(&query.pagination(), total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/posts",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post details", body = ScheduledPost),
        (status = 404, description = "Post not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_post(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledPost>> {
    require_permission(&state, &actor, Permission::PostsView).await?;
    Ok(Json(fetch_post(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/posts",
    tag = "posts",
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Post created as draft", body = ScheduledPost),
        (status = 400, description = "Missing title or malformed posting_time")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_post(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<ScheduledPost>> {
    require_permission(&state, &actor, Permission::PostsManage).await?;

    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    let posting_time = parse_optional_posting_time(payload.posting_time.as_deref())?;

    let post = sqlx::query_as::<_, ScheduledPost>(
        r#"
        INSERT INTO scheduled_posts
            (title, body, media_url, posting_time, project_id, account_id, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(payload.title.trim())
    .bind(&payload.body)
    .bind(&payload.media_url)
    .bind(posting_time)
    .bind(payload.project_id)
    .bind(payload.account_id)
    .bind(actor.user_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Create, EntityType::Post)
            .entity(post.id.to_string())
            .actor(actor.user_id)
            .description(format!("Created post {}", post.title)),
    );
    state.event_bus.publish(DomainEvent::now(
        "post.created",
        post.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(post))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/posts",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = ScheduledPost),
        (status = 400, description = "Malformed posting_time"),
        (status = 404, description = "Post not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_post(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<ScheduledPost>> {
    require_permission(&state, &actor, Permission::PostsManage).await?;

    let existing = fetch_post(&state, id).await?;
    let posting_time = parse_optional_posting_time(payload.posting_time.as_deref())?;
    let publishing = is_publish_transition(existing.status, payload.status);

    let post = sqlx::query_as::<_, ScheduledPost>(
        r#"
        UPDATE scheduled_posts SET
            title = COALESCE($2, title),
            body = COALESCE($3, body),
            media_url = COALESCE($4, media_url),
            posting_time = COALESCE($5, posting_time),
            status = COALESCE($6, status),
            project_id = COALESCE($7, project_id),
            account_id = COALESCE($8, account_id),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.title.as_deref().map(str::trim))
    .bind(&payload.body)
    .bind(&payload.media_url)
    .bind(posting_time)
    .bind(payload.status)
    .bind(payload.project_id)
    .bind(payload.account_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    let (activity, event) = if publishing {
        (ActivityType::Publish, "post.published")
    } else {
        (ActivityType::Update, "post.updated")
    };
    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(activity, EntityType::Post)
            .entity(post.id.to_string())
            .actor(actor.user_id)
            .description(format!("Updated post {}", post.title)),
    );
    state.event_bus.publish(DomainEvent::now(
        event,
        post.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(post))
}

#[utoipa::path(
    post,
    path = "/{id}/schedule",
    context_path = "/api/v1/posts",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post handed to the scheduling flow", body = ScheduledPost),
        (status = 400, description = "Post has no posting_time"),
        (status = 404, description = "Post not found"),
        (status = 500, description = "schedule-post webhook not configured"),
        (status = 502, description = "Scheduling flow failed; post unchanged")
    ),
    security(("session_cookie" = []))
)]
pub async fn schedule_post(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledPost>> {
    require_permission(&state, &actor, Permission::PostsSchedule).await?;

    let existing = fetch_post(&state, id).await?;
    let posting_time = existing.posting_time.ok_or_else(|| {
        AppError::Validation("posting_time must be set before scheduling".to_string())
    })?;

    let payload = serde_json::json!({
        "id": existing.id,
        "title": existing.title,
        "body": existing.body,
        "media_url": existing.media_url,
        "account_id": existing.account_id,
        "posting_time": format_posting_time(&posting_time.naive_utc()),
    });
    let reply = state
        .webhooks
        .forward(AutomationHook::SchedulePost, &payload)
        .await?;
    if !(200..300).contains(&reply.status) {
        return Err(AppError::Webhook(format!(
            "schedule-post webhook returned status {}",
            reply.status
        )));
    }

    let post = sqlx::query_as::<_, ScheduledPost>(
        "UPDATE scheduled_posts SET status = 'scheduled', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Schedule, EntityType::Post)
            .entity(post.id.to_string())
            .actor(actor.user_id)
            .description(format!("Scheduled post {}", post.title)),
    );
    state.event_bus.publish(DomainEvent::now(
        "post.scheduled",
        post.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/posts",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post deleted"),
        (status = 404, description = "Post not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_post(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    require_permission(&state, &actor, Permission::PostsManage).await?;

    let result = sqlx::query("DELETE FROM scheduled_posts WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Delete, EntityType::Post)
            .entity(id.to_string())
            .actor(actor.user_id)
            .description(format!("Deleted post {}", id)),
    );
    state.event_bus.publish(DomainEvent::now(
        "post.deleted",
        id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_posts,
        get_post,
        create_post,
        update_post,
        schedule_post,
        delete_post
    ),
    components(schemas(
        ScheduledPost,
        PostStatus,
        PostListResponse,
        CreatePostRequest,
        UpdatePostRequest
    ))
)]
pub struct PostsApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // posting_time handling
    // -----------------------------------------------------------------------

    #[test]
    fn test_optional_posting_time_parses() {
        let parsed = parse_optional_posting_time(Some("25/12/2025 18:30")).expect("ok");
        let time = parsed.expect("present");
        assert_eq!(time.to_rfc3339(), "2025-12-25T18:30:00+00:00");
    }

    #[test]
    fn test_optional_posting_time_absent_and_empty() {
        assert!(parse_optional_posting_time(None).expect("ok").is_none());
        assert!(parse_optional_posting_time(Some("")).expect("ok").is_none());
        assert!(parse_optional_posting_time(Some("   ")).expect("ok").is_none());
    }

    #[test]
    fn test_optional_posting_time_rejects_iso() {
        let err = parse_optional_posting_time(Some("2025-12-25T18:30:00Z")).expect_err("reject");
        assert!(err.to_string().contains("dd/mm/yyyy HH:mm"));
    }

    // -----------------------------------------------------------------------
    // Publish transition
    // -----------------------------------------------------------------------

    #[test]
    fn test_publish_transition_detected() {
        assert!(is_publish_transition(
            PostStatus::Draft,
            Some(PostStatus::Published)
        ));
        assert!(is_publish_transition(
            PostStatus::Scheduled,
            Some(PostStatus::Published)
        ));
    }

    #[test]
    fn test_publish_transition_ignores_other_changes() {
        assert!(!is_publish_transition(PostStatus::Draft, None));
        assert!(!is_publish_transition(
            PostStatus::Draft,
            Some(PostStatus::Scheduled)
        ));
        assert!(!is_publish_transition(
            PostStatus::Published,
            Some(PostStatus::Published)
        ));
    }

    #[test]
    fn test_update_request_posting_time_is_a_string() {
        let request: UpdatePostRequest =
            serde_json::from_str(r#"{"posting_time": "01/06/2026 09:00"}"#).expect("parse");
        assert_eq!(request.posting_time.as_deref(), Some("01/06/2026 09:00"));
    }
}
