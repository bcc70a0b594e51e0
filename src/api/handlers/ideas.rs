//! Content idea handlers. Ideas move draft -> approved/rejected before any
//! post is produced from them.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{Pagination, PaginationQuery};
use crate::api::middleware::auth::{require_permission, CurrentUser};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::idea::{ContentIdea, IdeaStatus};
use crate::models::permission::Permission;
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::event_bus::DomainEvent;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_ideas).post(create_idea))
        .route("/:id", get(get_idea).patch(update_idea).delete(delete_idea))
        .route("/:id/approve", post(approve_idea))
        .route("/:id/reject", post(reject_idea))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListIdeasQuery {
    pub status: Option<IdeaStatus>,
    pub project_id: Option<Uuid>,
    /// Requested page number (default: 1)
    pub page: Option<u32>,
    /// Requested items per page (default: 20, max: 100)
    pub per_page: Option<u32>,
}

impl ListIdeasQuery {
    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct IdeaListResponse {
    pub ideas: Vec<ContentIdea>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIdeaRequest {
    pub title: String,
    pub notes: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIdeaRequest {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub project_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/ideas",
    tag = "ideas",
    params(ListIdeasQuery),
    responses(
        (status = 200, description = "List of ideas", body = IdeaListResponse),
        (status = 403, description = "Missing ideas.view permission")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_ideas(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<ListIdeasQuery>,
) -> Result<Json<IdeaListResponse>> {
    require_permission(&state, &actor, Permission::IdeasView).await?;

    let ideas = sqlx::query_as::<_, ContentIdea>(
        r#"
        SELECT * FROM content_ideas
        WHERE ($1::idea_status IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR project_id = $2)
        ORDER BY created_at DESC
        OFFSET $3 LIMIT $4
        "#,
    )
    .bind(query.status)
    .bind(query.project_id)
    .bind(query.pagination().offset())
    .bind(query.pagination().limit())
    .fetch_all(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM content_ideas
        WHERE ($1::idea_status IS NULL OR status = $1)
          AND ($2::uuid IS NULL OR project_id = $2)
        "#,
    )
    .bind(query.status)
    .bind(query.project_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(IdeaListResponse {
        ideas,
        pagination: Pagination::from_query_and_total(&query.pagination(), total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/ideas",
    tag = "ideas",
    params(("id" = Uuid, Path, description = "Idea id")),
    responses(
        (status = 200, description = "Idea details", body = ContentIdea),
        (status = 404, description = "Idea not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_idea(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentIdea>> {
    require_permission(&state, &actor, Permission::IdeasView).await?;
    Ok(Json(fetch_idea(&state, id).await?))
}

async fn fetch_idea(state: &SharedState, id: Uuid) -> Result<ContentIdea> {
    sqlx::query_as::<_, ContentIdea>("SELECT * FROM content_ideas WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Idea not found".to_string()))
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/ideas",
    tag = "ideas",
    request_body = CreateIdeaRequest,
    responses(
        (status = 200, description = "Idea created as draft", body = ContentIdea),
        (status = 400, description = "Missing title")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_idea(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateIdeaRequest>,
) -> Result<Json<ContentIdea>> {
    require_permission(&state, &actor, Permission::IdeasManage).await?;

    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }

    let idea = sqlx::query_as::<_, ContentIdea>(
        r#"
        INSERT INTO content_ideas (title, notes, project_id, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(payload.title.trim())
    .bind(&payload.notes)
    .bind(payload.project_id)
    .bind(actor.user_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Create, EntityType::Idea)
            .entity(idea.id.to_string())
            .actor(actor.user_id)
            .description(format!("Created idea {}", idea.title)),
    );
    state.event_bus.publish(DomainEvent::now(
        "idea.created",
        idea.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(idea))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/ideas",
    tag = "ideas",
    params(("id" = Uuid, Path, description = "Idea id")),
    request_body = UpdateIdeaRequest,
    responses(
        (status = 200, description = "Idea updated", body = ContentIdea),
        (status = 404, description = "Idea not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_idea(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateIdeaRequest>,
) -> Result<Json<ContentIdea>> {
    require_permission(&state, &actor, Permission::IdeasManage).await?;

    let idea = sqlx::query_as::<_, ContentIdea>(
        r#"
        UPDATE content_ideas SET
            title = COALESCE($2, title),
            notes = COALESCE($3, notes),
            project_id = COALESCE($4, project_id),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.title.as_deref().map(str::trim))
    .bind(&payload.notes)
    .bind(payload.project_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?
    .ok_or_else(|| AppError::NotFound("Idea not found".to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Update, EntityType::Idea)
            .entity(idea.id.to_string())
            .actor(actor.user_id)
            .description(format!("Updated idea {}", idea.title)),
    );
    state.event_bus.publish(DomainEvent::now(
        "idea.updated",
        idea.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(idea))
}

async fn transition_idea(
    state: &SharedState,
    actor: &CurrentUser,
    id: Uuid,
    to: IdeaStatus,
    activity: ActivityType,
    event: &str,
) -> Result<ContentIdea> {
    let current = fetch_idea(state, id).await?;
    if current.status == to {
        return Err(AppError::Conflict(format!(
            "Idea is already {}",
            serde_json::to_value(to)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default()
        )));
    }

    let idea = sqlx::query_as::<_, ContentIdea>(
        "UPDATE content_ideas SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(to)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(activity, EntityType::Idea)
            .entity(idea.id.to_string())
            .actor(actor.user_id)
            .description(format!("Idea {} marked {}", idea.title, event)),
    );
    state.event_bus.publish(DomainEvent::now(
        format!("idea.{}", event),
        idea.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(idea)
}

#[utoipa::path(
    post,
    path = "/{id}/approve",
    context_path = "/api/v1/ideas",
    tag = "ideas",
    params(("id" = Uuid, Path, description = "Idea id")),
    responses(
        (status = 200, description = "Idea approved", body = ContentIdea),
        (status = 404, description = "Idea not found"),
        (status = 409, description = "Already approved")
    ),
    security(("session_cookie" = []))
)]
pub async fn approve_idea(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentIdea>> {
    require_permission(&state, &actor, Permission::IdeasManage).await?;
    let idea = transition_idea(
        &state,
        &actor,
        id,
        IdeaStatus::Approved,
        ActivityType::Approve,
        "approved",
    )
    .await?;
    Ok(Json(idea))
}

#[utoipa::path(
    post,
    path = "/{id}/reject",
    context_path = "/api/v1/ideas",
    tag = "ideas",
    params(("id" = Uuid, Path, description = "Idea id")),
    responses(
        (status = 200, description = "Idea rejected", body = ContentIdea),
        (status = 404, description = "Idea not found"),
        (status = 409, description = "Already rejected")
    ),
    security(("session_cookie" = []))
)]
pub async fn reject_idea(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentIdea>> {
    require_permission(&state, &actor, Permission::IdeasManage).await?;
    let idea = transition_idea(
        &state,
        &actor,
        id,
        IdeaStatus::Rejected,
        ActivityType::Update,
        "rejected",
    )
    .await?;
    Ok(Json(idea))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/ideas",
    tag = "ideas",
    params(("id" = Uuid, Path, description = "Idea id")),
    responses(
        (status = 200, description = "Idea deleted"),
        (status = 404, description = "Idea not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_idea(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    require_permission(&state, &actor, Permission::IdeasManage).await?;

    let result = sqlx::query("DELETE FROM content_ideas WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Idea not found".to_string()));
    }

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Delete, EntityType::Idea)
            .entity(id.to_string())
            .actor(actor.user_id)
            .description(format!("Deleted idea {}", id)),
    );
    state.event_bus.publish(DomainEvent::now(
        "idea.deleted",
        id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_ideas,
        get_idea,
        create_idea,
        update_idea,
        approve_idea,
        reject_idea,
        delete_idea
    ),
    components(schemas(
        ContentIdea,
        IdeaStatus,
        IdeaListResponse,
        CreateIdeaRequest,
        UpdateIdeaRequest
    ))
)]
pub struct IdeasApiDoc;
