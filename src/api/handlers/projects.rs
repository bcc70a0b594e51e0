//! Project handlers. Projects group ideas, posts, and accounts per client.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::middleware::auth::{require_permission, CurrentUser};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::permission::Permission;
use crate::models::project::Project;
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::event_bus::DomainEvent;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListProjectsQuery {
    /// Include archived projects (default: false)
    pub include_inactive: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/projects",
    tag = "projects",
    params(ListProjectsQuery),
    responses(
        (status = 200, description = "List of projects", body = [Project]),
        (status = 403, description = "Missing projects.view permission")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_projects(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<Vec<Project>>> {
    require_permission(&state, &actor, Permission::ProjectsView).await?;

    let include_inactive = query.include_inactive.unwrap_or(false);
    let projects = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE ($1 OR is_active = true) ORDER BY name",
    )
    .bind(include_inactive)
    .fetch_all(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(projects))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/projects",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project details", body = Project),
        (status = 404, description = "Project not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_project(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>> {
    require_permission(&state, &actor, Permission::ProjectsView).await?;

    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    Ok(Json(project))
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 200, description = "Project created", body = Project),
        (status = 400, description = "Missing name")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_project(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<Json<Project>> {
    require_permission(&state, &actor, Permission::ProjectsManage).await?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    let project = sqlx::query_as::<_, Project>(
        "INSERT INTO projects (name, description) VALUES ($1, $2) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Create, EntityType::Project)
            .entity(project.id.to_string())
            .actor(actor.user_id)
            .description(format!("Created project {}", project.name)),
    );
    state.event_bus.publish(DomainEvent::now(
        "project.created",
        project.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(project))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/projects",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 404, description = "Project not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_project(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<Project>> {
    require_permission(&state, &actor, Permission::ProjectsManage).await?;

    let project = sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            is_active = COALESCE($4, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.description)
    .bind(payload.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?
    .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Update, EntityType::Project)
            .entity(project.id.to_string())
            .actor(actor.user_id)
            .description(format!("Updated project {}", project.name)),
    );
    state.event_bus.publish(DomainEvent::now(
        "project.updated",
        project.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/projects",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project deleted"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Project still has content")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_project(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    require_permission(&state, &actor, Permission::ProjectsManage).await?;

    let content = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT (SELECT COUNT(*) FROM content_ideas WHERE project_id = $1)
             + (SELECT COUNT(*) FROM scheduled_posts WHERE project_id = $1)
        "#,
    )
    .bind(id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    if content > 0 {
        return Err(AppError::Conflict(format!(
            "Project still has {} idea(s)/post(s)",
            content
        )));
    }

    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Project not found".to_string()));
    }

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Delete, EntityType::Project)
            .entity(id.to_string())
            .actor(actor.user_id)
            .description(format!("Deleted project {}", id)),
    );
    state.event_bus.publish(DomainEvent::now(
        "project.deleted",
        id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_projects,
        get_project,
        create_project,
        update_project,
        delete_project
    ),
    components(schemas(Project, CreateProjectRequest, UpdateProjectRequest))
)]
pub struct ProjectsApiDoc;
