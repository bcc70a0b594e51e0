//! Activity log handlers.
//!
//! The log is append-only: this module exposes reads and the page-visit
//! recorder, nothing that updates or deletes entries.

use axum::{
    extract::{Query, State},
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
use crate::models::activity::{ActivityLog, ActivityType, EntityType};
use crate::models::permission::Permission;
use crate::services::activity_service::{ActivityEntry, ActivityFilter, ActivityService};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_activity))
        .route("/visit", post(record_visit))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListActivityQuery {
    pub activity_type: Option<ActivityType>,
    pub entity_type: Option<EntityType>,
    pub actor_id: Option<Uuid>,
    /// Requested page number (default: 1)
    pub page: Option<u32>,
    /// Requested items per page (default: 20, max: 100)
    pub per_page: Option<u32>,
}

impl ListActivityQuery {
    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }

    fn filter(&self) -> ActivityFilter {
        ActivityFilter {
            activity_type: self.activity_type,
            entity_type: self.entity_type,
            actor_id: self.actor_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityLog>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VisitRequest {
    /// Dashboard page identifier, e.g. `posts` or `settings/roles`
    pub page: Option<String>,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/activity",
    tag = "activity",
    params(ListActivityQuery),
    responses(
        (status = 200, description = "Activity entries, newest first", body = ActivityListResponse),
        (status = 403, description = "Missing activity.view permission")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_activity(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<ListActivityQuery>,
) -> Result<Json<ActivityListResponse>> {
    require_permission(&state, &actor, Permission::ActivityView).await?;

    let pagination = query.pagination();
    let (activities, total) = ActivityService::new(state.db.clone())
        .query(&query.filter(), pagination.offset(), pagination.limit())
        .await?;

    Ok(Json(ActivityListResponse {
        activities,
        pagination: Pagination::from_query_and_total(&pagination, total),
    }))
}

#[utoipa::path(
    post,
    path = "/visit",
    context_path = "/api/v1/activity",
    tag = "activity",
    request_body = VisitRequest,
    responses(
        (status = 200, description = "Visit recorded"),
        (status = 400, description = "Missing page"),
        (status = 401, description = "Not signed in")
    ),
    security(("session_cookie" = []))
)]
pub async fn record_visit(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<VisitRequest>,
) -> Result<Json<serde_json::Value>> {
    let page = match payload.page.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return Err(AppError::Validation("page is required".to_string())),
    };

    // Awaited on purpose: a visit entry is the whole point of this call, so
    // a write failure should surface instead of vanishing in a task.
    ActivityService::new(state.db.clone())
        .record(
            ActivityEntry::new(ActivityType::VisitPage, EntityType::Page)
                .entity(page.clone())
                .actor(actor.user_id)
                .description(format!("{} visited {}", actor.email, page)),
        )
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_activity, record_visit),
    components(schemas(
        ActivityLog,
        ActivityType,
        EntityType,
        ActivityListResponse,
        VisitRequest
    ))
)]
pub struct ActivityApiDoc;
