//! Role management handlers.
//!
//! A role is a named bundle of permission grants. The `admin` role is
//! system-owned: it bypasses grant lookups entirely, so its grant list is
//! not editable and the role cannot be deleted.

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::auth::{require_permission, CurrentUser};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::permission::Permission;
use crate::models::role::{valid_role_id, Role, ADMIN_ROLE};
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::event_bus::DomainEvent;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route(
            "/:id",
            get(get_role).patch(update_role).delete(delete_role),
        )
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub permissions: Vec<String>,
    pub user_count: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

/// Rejects grant lists containing slugs outside the permission catalog.
fn validate_permission_slugs(slugs: &[String]) -> Result<()> {
    for slug in slugs {
        if Permission::from_slug(slug).is_none() {
            return Err(AppError::Validation(format!(
                "Unknown permission '{}'",
                slug
            )));
        }
    }
    Ok(())
}

async fn role_grants(state: &SharedState, role_id: &str) -> Result<Vec<String>> {
    if role_id == ADMIN_ROLE {
        return Ok(Permission::ALL.iter().map(|p| p.slug().to_string()).collect());
    }
    sqlx::query_scalar::<_, String>(
        "SELECT permission FROM role_permissions WHERE role_id = $1 ORDER BY permission",
    )
    .bind(role_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))
}

async fn assigned_user_count(state: &SharedState, role_id: &str) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
        .bind(role_id)
        .fetch_one(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

async fn replace_grants(state: &SharedState, role_id: &str, slugs: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    for slug in slugs {
        sqlx::query("INSERT INTO role_permissions (role_id, permission) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(role_id)
            .bind(slug)
            .execute(&state.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
    }
    Ok(())
}

async fn role_to_response(state: &SharedState, role: Role) -> Result<RoleResponse> {
    let permissions = role_grants(state, &role.id).await?;
    let user_count = assigned_user_count(state, &role.id).await?;
    Ok(RoleResponse {
        id: role.id,
        name: role.name,
        description: role.description,
        is_system: role.is_system,
        permissions,
        user_count,
    })
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/roles",
    tag = "roles",
    responses(
        (status = 200, description = "All roles with their grants", body = [RoleResponse]),
        (status = 403, description = "Missing roles.view permission")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_roles(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
) -> Result<Json<Vec<RoleResponse>>> {
    require_permission(&state, &actor, Permission::RolesView).await?;

    let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY created_at")
        .fetch_all(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let mut responses = Vec::with_capacity(roles.len());
    for role in roles {
        responses.push(role_to_response(&state, role).await?);
    }
    Ok(Json(responses))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/roles",
    tag = "roles",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role details", body = RoleResponse),
        (status = 404, description = "Role not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_role(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<RoleResponse>> {
    require_permission(&state, &actor, Permission::RolesView).await?;

    let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
        .bind(&id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;

    Ok(Json(role_to_response(&state, role).await?))
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/roles",
    tag = "roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 200, description = "Role created", body = RoleResponse),
        (status = 400, description = "Invalid role id or unknown permission"),
        (status = 409, description = "Role id already taken")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_role(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<Json<RoleResponse>> {
    require_permission(&state, &actor, Permission::RolesManage).await?;

    if !valid_role_id(&payload.id) {
        return Err(AppError::Validation(
            "Role id must be 2-40 chars, lowercase, starting with a letter".to_string(),
        ));
    }
    if payload.id == ADMIN_ROLE {
        return Err(AppError::Conflict("Role id already taken".to_string()));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    validate_permission_slugs(&payload.permissions)?;

    let role = sqlx::query_as::<_, Role>(
        r#"
        INSERT INTO roles (id, name, description, is_system)
        VALUES ($1, $2, $3, false)
        RETURNING *
        "#,
    )
    .bind(&payload.id)
    .bind(payload.name.trim())
    .bind(&payload.description)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("duplicate key") {
            AppError::Conflict("Role id already taken".to_string())
        } else {
            AppError::Database(e.to_string())
        }
    })?;

    replace_grants(&state, &role.id, &payload.permissions).await?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Create, EntityType::Role)
            .entity(role.id.clone())
            .actor(actor.user_id)
            .description(format!("Created role {}", role.id)),
    );
    state.event_bus.publish(DomainEvent::now(
        "role.created",
        role.id.clone(),
        Some(actor.email.clone()),
    ));

    Ok(Json(role_to_response(&state, role).await?))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/roles",
    tag = "roles",
    params(("id" = String, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 400, description = "System role or unknown permission"),
        (status = 404, description = "Role not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_role(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponse>> {
    require_permission(&state, &actor, Permission::RolesManage).await?;

    if id == ADMIN_ROLE {
        return Err(AppError::Validation(
            "The admin role cannot be modified".to_string(),
        ));
    }
    if let Some(permissions) = &payload.permissions {
        validate_permission_slugs(permissions)?;
    }

    let role = sqlx::query_as::<_, Role>(
        r#"
        UPDATE roles SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            updated_at = NOW()
        WHERE id = $1 AND is_system = false
        RETURNING *
        "#,
    )
    .bind(&id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.description)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?
    .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;

    if let Some(permissions) = &payload.permissions {
        replace_grants(&state, &role.id, permissions).await?;
    }

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Update, EntityType::Role)
            .entity(role.id.clone())
            .actor(actor.user_id)
            .description(format!("Updated role {}", role.id)),
    );
    state.event_bus.publish(DomainEvent::now(
        "role.updated",
        role.id.clone(),
        Some(actor.email.clone()),
    ));

    Ok(Json(role_to_response(&state, role).await?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/roles",
    tag = "roles",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 400, description = "System role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role still assigned to users")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_role(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    require_permission(&state, &actor, Permission::RolesDelete).await?;

    if id == ADMIN_ROLE {
        return Err(AppError::Validation(
            "The admin role cannot be deleted".to_string(),
        ));
    }

    let assigned = assigned_user_count(&state, &id).await?;
    if assigned > 0 {
        return Err(AppError::Conflict(format!(
            "Role is assigned to {} user(s)",
            assigned
        )));
    }

    // role_permissions rows go with the role via ON DELETE CASCADE.
    let result = sqlx::query("DELETE FROM roles WHERE id = $1 AND is_system = false")
        .bind(&id)
        .execute(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Role not found".to_string()));
    }

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Delete, EntityType::Role)
            .entity(id.clone())
            .actor(actor.user_id)
            .description(format!("Deleted role {}", id)),
    );
    state.event_bus.publish(DomainEvent::now(
        "role.deleted",
        id,
        Some(actor.email.clone()),
    ));

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_roles, get_role, create_role, update_role, delete_role),
    components(schemas(RoleResponse, CreateRoleRequest, UpdateRoleRequest))
)]
pub struct RolesApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Grant list validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_known_slugs_accepted() {
        let slugs = vec!["posts.view".to_string(), "ideas.manage".to_string()];
        assert!(validate_permission_slugs(&slugs).is_ok());
    }

    #[test]
    fn test_unknown_slug_rejected() {
        let slugs = vec!["posts.view".to_string(), "posts.obliterate".to_string()];
        let err = validate_permission_slugs(&slugs).expect_err("should reject");
        assert!(err.to_string().contains("posts.obliterate"));
    }

    #[test]
    fn test_empty_grant_list_accepted() {
        assert!(validate_permission_slugs(&[]).is_ok());
    }

    // -----------------------------------------------------------------------
    // Request shapes
    // -----------------------------------------------------------------------

    #[test]
    fn test_create_request_defaults_permissions() {
        let request: CreateRoleRequest =
            serde_json::from_str(r#"{"id": "viewer", "name": "Viewer"}"#).expect("parse");
        assert!(request.permissions.is_empty());
    }

    #[test]
    fn test_update_request_distinguishes_absent_from_empty() {
        let absent: UpdateRoleRequest = serde_json::from_str(r#"{"name": "X"}"#).expect("parse");
        assert!(absent.permissions.is_none());

        let empty: UpdateRoleRequest =
            serde_json::from_str(r#"{"permissions": []}"#).expect("parse");
        assert_eq!(empty.permissions.as_deref(), Some(&[][..]));
    }
}
