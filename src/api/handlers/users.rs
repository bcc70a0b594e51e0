//! User management handlers.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{Pagination, PaginationQuery};
use crate::api::middleware::auth::{require_permission, CurrentUser};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::permission::Permission;
use crate::models::user::User;
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::auth_service::AuthService;
use crate::services::event_bus::DomainEvent;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:id",
            get(get_user).patch(update_user).delete(deactivate_user),
        )
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub fn user_to_response(user: User) -> UserResponse {
    UserResponse {
        id: user.id,
        email: user.email,
        display_name: user.display_name,
        role: user.role_id,
        is_active: user.is_active,
        last_login_at: user.last_login_at,
        created_at: user.created_at,
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    /// Substring match on email or display name
    pub search: Option<String>,
    /// Include deactivated users (default: false)
    pub include_inactive: Option<bool>,
    /// Requested page number (default: 1)
    pub page: Option<u32>,
    /// Requested items per page (default: 20, max: 100)
    pub per_page: Option<u32>,
}

impl ListUsersQuery {
    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub role_id: String,
    /// Optional; generated and returned once when omitted
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    /// Present only when the password was generated server-side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role_id: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

/// Random 16-character password for users created without one.
pub fn generate_password() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = rand::rng();
    (0..16)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

async fn role_exists(state: &SharedState, role_id: &str) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_one(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(count > 0)
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "List of users", body = UserListResponse),
        (status = 403, description = "Missing users.view permission")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_users(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>> {
    require_permission(&state, &actor, Permission::UsersView).await?;

    let search = query.search.as_deref().map(|s| format!("%{}%", s));
    let include_inactive = query.include_inactive.unwrap_or(false);

    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE ($1::text IS NULL OR email ILIKE $1 OR display_name ILIKE $1)
          AND ($2 OR is_active = true)
        ORDER BY created_at DESC
        OFFSET $3 LIMIT $4
        "#,
    )
    .bind(&search)
    .bind(include_inactive)
    .bind(query.pagination().offset())
    .bind(query.pagination().limit())
    .fetch_all(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM users
        WHERE ($1::text IS NULL OR email ILIKE $1 OR display_name ILIKE $1)
          AND ($2 OR is_active = true)
        "#,
    )
    .bind(&search)
    .bind(include_inactive)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(user_to_response).collect(),
        pagination: Pagination::from_query_and_total(&query.pagination(), total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>> {
    require_permission(&state, &actor, Permission::UsersView).await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user_to_response(user)))
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = CreateUserResponse),
        (status = 400, description = "Invalid email, role, or password"),
        (status = 409, description = "Email already in use")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_user(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>> {
    require_permission(&state, &actor, Permission::UsersManage).await?;

    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if payload.display_name.trim().is_empty() {
        return Err(AppError::Validation("display_name is required".to_string()));
    }
    if !role_exists(&state, &payload.role_id).await? {
        return Err(AppError::Validation(format!(
            "Unknown role '{}'",
            payload.role_id
        )));
    }

    let (password, generated_password) = match payload.password {
        Some(p) => {
            if p.len() < 8 {
                return Err(AppError::Validation(
                    "Password must be at least 8 characters".to_string(),
                ));
            }
            (p, None)
        }
        None => {
            let p = generate_password();
            (p.clone(), Some(p))
        }
    };
    let password_hash = AuthService::hash_password(&password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, display_name, role_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(payload.display_name.trim())
    .bind(&payload.role_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("duplicate key") {
            AppError::Conflict("Email already in use".to_string())
        } else {
            AppError::Database(e.to_string())
        }
    })?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Create, EntityType::User)
            .entity(user.id.to_string())
            .actor(actor.user_id)
            .description(format!("Created user {}", user.email)),
    );
    state.event_bus.publish(DomainEvent::now(
        "user.created",
        user.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(CreateUserResponse {
        user: user_to_response(user),
        generated_password,
    }))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already in use")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_user(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    require_permission(&state, &actor, Permission::UsersManage).await?;

    if let Some(role_id) = &payload.role_id {
        if !role_exists(&state, role_id).await? {
            return Err(AppError::Validation(format!("Unknown role '{}'", role_id)));
        }
    }
    let password_hash = match &payload.password {
        Some(p) if p.len() < 8 => {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ))
        }
        Some(p) => Some(AuthService::hash_password(p)?),
        None => None,
    };
    let email = payload.email.as_deref().map(|e| e.trim().to_lowercase());
    if let Some(e) = &email {
        if !e.contains('@') {
            return Err(AppError::Validation("A valid email is required".to_string()));
        }
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            email = COALESCE($2, email),
            display_name = COALESCE($3, display_name),
            role_id = COALESCE($4, role_id),
            password_hash = COALESCE($5, password_hash),
            is_active = COALESCE($6, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&email)
    .bind(payload.display_name.as_deref().map(str::trim))
    .bind(&payload.role_id)
    .bind(&password_hash)
    .bind(payload.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("duplicate key") {
            AppError::Conflict("Email already in use".to_string())
        } else {
            AppError::Database(e.to_string())
        }
    })?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Update, EntityType::User)
            .entity(user.id.to_string())
            .actor(actor.user_id)
            .description(format!("Updated user {}", user.email)),
    );
    state.event_bus.publish(DomainEvent::now(
        "user.updated",
        user.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(user_to_response(user)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated"),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 404, description = "User not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn deactivate_user(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    require_permission(&state, &actor, Permission::UsersManage).await?;

    if id == actor.user_id {
        return Err(AppError::Validation(
            "Cannot deactivate yourself".to_string(),
        ));
    }

    // Soft delete: the row stays for audit attribution, logins stop.
    let result = sqlx::query("UPDATE users SET is_active = false, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Delete, EntityType::User)
            .entity(id.to_string())
            .actor(actor.user_id)
            .description(format!("Deactivated user {}", id)),
    );
    state.event_bus.publish(DomainEvent::now(
        "user.deactivated",
        id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_users, get_user, create_user, update_user, deactivate_user),
    components(schemas(
        UserResponse,
        UserListResponse,
        CreateUserRequest,
        CreateUserResponse,
        UpdateUserRequest
    ))
)]
pub struct UsersApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // -----------------------------------------------------------------------
    // generate_password
    // -----------------------------------------------------------------------

    #[test]
    fn test_generate_password_length_and_charset() {
        let password = generate_password();
        assert_eq!(password.len(), 16);
        assert!(password.chars().all(|c| c.is_ascii_graphic()));
    }

    #[test]
    fn test_generate_password_is_random() {
        assert_ne!(generate_password(), generate_password());
    }

    // -----------------------------------------------------------------------
    // Response mapping
    // -----------------------------------------------------------------------

    #[test]
    fn test_user_to_response_drops_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            display_name: "Ops".to_string(),
            role_id: "editor".to_string(),
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let response = user_to_response(user);
        let json = serde_json::to_string(&response).expect("json");
        assert!(!json.contains("password"));
        assert!(json.contains("\"role\":\"editor\""));
    }

    #[test]
    fn test_create_response_flattens_user() {
        let user = UserResponse {
            id: Uuid::new_v4(),
            email: "new@example.com".to_string(),
            display_name: "New".to_string(),
            role: "editor".to_string(),
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
        };
        let with_password = CreateUserResponse {
            user,
            generated_password: Some("abc".to_string()),
        };
        let json = serde_json::to_value(&with_password).expect("json");
        assert_eq!(json["email"], "new@example.com");
        assert_eq!(json["generated_password"], "abc");
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListUsersQuery = serde_json::from_str("{}").expect("parse");
        assert!(query.search.is_none());
        assert!(query.include_inactive.is_none());
        assert_eq!(query.pagination().page(), 1);
        assert_eq!(query.pagination().per_page(), 20);
    }
}
