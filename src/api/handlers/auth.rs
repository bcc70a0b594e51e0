//! Authentication handlers: login, logout, current session.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::middleware::auth::{bearer_token, session_cookie_value, CurrentUser};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::user::User;
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::auth_service::{AuthService, SESSION_COOKIE};
use crate::services::permission_service::PermissionService;

/// Routes reachable without a session.
pub fn public_router() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Routes that require a session.
pub fn protected_router() -> Router<SharedState> {
    Router::new()
        .route("/me", get(me))
        .route("/permissions", get(my_permissions))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Minimal user summary carried in login and session responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.display_name.clone(),
            role: user.role_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: SessionUser,
}

/// Permissions of the calling session's role.
///
/// Advisory only: the UI uses this to decide which menus to draw. Every
/// request is still checked server-side regardless of what this returns.
#[derive(Debug, Serialize, ToSchema)]
pub struct MyPermissionsResponse {
    pub role: String,
    pub permissions: Vec<String>,
}

/// Reject missing or blank login fields with one itemized message each.
pub fn validate_login(payload: &LoginRequest) -> Result<(&str, &str)> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("email is required".to_string()))?;
    let password = payload
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("password is required".to_string()))?;
    Ok((email, password))
}

/// Build the `Set-Cookie` value for a fresh session.
///
/// HTTP-only and SameSite=Lax always; Secure everywhere except development
/// so local HTTP setups keep working.
pub fn session_cookie_header(config: &crate::config::Config, token: &str) -> String {
    let max_age = config.session_ttl_days * 24 * 60 * 60;
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if config.environment != "development" {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build the `Set-Cookie` value that clears the session cookie.
pub fn clear_session_cookie(config: &crate::config::Config) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.environment != "development" {
        cookie.push_str("; Secure");
    }
    cookie
}

fn set_cookie(response: &mut Response, cookie: &str) -> Result<()> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::Internal(format!("Invalid cookie header: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(())
}

#[utoipa::path(
    post,
    path = "/login",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = LoginResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    let (email, password) = validate_login(&payload)?;

    let auth_service = AuthService::new(state.db.clone(), Arc::new(state.config.clone()));
    let (user, token) = auth_service.authenticate(email, password).await?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Login, EntityType::User)
            .entity(user.id.to_string())
            .actor(user.id)
            .description(format!("{} logged in", user.email)),
    );

    let mut response = (
        StatusCode::OK,
        Json(LoginResponse {
            user: SessionUser::from(&user),
        }),
    )
        .into_response();
    set_cookie(&mut response, &session_cookie_header(&state.config, &token))?;
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/logout",
    context_path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Session cookie cleared")
    )
)]
pub async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Result<Response> {
    // Best-effort audit: a logout with a dead or absent session still
    // succeeds, it just is not attributable.
    if let Some(token) = session_cookie_value(&headers).or_else(|| bearer_token(&headers)) {
        let auth_service = AuthService::new(state.db.clone(), Arc::new(state.config.clone()));
        if let Ok(claims) = auth_service.verify_session(&token) {
            ActivityService::new(state.db.clone()).record_detached(
                ActivityEntry::new(ActivityType::Logout, EntityType::User)
                    .entity(claims.sub.to_string())
                    .actor(claims.sub)
                    .description(format!("{} logged out", claims.email)),
            );
        }
    }

    let mut response = Json(serde_json::json!({ "success": true })).into_response();
    set_cookie(&mut response, &clear_session_cookie(&state.config))?;
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/me",
    context_path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = SessionUser),
        (status = 401, description = "Not authenticated")
    ),
    security(("session_cookie" = []))
)]
pub async fn me(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<SessionUser>> {
    // Re-read the row so deactivation takes effect before the cookie expires.
    let row = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND is_active = true",
    )
    .bind(user.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?
    .ok_or_else(|| AppError::Authentication("Invalid or expired session".to_string()))?;

    Ok(Json(SessionUser::from(&row)))
}

#[utoipa::path(
    get,
    path = "/permissions",
    context_path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Permissions of the current role", body = MyPermissionsResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("session_cookie" = []))
)]
pub async fn my_permissions(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<MyPermissionsResponse>> {
    let permissions = PermissionService::new(state.db.clone())
        .role_permissions(&user.role_id)
        .await?;
    Ok(Json(MyPermissionsResponse {
        role: user.role_id,
        permissions,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(login, logout, me, my_permissions),
    components(schemas(LoginRequest, LoginResponse, SessionUser, MyPermissionsResponse))
)]
pub struct AuthApiDoc;
