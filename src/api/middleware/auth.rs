//! Session authentication middleware and permission gate.
//!
//! Sessions arrive as the `cd_session` HTTP-only cookie set at login, or as
//! `Authorization: Bearer <token>` for non-browser clients. The middleware
//! verifies the credential and stores a [`CurrentUser`] extension; handlers
//! then call [`require_permission`] before doing anything else, so denied
//! requests are refused before any state changes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::permission::Permission;
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::auth_service::{AuthService, Claims, SESSION_COOKIE};
use crate::services::permission_service::PermissionService;

/// Identity of the authenticated user, inserted by [`session_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: String,
    pub role_id: String,
    pub display_name: String,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role_id: claims.role,
            display_name: claims.name,
        }
    }
}

/// Session token from the `cd_session` cookie, if present.
pub fn session_cookie_value(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').map(str::trim).find_map(|pair| {
        pair.strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

/// Session token from a Bearer authorization header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Require a valid session credential.
///
/// Missing and invalid credentials both produce the uniform 401 body; the
/// cookie is preferred over the bearer header when both are present.
pub async fn session_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token =
        session_cookie_value(request.headers()).or_else(|| bearer_token(request.headers()));

    let Some(token) = token else {
        return AppError::Authentication("Missing session credential".to_string())
            .into_response();
    };

    match auth_service.verify_session(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(CurrentUser::from(claims));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Allow the operation or fail with the uniform 403.
///
/// Called as the first statement of every permission-gated handler. On
/// denial, one `unauthorized_access` entry is written on a detached task
/// naming the actor and the module they were refused; the denial response
/// never waits on that write.
pub async fn require_permission(
    state: &SharedState,
    actor: &CurrentUser,
    permission: Permission,
) -> Result<()> {
    let permissions = PermissionService::new(state.db.clone());
    if permissions.has_permission(&actor.role_id, permission).await {
        return Ok(());
    }

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::UnauthorizedAccess, EntityType::Page)
            .entity(permission.group())
            .actor(actor.user_id)
            .description(format!(
                "{} attempted to access {} without permission",
                actor.email,
                permission.group()
            )),
    );

    Err(AppError::Authorization(format!(
        "Missing permission: {}",
        permission.slug()
    )))
}
