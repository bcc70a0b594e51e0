//! Permission catalog handler.
//!
//! The catalog is closed: it is the `Permission` enum, not a table. This
//! endpoint exists so role-editing UIs can render checkboxes without
//! hardcoding slugs.

use axum::{routing::get, Json, Router};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::SharedState;
use crate::models::permission::Permission;

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(list_permissions))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionInfo {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionGroup {
    pub group: String,
    pub permissions: Vec<PermissionInfo>,
}

/// Catalog entries in declaration order, grouped by dashboard module.
pub fn catalog() -> Vec<PermissionGroup> {
    let mut groups: Vec<PermissionGroup> = Vec::new();
    for permission in Permission::ALL {
        let info = PermissionInfo {
            id: permission.slug().to_string(),
            label: permission.label().to_string(),
        };
        match groups.iter_mut().find(|g| g.group == permission.group()) {
            Some(group) => group.permissions.push(info),
            None => groups.push(PermissionGroup {
                group: permission.group().to_string(),
                permissions: vec![info],
            }),
        }
    }
    groups
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/permissions",
    tag = "permissions",
    responses(
        (status = 200, description = "Full permission catalog grouped by module", body = [PermissionGroup]),
        (status = 401, description = "Not signed in")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_permissions() -> Json<Vec<PermissionGroup>> {
    Json(catalog())
}

#[derive(OpenApi)]
#[openapi(
    paths(list_permissions),
    components(schemas(PermissionInfo, PermissionGroup))
)]
pub struct PermissionsApiDoc;
