//! Automation webhook proxy handlers.
//!
//! The dashboard never talks to social platforms directly; it hands payloads
//! to automation flows over configured webhook URLs. These endpoints
//! validate just enough to avoid feeding the flows garbage, then forward the
//! JSON body as-is and mirror the upstream reply back to the client.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use utoipa::OpenApi;

use crate::api::middleware::auth::{require_permission, CurrentUser};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::permission::Permission;
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::webhook_service::{parse_posting_time, AutomationHook, WebhookReply};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/schedule-post", post(proxy_schedule_post))
        .route("/edit-media", post(proxy_edit_media))
        .route("/update-post", post(proxy_update_post))
        .route("/remove-post", post(proxy_remove_post))
        .route("/engagement-tracker", post(proxy_engagement_tracker))
}

/// Non-empty string field lookup on a JSON payload.
fn require_field<'a>(payload: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

/// `posting_time` must be present and well-formed before anything reaches
/// the scheduling flow.
fn validate_posting_time(payload: &serde_json::Value) -> Result<()> {
    let value = require_field(payload, "posting_time")?;
    parse_posting_time(value)?;
    Ok(())
}

/// `posting_time` may be omitted on edits, but a present value still has to
/// parse.
fn validate_posting_time_if_present(payload: &serde_json::Value) -> Result<()> {
    if let Some(value) = payload.get("posting_time").and_then(|v| v.as_str()) {
        if !value.trim().is_empty() {
            parse_posting_time(value)?;
        }
    }
    Ok(())
}

/// Replays the upstream reply to the dashboard client, status and body
/// included, so flow errors stay visible instead of collapsing to a 500.
fn mirror_reply(reply: WebhookReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &reply.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    match builder.body(Body::from(reply.body)) {
        Ok(response) => response,
        Err(_) => status.into_response(),
    }
}

fn entity_from(payload: &serde_json::Value) -> Option<String> {
    ["post_id", "id"]
        .iter()
        .find_map(|k| payload.get(*k).and_then(|v| v.as_str()))
        .map(str::to_string)
}

fn record_forward(
    state: &SharedState,
    actor: &CurrentUser,
    activity: ActivityType,
    hook: AutomationHook,
    payload: &serde_json::Value,
) {
    let mut entry = ActivityEntry::new(activity, EntityType::Post)
        .actor(actor.user_id)
        .description(format!("{} forwarded {} payload", actor.email, hook.as_str()));
    if let Some(entity) = entity_from(payload) {
        entry = entry.entity(entity);
    }
    ActivityService::new(state.db.clone()).record_detached(entry);
}

#[utoipa::path(
    post,
    path = "/schedule-post",
    context_path = "/api/v1/automation",
    tag = "automation",
    responses(
        (status = 200, description = "Upstream flow reply, mirrored"),
        (status = 400, description = "Missing or malformed posting_time"),
        (status = 500, description = "schedule-post webhook not configured")
    ),
    security(("session_cookie" = []))
)]
pub async fn proxy_schedule_post(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response> {
    require_permission(&state, &actor, Permission::PostsSchedule).await?;
    validate_posting_time(&payload)?;

    let reply = state
        .webhooks
        .forward(AutomationHook::SchedulePost, &payload)
        .await?;
    record_forward(
        &state,
        &actor,
        ActivityType::Schedule,
        AutomationHook::SchedulePost,
        &payload,
    );
    Ok(mirror_reply(reply))
}

#[utoipa::path(
    post,
    path = "/edit-media",
    context_path = "/api/v1/automation",
    tag = "automation",
    responses(
        (status = 200, description = "Upstream flow reply, mirrored"),
        (status = 400, description = "Missing media_url"),
        (status = 500, description = "edit-media webhook not configured")
    ),
    security(("session_cookie" = []))
)]
pub async fn proxy_edit_media(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response> {
    require_permission(&state, &actor, Permission::PostsManage).await?;
    require_field(&payload, "media_url")?;

    let reply = state
        .webhooks
        .forward(AutomationHook::EditMedia, &payload)
        .await?;
    record_forward(
        &state,
        &actor,
        ActivityType::Update,
        AutomationHook::EditMedia,
        &payload,
    );
    Ok(mirror_reply(reply))
}

#[utoipa::path(
    post,
    path = "/update-post",
    context_path = "/api/v1/automation",
    tag = "automation",
    responses(
        (status = 200, description = "Upstream flow reply, mirrored"),
        (status = 400, description = "Missing post_id or malformed posting_time"),
        (status = 500, description = "update-post webhook not configured")
    ),
    security(("session_cookie" = []))
)]
pub async fn proxy_update_post(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response> {
    require_permission(&state, &actor, Permission::PostsManage).await?;
    require_field(&payload, "post_id")?;
    validate_posting_time_if_present(&payload)?;

    let reply = state
        .webhooks
        .forward(AutomationHook::UpdatePost, &payload)
        .await?;
    record_forward(
        &state,
        &actor,
        ActivityType::Update,
        AutomationHook::UpdatePost,
        &payload,
    );
    Ok(mirror_reply(reply))
}

#[utoipa::path(
    post,
    path = "/remove-post",
    context_path = "/api/v1/automation",
    tag = "automation",
    responses(
        (status = 200, description = "Upstream flow reply, mirrored"),
        (status = 400, description = "Missing post_id"),
        (status = 500, description = "remove-post webhook not configured")
    ),
    security(("session_cookie" = []))
)]
pub async fn proxy_remove_post(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response> {
    require_permission(&state, &actor, Permission::PostsManage).await?;
    require_field(&payload, "post_id")?;

    let reply = state
        .webhooks
        .forward(AutomationHook::RemovePost, &payload)
        .await?;
    record_forward(
        &state,
        &actor,
        ActivityType::Delete,
        AutomationHook::RemovePost,
        &payload,
    );
    Ok(mirror_reply(reply))
}

#[utoipa::path(
    post,
    path = "/engagement-tracker",
    context_path = "/api/v1/automation",
    tag = "automation",
    responses(
        (status = 200, description = "Always succeeds; tracking is best effort")
    ),
    security(("session_cookie" = []))
)]
pub async fn proxy_engagement_tracker(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    require_permission(&state, &actor, Permission::PostsView).await?;

    // Engagement numbers are nice to have; a down flow must not break the
    // dashboard, so this swallows upstream failures.
    state
        .webhooks
        .forward_best_effort(AutomationHook::EngagementTracker, &payload)
        .await;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(OpenApi)]
#[openapi(paths(
    proxy_schedule_post,
    proxy_edit_media,
    proxy_update_post,
    proxy_remove_post,
    proxy_engagement_tracker
))]
pub struct AutomationApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // Field validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_require_field_present() {
        let payload = json!({"post_id": "abc-123"});
        assert_eq!(require_field(&payload, "post_id").expect("ok"), "abc-123");
    }

    #[test]
    fn test_require_field_missing_empty_or_wrong_type() {
        for payload in [
            json!({}),
            json!({"post_id": ""}),
            json!({"post_id": "   "}),
            json!({"post_id": 42}),
            json!({"post_id": null}),
        ] {
            let err = require_field(&payload, "post_id").expect_err("reject");
            assert!(err.to_string().contains("post_id is required"));
        }
    }

    // -----------------------------------------------------------------------
    // posting_time validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_posting_time_valid() {
        let payload = json!({"posting_time": "25/12/2025 18:30"});
        assert!(validate_posting_time(&payload).is_ok());
    }

    #[test]
    fn test_posting_time_wrong_separator_rejected() {
        let payload = json!({"posting_time": "31-12-2025 10:00"});
        let err = validate_posting_time(&payload).expect_err("reject");
        assert!(err.to_string().contains("dd/mm/yyyy HH:mm"));
    }

    #[test]
    fn test_posting_time_missing_rejected() {
        let err = validate_posting_time(&json!({})).expect_err("reject");
        assert!(err.to_string().contains("posting_time is required"));
    }

    #[test]
    fn test_optional_posting_time_absent_ok() {
        assert!(validate_posting_time_if_present(&json!({})).is_ok());
        assert!(validate_posting_time_if_present(&json!({"posting_time": ""})).is_ok());
    }

    #[test]
    fn test_optional_posting_time_present_must_parse() {
        let payload = json!({"posting_time": "not a date"});
        assert!(validate_posting_time_if_present(&payload).is_err());
    }

    // -----------------------------------------------------------------------
    // Upstream mirroring
    // -----------------------------------------------------------------------

    #[test]
    fn test_mirror_reply_keeps_status_and_content_type() {
        let reply = WebhookReply {
            status: 422,
            content_type: Some("application/json".to_string()),
            body: r#"{"error": "flow rejected"}"#.to_string(),
        };
        let response = mirror_reply(reply);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn test_mirror_reply_invalid_status_becomes_bad_gateway() {
        let reply = WebhookReply {
            status: 7,
            content_type: None,
            body: String::new(),
        };
        assert_eq!(mirror_reply(reply).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_entity_from_prefers_post_id() {
        let payload = json!({"post_id": "p1", "id": "x9"});
        assert_eq!(entity_from(&payload).as_deref(), Some("p1"));
        assert_eq!(
            entity_from(&json!({"id": "x9"})).as_deref(),
            Some("x9")
        );
        assert!(entity_from(&json!({})).is_none());
    }
}
