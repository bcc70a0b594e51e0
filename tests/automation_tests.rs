//! Automation flow tests: posting-time validation, hook configuration, and
//! the permission gates in front of every proxy endpoint.
//!
//! Router-level tests run with no hooks configured and no reachable
//! database, which is enough to cover the whole pre-forward pipeline: the
//! session check, the permission gate, payload validation, and the
//! configuration error when a flow URL is absent.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use contentdesk_backend::error::AppError;
use contentdesk_backend::services::webhook_service::{
    format_posting_time, parse_posting_time, AutomationHook, WebhookService,
};

// ---------------------------------------------------------------------------
// Posting time format
// ---------------------------------------------------------------------------

#[test]
fn test_posting_time_accepts_day_first_format() {
    for input in ["31/12/2025 10:00", "01/01/2026 00:00", "29/02/2024 23:59"] {
        let parsed = parse_posting_time(input).expect("valid posting time");
        assert_eq!(format_posting_time(&parsed), input);
    }
}

#[test]
fn test_posting_time_tolerates_surrounding_whitespace() {
    assert!(parse_posting_time("  31/12/2025 10:00  ").is_ok());
}

#[test]
fn test_posting_time_rejects_everything_else() {
    let rejected = [
        "31-12-2025 10:00",
        "2025-12-31 10:00",
        "2025-12-31T10:00:00Z",
        "12/31/2025 10:00",
        "31/12/2025",
        "31/12/2025 10:00:00",
        "32/01/2025 10:00",
        "01/13/2025 10:00",
        "29/02/2025 10:00",
        "31/12/25 10:00",
        "tomorrow at noon",
        "",
    ];
    for input in rejected {
        let err = parse_posting_time(input).expect_err(input);
        match err {
            AppError::Validation(msg) => {
                assert!(msg.contains("posting_time"), "message for '{input}': {msg}")
            }
            other => panic!("expected validation error for '{input}', got {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Hook configuration
// ---------------------------------------------------------------------------

#[test]
fn test_hook_slugs_match_flow_endpoints() {
    assert_eq!(AutomationHook::SchedulePost.as_str(), "schedule-post");
    assert_eq!(AutomationHook::EditMedia.as_str(), "edit-media");
    assert_eq!(AutomationHook::UpdatePost.as_str(), "update-post");
    assert_eq!(AutomationHook::RemovePost.as_str(), "remove-post");
    assert_eq!(AutomationHook::EngagementTracker.as_str(), "engagement-tracker");
}

#[test]
fn test_unset_and_blank_urls_count_as_unconfigured() {
    let service = WebhookService::new(common::test_config());
    for hook in [
        AutomationHook::SchedulePost,
        AutomationHook::EditMedia,
        AutomationHook::UpdatePost,
        AutomationHook::RemovePost,
        AutomationHook::EngagementTracker,
    ] {
        assert_eq!(service.url_for(hook), None);
    }

    let mut config = common::test_config();
    config.webhook_schedule_post_url = Some(String::new());
    config.webhook_edit_media_url = Some("https://flows.internal/edit-media".to_string());
    let service = WebhookService::new(config);
    assert_eq!(service.url_for(AutomationHook::SchedulePost), None);
    assert_eq!(
        service.url_for(AutomationHook::EditMedia),
        Some("https://flows.internal/edit-media")
    );
}

#[tokio::test]
async fn test_forward_without_configuration_is_a_config_error() {
    let service = WebhookService::new(common::test_config());
    let err = service
        .forward(AutomationHook::SchedulePost, &json!({ "post_id": "p1" }))
        .await
        .expect_err("should fail");
    match err {
        AppError::Config(msg) => {
            assert!(msg.contains("schedule-post"), "got '{msg}'");
            assert!(msg.contains("not configured"), "got '{msg}'");
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Flow endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_flows_require_a_session() {
    let flows = [
        "/api/v1/automation/schedule-post",
        "/api/v1/automation/edit-media",
        "/api/v1/automation/update-post",
        "/api/v1/automation/remove-post",
        "/api/v1/automation/engagement-tracker",
    ];
    for flow in flows {
        let response = common::test_app()
            .oneshot(common::post_json(flow, &json!({ "post_id": "p1" })))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "flow {flow}");
    }
}

#[tokio::test]
async fn test_gate_comes_before_payload_validation() {
    // An actor without the grant learns nothing about what a valid payload
    // looks like; the empty body would otherwise be a 400.
    let cookie = common::session_cookie("editor");
    let response = common::test_app()
        .oneshot(common::post_json_as(
            "/api/v1/automation/schedule-post",
            &cookie,
            &json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = common::body_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("posts.schedule"));
}

#[tokio::test]
async fn test_day_first_rule_enforced_at_the_boundary() {
    // Dash-separated date in an otherwise plausible payload.
    let cookie = common::session_cookie("admin");
    let response = common::test_app()
        .oneshot(common::post_json_as(
            "/api/v1/automation/schedule-post",
            &cookie,
            &json!({ "post_id": "p1", "posting_time": "31-12-2025 10:00" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("posting_time"));
}

#[tokio::test]
async fn test_schedule_flow_requires_posting_time() {
    let cookie = common::session_cookie("admin");
    let response = common::test_app()
        .oneshot(common::post_json_as(
            "/api/v1/automation/schedule-post",
            &cookie,
            &json!({ "post_id": "p1" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "posting_time is required");
}

#[tokio::test]
async fn test_update_flow_requires_post_id() {
    let cookie = common::session_cookie("admin");
    let response = common::test_app()
        .oneshot(common::post_json_as(
            "/api/v1/automation/update-post",
            &cookie,
            &json!({ "title": "New title" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "post_id is required");
}

#[tokio::test]
async fn test_edit_media_flow_requires_media_url() {
    let cookie = common::session_cookie("admin");
    let response = common::test_app()
        .oneshot(common::post_json_as(
            "/api/v1/automation/edit-media",
            &cookie,
            &json!({ "post_id": "p1" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "media_url is required");
}

#[tokio::test]
async fn test_unconfigured_flow_surfaces_a_config_error() {
    // Gate passed (admin), payload valid; the missing URL is the operator's
    // problem and must not masquerade as a client error.
    let cookie = common::session_cookie("admin");
    let response = common::test_app()
        .oneshot(common::post_json_as(
            "/api/v1/automation/schedule-post",
            &cookie,
            &json!({ "post_id": "p1", "posting_time": "31/12/2025 10:00" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::body_json(response).await;
    assert_eq!(body["code"], "CONFIG_ERROR");
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("not configured"));
}

#[tokio::test]
async fn test_engagement_flow_never_fails() {
    // No hook URL, no database, and the endpoint still reports success;
    // engagement tracking is strictly best effort.
    let cookie = common::session_cookie("admin");
    let response = common::test_app()
        .oneshot(common::post_json_as(
            "/api/v1/automation/engagement-tracker",
            &cookie,
            &json!({ "post_id": "p1" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["success"], true);
}
