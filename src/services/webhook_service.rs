//! Outbound automation webhooks.
//!
//! Post scheduling and media operations are executed by external automation
//! flows; this service forwards JSON payloads to their configured URLs and
//! relays the upstream response. Each hook has its own URL; a hook without
//! one fails with a configuration error before any network traffic.

use crate::config::Config;
use crate::error::{AppError, Result};
use chrono::NaiveDateTime;
use std::time::Duration;

/// Input format for posting times, e.g. `25/12/2026 09:30`.
pub const POSTING_TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Automation flows the backend can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationHook {
    SchedulePost,
    EditMedia,
    UpdatePost,
    RemovePost,
    EngagementTracker,
}

impl AutomationHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationHook::SchedulePost => "schedule-post",
            AutomationHook::EditMedia => "edit-media",
            AutomationHook::UpdatePost => "update-post",
            AutomationHook::RemovePost => "remove-post",
            AutomationHook::EngagementTracker => "engagement-tracker",
        }
    }
}

/// Response relayed from an automation flow.
#[derive(Debug, Clone)]
pub struct WebhookReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Forwards payloads to configured automation URLs.
#[derive(Clone)]
pub struct WebhookService {
    client: reqwest::Client,
    config: Config,
}

impl WebhookService {
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Configured URL for a hook, if any.
    pub fn url_for(&self, hook: AutomationHook) -> Option<&str> {
        let url = match hook {
            AutomationHook::SchedulePost => &self.config.webhook_schedule_post_url,
            AutomationHook::EditMedia => &self.config.webhook_edit_media_url,
            AutomationHook::UpdatePost => &self.config.webhook_update_post_url,
            AutomationHook::RemovePost => &self.config.webhook_remove_post_url,
            AutomationHook::EngagementTracker => &self.config.webhook_engagement_url,
        };
        url.as_deref().filter(|u| !u.is_empty())
    }

    /// POST a JSON payload to the hook's URL and return the upstream reply.
    ///
    /// Missing URL is a configuration error; a network failure maps to a
    /// webhook error. Upstream HTTP errors are not errors here, the reply
    /// carries whatever status the flow returned.
    pub async fn forward(
        &self,
        hook: AutomationHook,
        payload: &serde_json::Value,
    ) -> Result<WebhookReply> {
        let url = self.url_for(hook).ok_or_else(|| {
            AppError::Config(format!("{} webhook not configured", hook.as_str()))
        })?;

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                AppError::Webhook(format!("{} webhook unreachable: {}", hook.as_str(), e))
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        tracing::debug!(hook = hook.as_str(), status = status, "Webhook forwarded");
        Ok(WebhookReply {
            status,
            content_type,
            body,
        })
    }

    /// Forward without letting failures surface.
    ///
    /// Used for engagement tracking, where the dashboard must keep working
    /// when the flow is down or unconfigured.
    pub async fn forward_best_effort(&self, hook: AutomationHook, payload: &serde_json::Value) {
        match self.forward(hook, payload).await {
            Ok(reply) if reply.status < 400 => {}
            Ok(reply) => {
                tracing::warn!(
                    hook = hook.as_str(),
                    status = reply.status,
                    "Webhook returned error status"
                );
            }
            Err(e) => {
                tracing::warn!(hook = hook.as_str(), error = %e, "Webhook call failed");
            }
        }
    }
}

/// Parse a posting time in `dd/mm/yyyy HH:mm`.
///
/// Anything else, including ISO dates and `-` separators, is a validation
/// error; nothing is forwarded on invalid input. chrono alone would accept
/// unpadded fields and short years, so the parsed value must render back to
/// the exact input to count as well-formed.
pub fn parse_posting_time(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    let reject = || {
        AppError::Validation(format!(
            "posting_time must match dd/mm/yyyy HH:mm, got '{}'",
            value
        ))
    };
    let parsed =
        NaiveDateTime::parse_from_str(trimmed, POSTING_TIME_FORMAT).map_err(|_| reject())?;
    if parsed.format(POSTING_TIME_FORMAT).to_string() != trimmed {
        return Err(reject());
    }
    Ok(parsed)
}

/// Format a stored posting time for automation payloads.
pub fn format_posting_time(value: &NaiveDateTime) -> String {
    value.format(POSTING_TIME_FORMAT).to_string()
}
