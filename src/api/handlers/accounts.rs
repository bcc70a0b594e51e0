//! Connected social account handlers.
//!
//! Stored credentials are AES-encrypted at rest and never serialized back
//! out: every outbound view goes through [`account_to_response`], which
//! substitutes the fixed `******` mask. Updates treat the mask (or an empty
//! string) as "leave the stored value alone", so a client can round-trip a
//! masked record without wiping its secrets.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::middleware::auth::{require_permission, CurrentUser};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::account::{ConnectedAccount, Platform, SECRET_MASK};
use crate::models::activity::{ActivityType, EntityType};
use crate::models::permission::Permission;
use crate::services::activity_service::{ActivityEntry, ActivityService};
use crate::services::encryption::SecretCipher;
use crate::services::event_bus::DomainEvent;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route(
            "/:id",
            get(get_account).patch(update_account).delete(delete_account),
        )
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub id: Uuid,
    pub platform: Platform,
    pub channel_id: String,
    pub channel_name: String,
    pub channel_link: Option<String>,
    /// Always the fixed mask, never the stored credential
    pub access_token: String,
    pub client_id: Option<String>,
    /// The fixed mask when a secret is stored, absent otherwise
    pub client_secret: Option<String>,
    pub project_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// The only path from a stored account to JSON. `ConnectedAccount` itself
/// does not implement `Serialize`, so ciphertext cannot leak by accident.
pub fn account_to_response(account: ConnectedAccount) -> AccountResponse {
    AccountResponse {
        id: account.id,
        platform: account.platform,
        channel_id: account.channel_id,
        channel_name: account.channel_name,
        channel_link: account.channel_link,
        access_token: SECRET_MASK.to_string(),
        client_id: account.client_id,
        client_secret: account.client_secret_enc.map(|_| SECRET_MASK.to_string()),
        project_id: account.project_id,
        is_active: account.is_active,
        created_at: account.created_at,
        updated_at: account.updated_at,
    }
}

/// True when an inbound credential field should replace the stored one.
/// The mask and the empty string both mean "unchanged".
fn is_new_secret(incoming: Option<&str>) -> bool {
    matches!(incoming, Some(v) if !v.is_empty() && v != SECRET_MASK)
}

/// Applies the mask convention to a required credential column.
pub fn refreshed_secret(
    stored: String,
    incoming: Option<&str>,
    cipher: &SecretCipher,
) -> Result<String> {
    if is_new_secret(incoming) {
        let plaintext = incoming.unwrap_or_default();
        cipher
            .encrypt_str(plaintext)
            .map_err(|e| AppError::Internal(e.to_string()))
    } else {
        Ok(stored)
    }
}

/// Applies the mask convention to an optional credential column. A stored
/// secret can be replaced but never cleared; only deleting the account
/// removes it.
pub fn refreshed_optional_secret(
    stored: Option<String>,
    incoming: Option<&str>,
    cipher: &SecretCipher,
) -> Result<Option<String>> {
    if is_new_secret(incoming) {
        let plaintext = incoming.unwrap_or_default();
        let ciphertext = cipher
            .encrypt_str(plaintext)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Some(ciphertext))
    } else {
        Ok(stored)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAccountsQuery {
    pub platform: Option<Platform>,
    pub project_id: Option<Uuid>,
    /// Include disconnected accounts (default: false)
    pub include_inactive: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    pub platform: Platform,
    pub channel_id: String,
    pub channel_name: String,
    pub channel_link: Option<String>,
    pub access_token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub channel_link: Option<String>,
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub project_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/accounts",
    tag = "accounts",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "Connected accounts with masked credentials", body = [AccountResponse]),
        (status = 403, description = "Missing accounts.view permission")
    ),
    security(("session_cookie" = []))
)]
pub async fn list_accounts(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Query(query): Query<ListAccountsQuery>,
) -> Result<Json<Vec<AccountResponse>>> {
    require_permission(&state, &actor, Permission::AccountsView).await?;

    let include_inactive = query.include_inactive.unwrap_or(false);
    let accounts = sqlx::query_as::<_, ConnectedAccount>(
        r#"
        SELECT * FROM connected_accounts
        WHERE ($1::platform IS NULL OR platform = $1)
          AND ($2::uuid IS NULL OR project_id = $2)
          AND ($3 OR is_active = true)
        ORDER BY created_at DESC
        "#,
    )
    .bind(query.platform)
    .bind(query.project_id)
    .bind(include_inactive)
    .fetch_all(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(accounts.into_iter().map(account_to_response).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/accounts",
    tag = "accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account with masked credentials", body = AccountResponse),
        (status = 404, description = "Account not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn get_account(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountResponse>> {
    require_permission(&state, &actor, Permission::AccountsView).await?;

    let account = sqlx::query_as::<_, ConnectedAccount>(
        "SELECT * FROM connected_accounts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?
    .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

    Ok(Json(account_to_response(account)))
}

#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/accounts",
    tag = "accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account connected", body = AccountResponse),
        (status = 400, description = "Missing or masked credential"),
        (status = 409, description = "Channel already connected")
    ),
    security(("session_cookie" = []))
)]
pub async fn create_account(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<Json<AccountResponse>> {
    require_permission(&state, &actor, Permission::AccountsManage).await?;

    if payload.channel_id.trim().is_empty() {
        return Err(AppError::Validation("channel_id is required".to_string()));
    }
    if payload.channel_name.trim().is_empty() {
        return Err(AppError::Validation("channel_name is required".to_string()));
    }
    // A new connection needs the real token; the mask only makes sense on
    // updates, where a stored value exists to keep.
    if !is_new_secret(Some(payload.access_token.as_str())) {
        return Err(AppError::Validation(
            "access_token must be provided in full".to_string(),
        ));
    }

    let access_token_enc = state
        .cipher
        .encrypt_str(&payload.access_token)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let client_secret_enc =
        refreshed_optional_secret(None, payload.client_secret.as_deref(), &state.cipher)?;

    let account = sqlx::query_as::<_, ConnectedAccount>(
        r#"
        INSERT INTO connected_accounts
            (platform, channel_id, channel_name, channel_link,
             access_token_enc, client_id, client_secret_enc, project_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(payload.platform)
    .bind(payload.channel_id.trim())
    .bind(payload.channel_name.trim())
    .bind(&payload.channel_link)
    .bind(&access_token_enc)
    .bind(&payload.client_id)
    .bind(&client_secret_enc)
    .bind(payload.project_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("duplicate key") {
            AppError::Conflict("Channel already connected".to_string())
        } else {
            AppError::Database(e.to_string())
        }
    })?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Create, EntityType::Account)
            .entity(account.id.to_string())
            .actor(actor.user_id)
            .description(format!(
                "Connected {} account {}",
                account.platform.as_str(),
                account.channel_name
            )),
    );
    state.event_bus.publish(DomainEvent::now(
        "account.connected",
        account.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(account_to_response(account)))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/accounts",
    tag = "accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated, credentials masked", body = AccountResponse),
        (status = 404, description = "Account not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn update_account(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>> {
    require_permission(&state, &actor, Permission::AccountsManage).await?;

    let existing = sqlx::query_as::<_, ConnectedAccount>(
        "SELECT * FROM connected_accounts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?
    .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

    let access_token_enc = refreshed_secret(
        existing.access_token_enc,
        payload.access_token.as_deref(),
        &state.cipher,
    )?;
    let client_secret_enc = refreshed_optional_secret(
        existing.client_secret_enc,
        payload.client_secret.as_deref(),
        &state.cipher,
    )?;

    let account = sqlx::query_as::<_, ConnectedAccount>(
        r#"
        UPDATE connected_accounts SET
            channel_id = COALESCE($2, channel_id),
            channel_name = COALESCE($3, channel_name),
            channel_link = COALESCE($4, channel_link),
            access_token_enc = $5,
            client_id = COALESCE($6, client_id),
            client_secret_enc = $7,
            project_id = COALESCE($8, project_id),
            is_active = COALESCE($9, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.channel_id.as_deref().map(str::trim))
    .bind(payload.channel_name.as_deref().map(str::trim))
    .bind(&payload.channel_link)
    .bind(&access_token_enc)
    .bind(&payload.client_id)
    .bind(&client_secret_enc)
    .bind(payload.project_id)
    .bind(payload.is_active)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Update, EntityType::Account)
            .entity(account.id.to_string())
            .actor(actor.user_id)
            .description(format!(
                "Updated {} account {}",
                account.platform.as_str(),
                account.channel_name
            )),
    );
    state.event_bus.publish(DomainEvent::now(
        "account.updated",
        account.id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(account_to_response(account)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/accounts",
    tag = "accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account and its credentials deleted"),
        (status = 404, description = "Account not found")
    ),
    security(("session_cookie" = []))
)]
pub async fn delete_account(
    State(state): State<SharedState>,
    Extension(actor): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    require_permission(&state, &actor, Permission::AccountsManage).await?;

    let result = sqlx::query("DELETE FROM connected_accounts WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Account not found".to_string()));
    }

    ActivityService::new(state.db.clone()).record_detached(
        ActivityEntry::new(ActivityType::Delete, EntityType::Account)
            .entity(id.to_string())
            .actor(actor.user_id)
            .description(format!("Disconnected account {}", id)),
    );
    state.event_bus.publish(DomainEvent::now(
        "account.deleted",
        id.to_string(),
        Some(actor.email.clone()),
    ));

    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_accounts,
        get_account,
        create_account,
        update_account,
        delete_account
    ),
    components(schemas(AccountResponse, CreateAccountRequest, UpdateAccountRequest))
)]
pub struct AccountsApiDoc;
