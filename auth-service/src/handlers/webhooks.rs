//! Tenant-scoped webhook subscription management. Delivery itself runs out
//! of `services::webhook::WebhookDispatcher` on a background timer.

use axum::{extract::State, Json};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use service_core::error::AppError;

use crate::middleware::tenant::TenantContext;
use crate::middleware::auth::AuthUser;
use crate::models::{CreateWebhookRequest, WebhookResponse, WebhookSubscription};
use crate::services::is_permitted;
use crate::AppState;

fn generate_signing_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `POST /tenants/:tenant_id/webhooks`
pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<Json<WebhookResponse>, AppError> {
    if !is_permitted(&claims.permissions, "webhook:manage") {
        return Err(AppError::PermissionDenied);
    }
    if !req.target_url.starts_with("https://") {
        return Err(AppError::InvalidRequest("target_url must be https".to_string()));
    }

    let webhook = WebhookSubscription::new(tenant_id, req.target_url, generate_signing_secret(), req.event_types);
    state.db.insert_webhook(&webhook).await?;
    Ok(Json(WebhookResponse::from(webhook)))
}

/// `GET /tenants/:tenant_id/webhooks`
pub async fn list(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
) -> Result<Json<Vec<WebhookResponse>>, AppError> {
    if !is_permitted(&claims.permissions, "webhook:manage") {
        return Err(AppError::PermissionDenied);
    }
    let webhooks = state.db.find_webhooks_for_tenant(tenant_id).await?;
    Ok(Json(webhooks.into_iter().map(WebhookResponse::from).collect()))
}
