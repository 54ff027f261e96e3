//! Capability resolution and the tenant/user override endpoints.

use axum::{extract::{Path, State}, Json};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::{auth::AuthUser, tenant::TenantContext};
use crate::models::{CapabilityResolution, SetTenantCapabilityRequest, SetUserCapabilityRequest, TenantCapability, TenantFeatureEnablement, UserCapabilityState};
use crate::services::is_permitted;
use crate::AppState;

/// `GET /tenants/:tenant_id/capabilities/:capability_key` - resolved for the
/// caller themselves.
pub async fn resolve_for_caller(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Path(capability_key): Path<String>,
) -> Result<Json<CapabilityResolution>, AppError> {
    let user_id: Uuid = claims.sub.parse().map_err(|_| AppError::Unauthorized("malformed subject".to_string()))?;
    let resolution = state.capability.resolve(tenant_id, user_id, &capability_key).await?;
    Ok(Json(resolution))
}

/// `PUT /tenants/:tenant_id/capabilities/:capability_key` - tenant-admin
/// entitlement/enablement override.
pub async fn set_tenant_capability(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Path(capability_key): Path<String>,
    Json(req): Json<SetTenantCapabilityRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !is_permitted(&claims.permissions, "capability:manage") {
        return Err(AppError::PermissionDenied);
    }

    let now = chrono::Utc::now();
    if let Some(entitled) = req.entitled {
        state
            .db
            .upsert_tenant_capability(&TenantCapability { tenant_id, capability_key: capability_key.clone(), entitled, updated_utc: now })
            .await?;
    }
    if let Some(enabled) = req.enabled {
        state
            .db
            .upsert_tenant_feature_enablement(&TenantFeatureEnablement { tenant_id, capability_key: capability_key.clone(), enabled, updated_utc: now })
            .await?;
    }

    state
        .audit
        .record(crate::models::AuditEvent::new(
            Some(tenant_id),
            claims.sub.parse().ok(),
            crate::models::AuditEventType::CapabilityChanged,
            crate::models::AuditResult::Success,
            crate::models::AuditSeverity::Warning,
            Some("capability".to_string()),
            None,
            None,
            Some(serde_json::json!({ "capability_key": capability_key })),
            None,
            None,
        ))
        .await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// `PUT /tenants/:tenant_id/capabilities/:capability_key/user` - the caller's
/// own elective opt-in, only possible once the tenant layer is enabled.
pub async fn set_user_capability(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Path(capability_key): Path<String>,
    Json(req): Json<SetUserCapabilityRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id: Uuid = claims.sub.parse().map_err(|_| AppError::Unauthorized("malformed subject".to_string()))?;

    let resolution = state.capability.resolve(tenant_id, user_id, &capability_key).await?;
    if !resolution.tenant_enabled {
        return Err(AppError::FeatureNotEnabled);
    }

    state
        .db
        .upsert_user_capability_state(&UserCapabilityState { user_id, capability_key, enabled: req.enabled, updated_utc: chrono::Utc::now() })
        .await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
