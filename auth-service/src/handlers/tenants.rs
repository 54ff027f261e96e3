//! Tenant lifecycle: only system principals may create or suspend tenants.

use axum::{extract::{Path, State}, Json};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::auth::AuthUser;
use crate::models::{AuditEvent, AuditEventType, AuditResult, AuditSeverity, CreateTenantRequest, Tenant, TenantResponse};
use crate::services::is_permitted;
use crate::AppState;

fn require_system_admin(claims: &crate::services::AccessTokenClaims) -> Result<(), AppError> {
    if claims.principal_type != "system" || !is_permitted(&claims.permissions, "tenant:manage") {
        return Err(AppError::PermissionDenied);
    }
    Ok(())
}

/// `POST /tenants` - system-only. Bootstraps the tenant's predefined roles,
/// baseline permission set and role grants in the same transaction; the
/// creating principal receives `tenant_owner` when it is itself a tenant
/// principal (never the case through this system-only route today, but the
/// bootstrap is written to hold for a future self-service path too).
pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateTenantRequest>,
) -> Result<Json<TenantResponse>, AppError> {
    require_system_admin(&claims)?;

    if state.db.find_tenant_by_slug(&req.tenant_slug).await?.is_some() {
        return Err(AppError::InvalidRequest("tenant slug already in use".to_string()));
    }

    let tenant = Tenant::new(req.tenant_slug, req.tenant_label);
    let owner_user_id = if claims.principal_type == "user" {
        claims.sub.parse::<Uuid>().ok()
    } else {
        None
    };
    state.db.bootstrap_tenant(&tenant, owner_user_id).await?;
    Ok(Json(TenantResponse::from(tenant)))
}

/// `GET /tenants/:tenant_id`
pub async fn get(State(state): State<AppState>, Path(tenant_id): Path<Uuid>) -> Result<Json<TenantResponse>, AppError> {
    let tenant = state.db.find_tenant_by_id(tenant_id).await?.ok_or(AppError::TenantNotFound)?;
    Ok(Json(TenantResponse::from(tenant)))
}

#[derive(Debug, serde::Deserialize)]
pub struct SuspendTenantRequest {
    pub reason: String,
}

/// `POST /tenants/:tenant_id/suspend` - system-only, reasoned.
pub async fn suspend(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<SuspendTenantRequest>,
) -> Result<Json<TenantResponse>, AppError> {
    require_system_admin(&claims)?;
    if req.reason.trim().is_empty() {
        return Err(AppError::AuditReasonRequired);
    }

    let tenant = state.db.find_tenant_by_id(tenant_id).await?.ok_or(AppError::TenantNotFound)?;
    state.db.update_tenant_state(tenant_id, crate::models::TenantState::Suspended.as_str()).await?;

    let actor_id = claims.sub.parse::<Uuid>().ok();
    state
        .audit
        .record(AuditEvent::new(
            Some(tenant_id),
            actor_id,
            AuditEventType::UserSuspended,
            AuditResult::Success,
            AuditSeverity::Critical,
            Some("tenant".to_string()),
            Some(tenant_id),
            Some(req.reason),
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(TenantResponse { tenant_state_code: "suspended".to_string(), ..TenantResponse::from(tenant) }))
}

/// `POST /tenants/:tenant_id/reactivate` - system-only.
pub async fn reactivate(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantResponse>, AppError> {
    require_system_admin(&claims)?;
    let tenant = state.db.find_tenant_by_id(tenant_id).await?.ok_or(AppError::TenantNotFound)?;
    state.db.update_tenant_state(tenant_id, crate::models::TenantState::Active.as_str()).await?;
    Ok(Json(TenantResponse { tenant_state_code: "active".to_string(), ..TenantResponse::from(tenant) }))
}
