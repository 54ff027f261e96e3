//! User lifecycle actions against another principal's account: suspension
//! and reactivation. Both are reasoned and audited at `critical` severity.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::handlers::roles::ensure_not_last_protected_owner;
use crate::middleware::{auth::AuthUser, tenant::TenantContext};
use crate::models::{AuditEvent, AuditEventType, AuditResult, AuditSeverity, User, UserResponse, UserState};
use crate::services::is_permitted;
use crate::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct UserLifecycleRequest {
    pub reason: String,
}

/// Suspending a tenant's sole `tenant_owner` would leave the tenant
/// ownerless, so it is refused the same way removing their role is.
async fn guard_sole_owner(state: &AppState, target: &User) -> Result<(), AppError> {
    let Some(tenant_id) = target.tenant_id else { return Ok(()) };

    let role_labels = state.db.get_user_role_labels(target.user_id).await?;
    if !role_labels.iter().any(|label| label == "tenant_owner") {
        return Ok(());
    }

    let roles = state.db.find_roles_by_tenant(tenant_id).await?;
    if let Some(owner_role) = roles.into_iter().find(|r| r.role_label == "tenant_owner") {
        ensure_not_last_protected_owner(state, owner_role.role_id, &owner_role.role_label).await?;
    }
    Ok(())
}

/// `POST /tenants/users/:user_id/suspend` - requires `user:manage`, a
/// non-empty reason, and that the target belongs to the caller's own tenant.
pub async fn suspend(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserLifecycleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if !is_permitted(&claims.permissions, "user:manage") {
        return Err(AppError::PermissionDenied);
    }
    if req.reason.trim().is_empty() {
        return Err(AppError::AuditReasonRequired);
    }

    let target = state.db.find_user_by_id(user_id).await?.ok_or(AppError::ResourceNotFound("user".to_string()))?;
    if target.tenant_id != Some(tenant_id) {
        return Err(AppError::TenantMismatch);
    }
    guard_sole_owner(&state, &target).await?;

    state.db.update_user_state(user_id, UserState::Suspended.as_str()).await?;

    state
        .audit
        .record(AuditEvent::new(
            target.tenant_id,
            claims.sub.parse().ok(),
            AuditEventType::UserSuspended,
            AuditResult::Success,
            AuditSeverity::Critical,
            Some("user".to_string()),
            Some(user_id),
            Some(req.reason),
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(UserResponse { user_state_code: UserState::Suspended.as_str().to_string(), ..UserResponse::from(target) }))
}

/// `POST /tenants/users/:user_id/activate` - requires `user:manage`, a
/// non-empty reason, and that the target belongs to the caller's own tenant.
pub async fn activate(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserLifecycleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if !is_permitted(&claims.permissions, "user:manage") {
        return Err(AppError::PermissionDenied);
    }
    if req.reason.trim().is_empty() {
        return Err(AppError::AuditReasonRequired);
    }

    let target = state.db.find_user_by_id(user_id).await?.ok_or(AppError::ResourceNotFound("user".to_string()))?;
    if target.tenant_id != Some(tenant_id) {
        return Err(AppError::TenantMismatch);
    }
    state.db.update_user_state(user_id, UserState::Active.as_str()).await?;

    state
        .audit
        .record(AuditEvent::new(
            target.tenant_id,
            claims.sub.parse().ok(),
            AuditEventType::UserReactivated,
            AuditResult::Success,
            AuditSeverity::Info,
            Some("user".to_string()),
            Some(user_id),
            Some(req.reason),
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(UserResponse { user_state_code: UserState::Active.as_str().to_string(), ..UserResponse::from(target) }))
}
