//! Tenant-scoped role and permission management.

use axum::{extract::{Path, State}, Json};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::{auth::AuthUser, tenant::TenantContext};
use crate::models::{AssignPermissionRequest, CreateRoleRequest, Role, RoleResponse};
use crate::services::is_permitted;
use crate::AppState;

/// `POST /tenants/:tenant_id/roles`
pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Json(req): Json<CreateRoleRequest>,
) -> Result<Json<RoleResponse>, AppError> {
    if !is_permitted(&claims.permissions, "role:create") {
        return Err(AppError::PermissionDenied);
    }

    let role = Role::new(tenant_id, req.role_label);
    state.db.insert_role(&role).await?;
    Ok(Json(RoleResponse::from(role)))
}

/// `GET /tenants/:tenant_id/roles`
pub async fn list(State(state): State<AppState>, TenantContext { tenant_id }: TenantContext) -> Result<Json<Vec<RoleResponse>>, AppError> {
    let roles = state.db.find_roles_by_tenant(tenant_id).await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// `GET /roles/:role_id`
pub async fn get(State(state): State<AppState>, Path(role_id): Path<Uuid>) -> Result<Json<RoleResponse>, AppError> {
    let role = state.db.find_role_by_id(role_id).await?.ok_or(AppError::ResourceNotFound("role".to_string()))?;
    Ok(Json(RoleResponse::from(role)))
}

/// `POST /roles/:role_id/permissions` - grants a permission key to a role.
/// `permission:*` and `*:*` are valid keys here too; the wildcard is resolved
/// at check time, not at grant time.
pub async fn assign_permission(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(role_id): Path<Uuid>,
    Json(req): Json<AssignPermissionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !is_permitted(&claims.permissions, "role:manage") {
        return Err(AppError::PermissionDenied);
    }

    let parts: Vec<&str> = req.permission_key.splitn(2, ':').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(AppError::PermissionNamespaceViolation);
    }

    let permission = state.db.find_or_create_permission(&req.permission_key).await?;
    state.db.assign_permission_to_role(role_id, permission.permission_id).await?;

    state
        .audit
        .record(crate::models::AuditEvent::new(
            None,
            claims.sub.parse().ok(),
            crate::models::AuditEventType::PermissionAssigned,
            crate::models::AuditResult::Success,
            crate::models::AuditSeverity::Info,
            Some("role".to_string()),
            Some(role_id),
            None,
            Some(serde_json::json!({ "permission_key": req.permission_key })),
            None,
            None,
        ))
        .await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

#[derive(Debug, serde::Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

/// `POST /tenants/users/:user_id/roles` - the last `tenant_owner` on a tenant
/// cannot have that role removed via the symmetric revoke endpoint; enforced
/// in `revoke_role`, not here. Both the role and the target user must belong
/// to the caller's own tenant, so a token scoped to one tenant can never
/// reach into another's RBAC state.
pub async fn assign_role(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !is_permitted(&claims.permissions, "role:assign") {
        return Err(AppError::PermissionDenied);
    }

    let role = state.db.find_role_by_id(req.role_id).await?.ok_or(AppError::ResourceNotFound("role".to_string()))?;
    if role.tenant_id != tenant_id {
        return Err(AppError::TenantMismatch);
    }
    let target = state.db.find_user_by_id(user_id).await?.ok_or(AppError::ResourceNotFound("user".to_string()))?;
    if target.tenant_id != Some(tenant_id) {
        return Err(AppError::TenantMismatch);
    }

    state.db.assign_role_to_user(user_id, req.role_id).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// `DELETE /tenants/users/:user_id/roles/:role_id`
pub async fn revoke_role(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !is_permitted(&claims.permissions, "role:assign") {
        return Err(AppError::PermissionDenied);
    }

    let role = state.db.find_role_by_id(role_id).await?.ok_or(AppError::ResourceNotFound("role".to_string()))?;
    if role.tenant_id != tenant_id {
        return Err(AppError::TenantMismatch);
    }
    let target = state.db.find_user_by_id(user_id).await?.ok_or(AppError::ResourceNotFound("user".to_string()))?;
    if target.tenant_id != Some(tenant_id) {
        return Err(AppError::TenantMismatch);
    }
    ensure_not_last_protected_owner(&state, role_id, &role.role_label).await?;

    state.db.remove_role_from_user(user_id, role_id).await?;

    state
        .audit
        .record(crate::models::AuditEvent::new(
            Some(role.tenant_id),
            claims.sub.parse().ok(),
            crate::models::AuditEventType::PermissionAssigned,
            crate::models::AuditResult::Success,
            crate::models::AuditSeverity::Warning,
            Some("user".to_string()),
            Some(user_id),
            None,
            Some(serde_json::json!({ "revoked_role_id": role_id })),
            None,
            None,
        ))
        .await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Guard against removing the last holder of a protective role (e.g.
/// `tenant_owner`) from a tenant. Callers pass the role label they intend to
/// remove; if it is a protected label and the target is its sole holder, the
/// removal is refused with `409 last_owner_protected`.
pub async fn ensure_not_last_protected_owner(state: &AppState, role_id: Uuid, role_label: &str) -> Result<(), AppError> {
    const PROTECTED_LABELS: &[&str] = &["tenant_owner"];
    if !PROTECTED_LABELS.contains(&role_label) {
        return Ok(());
    }
    let holder_count = state.db.count_users_with_role(role_id).await?;
    if holder_count <= 1 {
        return Err(AppError::LastOwnerProtected);
    }
    Ok(())
}
