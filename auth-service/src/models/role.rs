//! Role and permission model - tenant-scoped RBAC, plus the parallel system
//! role/permission tables used for cross-tenant system principals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub tenant_id: Uuid,
    pub role_label: String,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    pub fn new(tenant_id: Uuid, role_label: String) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            tenant_id,
            role_label,
            created_utc: Utc::now(),
        }
    }
}

/// A permission key, e.g. `"user:read"`, `"user:*"`, `"*:*"`. Matching is
/// evaluated by `services::permission::matches`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub permission_id: Uuid,
    pub permission_key: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// System-wide role, assignable only to system principals (`tenant_id IS NULL`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SystemRole {
    pub system_role_id: Uuid,
    pub role_label: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SystemRolePermission {
    pub system_role_id: Uuid,
    pub permission_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserSystemRole {
    pub user_id: Uuid,
    pub system_role_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub role_label: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignPermissionRequest {
    pub permission_key: String,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: Uuid,
    pub tenant_id: Uuid,
    pub role_label: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            role_id: r.role_id,
            tenant_id: r.tenant_id,
            role_label: r.role_label,
            created_utc: r.created_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: RoleResponse,
    pub permissions: Vec<String>,
}
