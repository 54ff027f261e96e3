//! Capability model - the three-layer feature-gating chain: system catalog,
//! tenant entitlement, and per-user elective state. A capability is "on" for
//! a user only when all three layers agree (see `services::capability`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Global catalog entry. Defines that a capability exists at all.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SystemCapability {
    pub capability_key: String,
    pub description: String,
    pub default_enabled: bool,
    pub created_utc: DateTime<Utc>,
}

/// Tenant-level entitlement: whether a tenant is allowed to use a capability
/// at all, independent of whether any user has turned it on.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantCapability {
    pub tenant_id: Uuid,
    pub capability_key: String,
    pub entitled: bool,
    pub updated_utc: DateTime<Utc>,
}

/// Tenant-level feature enablement: whether an entitled capability has been
/// switched on tenant-wide by a tenant admin.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantFeatureEnablement {
    pub tenant_id: Uuid,
    pub capability_key: String,
    pub enabled: bool,
    pub updated_utc: DateTime<Utc>,
}

/// Per-user elective toggle for capabilities that default to user opt-in.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserCapabilityState {
    pub user_id: Uuid,
    pub capability_key: String,
    pub enabled: bool,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilityResolution {
    pub capability_key: String,
    pub system_defined: bool,
    pub tenant_entitled: bool,
    pub tenant_enabled: bool,
    pub user_enabled: bool,
    pub effective: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetTenantCapabilityRequest {
    pub entitled: Option<bool>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetUserCapabilityRequest {
    pub enabled: bool,
}
