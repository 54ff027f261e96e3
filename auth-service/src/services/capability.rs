//! Resolves the three-layer capability chain: a capability is effective for
//! a user only when it is system-defined, the tenant is entitled to it, the
//! tenant has enabled it, and (for user-elective capabilities) the user has
//! turned it on.

use service_core::error::AppError;
use uuid::Uuid;

use crate::models::CapabilityResolution;
use crate::services::Database;

#[derive(Clone)]
pub struct CapabilityService {
    db: Database,
}

impl CapabilityService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve a single capability for a user within a tenant context.
    ///
    /// `default_enabled` only gates whether the capability is offered by the
    /// system at all; it is not a fallback default for the tenant or user
    /// layers. Absent an explicit row, a tenant is not entitled, a tenant has
    /// not enabled a capability it is entitled to, and a user has not opted
    /// in to a capability the tenant has enabled. Each layer must be
    /// explicitly granted by the layer above it.
    pub async fn resolve(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        capability_key: &str,
    ) -> Result<CapabilityResolution, AppError> {
        let system_cap = self.db.get_system_capability(capability_key).await?;
        let Some(system_cap) = system_cap else {
            return Ok(CapabilityResolution {
                capability_key: capability_key.to_string(),
                system_defined: false,
                tenant_entitled: false,
                tenant_enabled: false,
                user_enabled: false,
                effective: false,
            });
        };

        if !system_cap.default_enabled {
            return Ok(CapabilityResolution {
                capability_key: capability_key.to_string(),
                system_defined: true,
                tenant_entitled: false,
                tenant_enabled: false,
                user_enabled: false,
                effective: false,
            });
        }

        let tenant_entitled = self
            .db
            .get_tenant_capability(tenant_id, capability_key)
            .await?
            .map(|row| row.entitled)
            .unwrap_or(false);

        let tenant_enabled = tenant_entitled
            && self
                .db
                .get_tenant_feature_enablement(tenant_id, capability_key)
                .await?
                .map(|row| row.enabled)
                .unwrap_or(false);

        let user_enabled = tenant_enabled
            && self
                .db
                .get_user_capability_state(user_id, capability_key)
                .await?
                .map(|row| row.enabled)
                .unwrap_or(false);

        Ok(CapabilityResolution {
            capability_key: capability_key.to_string(),
            system_defined: true,
            tenant_entitled,
            tenant_enabled,
            user_enabled,
            effective: tenant_entitled && tenant_enabled && user_enabled,
        })
    }

    /// Convenience check used by handlers gating a single feature-flagged route.
    pub async fn require(&self, tenant_id: Uuid, user_id: Uuid, capability_key: &str) -> Result<(), AppError> {
        let resolution = self.resolve(tenant_id, user_id, capability_key).await?;
        if resolution.effective {
            Ok(())
        } else {
            Err(AppError::FeatureNotEnabled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_without_system_definition_is_never_effective() {
        let resolution = CapabilityResolution {
            capability_key: "nonexistent".to_string(),
            system_defined: false,
            tenant_entitled: false,
            tenant_enabled: false,
            user_enabled: false,
            effective: false,
        };
        assert!(!resolution.effective);
    }
}
