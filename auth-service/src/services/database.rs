//! PostgreSQL repository for auth-service.
//!
//! Uses sqlx with runtime-checked queries against the tenant/principal/
//! credential/RBAC/capability/audit/webhook schema.

use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    AuditEvent, AuditQueryParams, Credential, FederatedIdentity, Invitation, Permission,
    RefreshSession, Role, SystemCapability, SystemRole, Tenant, TenantCapability,
    TenantFeatureEnablement, User, UserCapabilityState, WebhookDelivery, WebhookSubscription,
};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== Tenant Operations ====================

    pub async fn find_tenant_by_id(&self, tenant_id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    pub async fn find_tenant_by_slug(&self, tenant_slug: &str) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE tenant_slug = $1")
            .bind(tenant_slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    pub async fn insert_tenant(&self, tenant: &Tenant) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO tenants (tenant_id, tenant_slug, tenant_label, tenant_state_code, created_utc)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(tenant.tenant_id)
        .bind(&tenant.tenant_slug)
        .bind(&tenant.tenant_label)
        .bind(&tenant.tenant_state_code)
        .bind(tenant.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_tenant_state(&self, tenant_id: Uuid, state_code: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE tenants SET tenant_state_code = $2 WHERE tenant_id = $1")
            .bind(tenant_id)
            .bind(state_code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Creates a tenant and, in the same transaction, its predefined roles
    /// (`tenant_owner`/`tenant_admin`/`tenant_auditor`), a baseline
    /// permission set, and the role-permission assignments for each. When
    /// `owner_user_id` is given (the creating principal was itself a tenant
    /// principal) they're granted `tenant_owner`.
    pub async fn bootstrap_tenant(&self, tenant: &Tenant, owner_user_id: Option<Uuid>) -> Result<(), AppError> {
        const BASELINE_PERMISSIONS: &[&str] = &[
            "*:*",
            "role:create",
            "role:manage",
            "role:assign",
            "user:create",
            "user:read",
            "user:manage",
            "invitation:create",
            "webhook:manage",
            "capability:manage",
            "audit:read",
        ];

        let role_defs: [(&str, &[&str]); 3] = [
            ("tenant_owner", &["*:*"]),
            (
                "tenant_admin",
                &["role:create", "role:assign", "user:create", "user:read", "user:manage", "invitation:create", "webhook:manage", "capability:manage"],
            ),
            ("tenant_auditor", &["audit:read", "user:read"]),
        ];

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO tenants (tenant_id, tenant_slug, tenant_label, tenant_state_code, created_utc)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(tenant.tenant_id)
        .bind(&tenant.tenant_slug)
        .bind(&tenant.tenant_label)
        .bind(&tenant.tenant_state_code)
        .bind(tenant.created_utc)
        .execute(&mut *tx)
        .await?;

        let mut permission_ids = std::collections::HashMap::new();
        for key in BASELINE_PERMISSIONS {
            let existing = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE permission_key = $1")
                .bind(*key)
                .fetch_optional(&mut *tx)
                .await?;
            let permission_id = match existing {
                Some(p) => p.permission_id,
                None => {
                    let permission_id = Uuid::new_v4();
                    sqlx::query("INSERT INTO permissions (permission_id, permission_key, created_utc) VALUES ($1, $2, $3)")
                        .bind(permission_id)
                        .bind(*key)
                        .bind(chrono::Utc::now())
                        .execute(&mut *tx)
                        .await?;
                    permission_id
                }
            };
            permission_ids.insert(*key, permission_id);
        }

        let mut owner_role_id = None;
        for (label, perms) in role_defs {
            let role = Role::new(tenant.tenant_id, label.to_string());
            sqlx::query("INSERT INTO roles (role_id, tenant_id, role_label, created_utc) VALUES ($1, $2, $3, $4)")
                .bind(role.role_id)
                .bind(role.tenant_id)
                .bind(&role.role_label)
                .bind(role.created_utc)
                .execute(&mut *tx)
                .await?;

            for perm_key in perms {
                let permission_id = *permission_ids.get(perm_key).expect("role grants draw from the baseline permission set");
                sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                    .bind(role.role_id)
                    .bind(permission_id)
                    .execute(&mut *tx)
                    .await?;
            }

            if label == "tenant_owner" {
                owner_role_id = Some(role.role_id);
            }
        }

        if let (Some(user_id), Some(role_id)) = (owner_user_id, owner_role_id) {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(user_id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ==================== Principal (User) Operations ====================

    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_username_in_tenant(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND username = $2",
        )
        .bind(tenant_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_system_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id IS NULL AND username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (user_id, tenant_id, principal_type, username, email, email_verified,
                display_name, user_state_code, mfa_enrolled, failed_login_count, locked_until_utc,
                created_utc, updated_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(user.user_id)
        .bind(user.tenant_id)
        .bind(&user.principal_type)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.email_verified)
        .bind(&user.display_name)
        .bind(&user.user_state_code)
        .bind(user.mfa_enrolled)
        .bind(user.failed_login_count)
        .bind(user.locked_until_utc)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_user_state(&self, user_id: Uuid, state_code: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET user_state_code = $2, updated_utc = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(state_code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET email_verified = true, updated_utc = now() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Increments the failure counter and locks the account once `lock_threshold`
    /// is reached. Returns the post-increment count.
    pub async fn record_login_failure(
        &self,
        user_id: Uuid,
        lock_threshold: i32,
        lock_minutes: i64,
    ) -> Result<i32, AppError> {
        let (count,): (i32,) = sqlx::query_as(
            "UPDATE users SET failed_login_count = failed_login_count + 1, updated_utc = now()
             WHERE user_id = $1 RETURNING failed_login_count",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if count >= lock_threshold {
            sqlx::query(
                "UPDATE users SET user_state_code = 'locked', locked_until_utc = now() + ($2 || ' minutes')::interval
                 WHERE user_id = $1",
            )
            .bind(user_id)
            .bind(lock_minutes.to_string())
            .execute(&self.pool)
            .await?;
        }
        Ok(count)
    }

    pub async fn reset_login_failures(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET failed_login_count = 0, locked_until_utc = NULL, updated_utc = now()
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_mfa_enrolled(&self, user_id: Uuid, enrolled: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET mfa_enrolled = $2, updated_utc = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(enrolled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Credential Operations ====================

    pub async fn find_credential(&self, user_id: Uuid) -> Result<Option<Credential>, AppError> {
        let cred = sqlx::query_as::<_, Credential>("SELECT * FROM credentials WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cred)
    }

    pub async fn insert_credential(&self, cred: &Credential) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO credentials (user_id, password_hash, password_updated_utc,
                mfa_secret_sealed, mfa_recovery_codes_sealed, state_code, created_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(cred.user_id)
        .bind(&cred.password_hash)
        .bind(cred.password_updated_utc)
        .bind(&cred.mfa_secret_sealed)
        .bind(&cred.mfa_recovery_codes_sealed)
        .bind(&cred.state_code)
        .bind(cred.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_credential_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE credentials SET password_hash = $2, password_updated_utc = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_credential_mfa(
        &self,
        user_id: Uuid,
        secret_sealed: Option<&[u8]>,
        recovery_codes_sealed: Option<&[u8]>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE credentials SET mfa_secret_sealed = $2, mfa_recovery_codes_sealed = $3 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(secret_sealed)
        .bind(recovery_codes_sealed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Refresh Session Operations ====================

    pub async fn find_refresh_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshSession>, AppError> {
        let session = sqlx::query_as::<_, RefreshSession>(
            "SELECT * FROM refresh_sessions WHERE token_hash_text = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn insert_refresh_session(&self, session: &RefreshSession) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO refresh_sessions (session_id, user_id, parent_session_id, token_hash_text,
                mfa_verified, remember_me, expiry_utc, rotated_utc, revoked_utc, created_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(session.parent_session_id)
        .bind(&session.token_hash_text)
        .bind(session.mfa_verified)
        .bind(session.remember_me)
        .bind(session.expiry_utc)
        .bind(session.rotated_utc)
        .bind(session.revoked_utc)
        .bind(session.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_session_rotated(&self, session_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE refresh_sessions SET rotated_utc = now() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn revoke_refresh_session(&self, session_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE refresh_sessions SET revoked_utc = now() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revoke the whole rotation family for a user. Used both for explicit
    /// "log out everywhere" and for reuse-detection fallout.
    pub async fn revoke_all_user_sessions(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE refresh_sessions SET revoked_utc = now() WHERE user_id = $1 AND revoked_utc IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_active_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshSession>, AppError> {
        let sessions = sqlx::query_as::<_, RefreshSession>(
            "SELECT * FROM refresh_sessions
             WHERE user_id = $1 AND revoked_utc IS NULL AND rotated_utc IS NULL AND expiry_utc > now()
             ORDER BY created_utc DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    // ==================== Role / Permission Operations ====================

    pub async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    pub async fn find_roles_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    pub async fn insert_role(&self, role: &Role) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO roles (role_id, tenant_id, role_label, created_utc) VALUES ($1, $2, $3, $4)",
        )
        .bind(role.role_id)
        .bind(role.tenant_id)
        .bind(&role.role_label)
        .bind(role.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_or_create_permission(&self, permission_key: &str) -> Result<Permission, AppError> {
        if let Some(p) = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE permission_key = $1",
        )
        .bind(permission_key)
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok(p);
        }
        let permission = Permission {
            permission_id: Uuid::new_v4(),
            permission_key: permission_key.to_string(),
            created_utc: chrono::Utc::now(),
        };
        sqlx::query(
            "INSERT INTO permissions (permission_id, permission_key, created_utc) VALUES ($1, $2, $3)",
        )
        .bind(permission.permission_id)
        .bind(&permission.permission_key)
        .bind(permission.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(permission)
    }

    pub async fn assign_permission_to_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn assign_role_to_user(&self, user_id: Uuid, role_id: Uuid) -> Result<(), AppError> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_role_from_user(&self, user_id: Uuid, role_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All permission keys held by a tenant user through its role memberships.
    pub async fn get_user_permission_keys(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT p.permission_key
             FROM permissions p
             JOIN role_permissions rp ON rp.permission_id = p.permission_id
             JOIN user_roles ur ON ur.role_id = rp.role_id
             WHERE ur.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    pub async fn get_user_role_labels(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT r.role_label FROM roles r JOIN user_roles ur ON ur.role_id = r.role_id WHERE ur.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(l,)| l).collect())
    }

    /// System-wide permission keys held by a system principal through system roles.
    pub async fn get_user_system_permission_keys(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT p.permission_key
             FROM permissions p
             JOIN system_role_permissions srp ON srp.permission_id = p.permission_id
             JOIN user_system_roles usr ON usr.system_role_id = srp.system_role_id
             WHERE usr.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    pub async fn get_user_system_role_labels(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT sr.role_label FROM system_roles sr
             JOIN user_system_roles usr ON usr.system_role_id = sr.system_role_id
             WHERE usr.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(l,)| l).collect())
    }

    pub async fn find_system_role_by_label(&self, label: &str) -> Result<Option<SystemRole>, AppError> {
        let role = sqlx::query_as::<_, SystemRole>("SELECT * FROM system_roles WHERE role_label = $1")
            .bind(label)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    /// Used by the bootstrap routine to install the built-in `system_admin`
    /// role on first startup.
    pub async fn find_or_create_system_role(&self, label: &str) -> Result<SystemRole, AppError> {
        if let Some(role) = self.find_system_role_by_label(label).await? {
            return Ok(role);
        }
        let role = SystemRole { system_role_id: Uuid::new_v4(), role_label: label.to_string(), created_utc: chrono::Utc::now() };
        sqlx::query("INSERT INTO system_roles (system_role_id, role_label, created_utc) VALUES ($1, $2, $3)")
            .bind(role.system_role_id)
            .bind(&role.role_label)
            .bind(role.created_utc)
            .execute(&self.pool)
            .await?;
        Ok(role)
    }

    pub async fn assign_permission_to_system_role(&self, system_role_id: Uuid, permission_id: Uuid) -> Result<(), AppError> {
        sqlx::query("INSERT INTO system_role_permissions (system_role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(system_role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn assign_system_role_to_user(&self, user_id: Uuid, system_role_id: Uuid) -> Result<(), AppError> {
        sqlx::query("INSERT INTO user_system_roles (user_id, system_role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(system_role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Count of users holding a given role, used for last-owner protection.
    pub async fn count_users_with_role(&self, role_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ==================== Capability Operations ====================

    pub async fn get_system_capability(&self, key: &str) -> Result<Option<SystemCapability>, AppError> {
        let cap = sqlx::query_as::<_, SystemCapability>(
            "SELECT * FROM system_capabilities WHERE capability_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cap)
    }

    pub async fn get_tenant_capability(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<Option<TenantCapability>, AppError> {
        let cap = sqlx::query_as::<_, TenantCapability>(
            "SELECT * FROM tenant_capabilities WHERE tenant_id = $1 AND capability_key = $2",
        )
        .bind(tenant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cap)
    }

    pub async fn upsert_tenant_capability(&self, cap: &TenantCapability) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO tenant_capabilities (tenant_id, capability_key, entitled, updated_utc)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (tenant_id, capability_key) DO UPDATE SET entitled = $3, updated_utc = now()",
        )
        .bind(cap.tenant_id)
        .bind(&cap.capability_key)
        .bind(cap.entitled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_tenant_feature_enablement(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> Result<Option<TenantFeatureEnablement>, AppError> {
        let row = sqlx::query_as::<_, TenantFeatureEnablement>(
            "SELECT * FROM tenant_feature_enablement WHERE tenant_id = $1 AND capability_key = $2",
        )
        .bind(tenant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_tenant_feature_enablement(&self, row: &TenantFeatureEnablement) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO tenant_feature_enablement (tenant_id, capability_key, enabled, updated_utc)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (tenant_id, capability_key) DO UPDATE SET enabled = $3, updated_utc = now()",
        )
        .bind(row.tenant_id)
        .bind(&row.capability_key)
        .bind(row.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_capability_state(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> Result<Option<UserCapabilityState>, AppError> {
        let row = sqlx::query_as::<_, UserCapabilityState>(
            "SELECT * FROM user_capability_state WHERE user_id = $1 AND capability_key = $2",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_user_capability_state(&self, row: &UserCapabilityState) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_capability_state (user_id, capability_key, enabled, updated_utc)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (user_id, capability_key) DO UPDATE SET enabled = $3, updated_utc = now()",
        )
        .bind(row.user_id)
        .bind(&row.capability_key)
        .bind(row.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Audit Event Operations ====================

    pub async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO audit_events (event_id, tenant_id, actor_user_id, event_type_code,
                result_code, severity_code, target_type, target_id, reason, event_data,
                ip_address, user_agent, created_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(event.event_id)
        .bind(event.tenant_id)
        .bind(event.actor_user_id)
        .bind(&event.event_type_code)
        .bind(&event.result_code)
        .bind(&event.severity_code)
        .bind(&event.target_type)
        .bind(event.target_id)
        .bind(&event.reason)
        .bind(&event.event_data)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(event.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_audit_events(&self, params: &AuditQueryParams) -> Result<Vec<AuditEvent>, AppError> {
        let limit = params.limit.unwrap_or(50).clamp(1, 200);
        let offset = params.offset.unwrap_or(0).max(0);

        let events = sqlx::query_as::<_, AuditEvent>(
            "SELECT * FROM audit_events
             WHERE ($1::uuid IS NULL OR tenant_id = $1)
               AND ($2::uuid IS NULL OR actor_user_id = $2)
               AND ($3::text IS NULL OR event_type_code = $3)
               AND ($4::text IS NULL OR target_type = $4)
               AND ($5::uuid IS NULL OR target_id = $5)
               AND ($6::timestamptz IS NULL OR created_utc >= $6)
               AND ($7::timestamptz IS NULL OR created_utc <= $7)
             ORDER BY created_utc DESC
             LIMIT $8 OFFSET $9",
        )
        .bind(params.tenant_id)
        .bind(params.actor_user_id)
        .bind(&params.event_type)
        .bind(&params.target_type)
        .bind(params.target_id)
        .bind(params.from_utc)
        .bind(params.to_utc)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    // ==================== Invitation Operations ====================

    pub async fn find_invitation_by_token_hash(&self, token_hash: &str) -> Result<Option<Invitation>, AppError> {
        let invitation = sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invitation)
    }

    pub async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO invitations (invitation_id, tenant_id, email, role_id, token_hash,
                state_code, expiry_utc, accepted_utc, created_by_user_id, created_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(invitation.invitation_id)
        .bind(invitation.tenant_id)
        .bind(&invitation.email)
        .bind(invitation.role_id)
        .bind(&invitation.token_hash)
        .bind(&invitation.state_code)
        .bind(invitation.expiry_utc)
        .bind(invitation.accepted_utc)
        .bind(invitation.created_by_user_id)
        .bind(invitation.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_invitation_accepted(&self, invitation_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE invitations SET state_code = 'accepted', accepted_utc = now() WHERE invitation_id = $1")
            .bind(invitation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn revoke_invitation(&self, invitation_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE invitations SET state_code = 'revoked' WHERE invitation_id = $1")
            .bind(invitation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Webhook Operations ====================

    pub async fn find_webhook_by_id(&self, webhook_id: Uuid) -> Result<Option<WebhookSubscription>, AppError> {
        let row = sqlx::query_as::<_, WebhookSubscription>("SELECT * FROM webhooks WHERE webhook_id = $1")
            .bind(webhook_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_webhooks_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<WebhookSubscription>, AppError> {
        let rows = sqlx::query_as::<_, WebhookSubscription>(
            "SELECT * FROM webhooks WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_webhooks_subscribed_to(&self, event_type: &str) -> Result<Vec<WebhookSubscription>, AppError> {
        let rows = sqlx::query_as::<_, WebhookSubscription>(
            "SELECT * FROM webhooks WHERE enabled AND ($1 = ANY(event_types) OR '*' = ANY(event_types))",
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_webhook(&self, webhook: &WebhookSubscription) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO webhooks (webhook_id, tenant_id, target_url, signing_secret, event_types, enabled, created_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(webhook.webhook_id)
        .bind(webhook.tenant_id)
        .bind(&webhook.target_url)
        .bind(&webhook.signing_secret)
        .bind(&webhook.event_types)
        .bind(webhook.enabled)
        .bind(webhook.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_webhook_delivery(&self, delivery: &WebhookDelivery) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO webhook_deliveries (delivery_id, webhook_id, event_type, payload, state_code,
                attempt_count, next_attempt_utc, last_error, created_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(delivery.delivery_id)
        .bind(delivery.webhook_id)
        .bind(&delivery.event_type)
        .bind(&delivery.payload)
        .bind(&delivery.state_code)
        .bind(delivery.attempt_count)
        .bind(delivery.next_attempt_utc)
        .bind(&delivery.last_error)
        .bind(delivery.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_due_webhook_deliveries(&self, limit: i64) -> Result<Vec<WebhookDelivery>, AppError> {
        let rows = sqlx::query_as::<_, WebhookDelivery>(
            "SELECT * FROM webhook_deliveries
             WHERE state_code = 'pending' AND next_attempt_utc <= now()
             ORDER BY next_attempt_utc ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_webhook_delivery_outcome(
        &self,
        delivery_id: Uuid,
        state_code: &str,
        attempt_count: i32,
        next_attempt_utc: Option<chrono::DateTime<chrono::Utc>>,
        last_error: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE webhook_deliveries
             SET state_code = $2, attempt_count = $3, next_attempt_utc = $4, last_error = $5
             WHERE delivery_id = $1",
        )
        .bind(delivery_id)
        .bind(state_code)
        .bind(attempt_count)
        .bind(next_attempt_utc)
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Federated Identity Operations ====================

    pub async fn find_federated_identity_by_subject(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<FederatedIdentity>, AppError> {
        let row = sqlx::query_as::<_, FederatedIdentity>(
            "SELECT * FROM federated_identities WHERE provider = $1 AND external_id = $2",
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_federated_identities_for_user(&self, user_id: Uuid) -> Result<Vec<FederatedIdentity>, AppError> {
        let rows = sqlx::query_as::<_, FederatedIdentity>(
            "SELECT * FROM federated_identities WHERE user_id = $1 ORDER BY created_utc ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_federated_identity_by_id(&self, federated_identity_id: Uuid) -> Result<Option<FederatedIdentity>, AppError> {
        let row = sqlx::query_as::<_, FederatedIdentity>(
            "SELECT * FROM federated_identities WHERE federated_identity_id = $1",
        )
        .bind(federated_identity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Inserts the new link; when it is the user's first, or explicitly
    /// requested as primary, demotes any existing primary link in the same
    /// transaction so the one-primary-per-user invariant always holds.
    pub async fn insert_federated_identity(&self, identity: &FederatedIdentity) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        if identity.is_primary {
            sqlx::query("UPDATE federated_identities SET is_primary = false WHERE user_id = $1")
                .bind(identity.user_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO federated_identities (federated_identity_id, user_id, provider, external_id, is_primary, created_utc)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(identity.federated_identity_id)
        .bind(identity.user_id)
        .bind(&identity.provider)
        .bind(&identity.external_id)
        .bind(identity.is_primary)
        .bind(identity.created_utc)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_federated_identity(&self, federated_identity_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM federated_identities WHERE federated_identity_id = $1")
            .bind(federated_identity_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
