//! Principal model - the authenticatable actor: a tenant user or a system principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    Active,
    Suspended,
    Locked,
    Deactivated,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::Active => "active",
            UserState::Suspended => "suspended",
            UserState::Locked => "locked",
            UserState::Deactivated => "deactivated",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "suspended" => UserState::Suspended,
            "locked" => UserState::Locked,
            "deactivated" => UserState::Deactivated,
            _ => UserState::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    User,
    System,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "user",
            PrincipalType::System => "system",
        }
    }
}

/// A principal: tenant-scoped user (tenant_id set) or system principal (tenant_id null).
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub principal_type: String,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub user_state_code: String,
    pub mfa_enrolled: bool,
    pub failed_login_count: i32,
    pub locked_until_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    pub fn new_tenant_user(tenant_id: Uuid, username: String, email: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            tenant_id: Some(tenant_id),
            principal_type: PrincipalType::User.as_str().to_string(),
            username,
            email,
            email_verified: false,
            display_name,
            user_state_code: UserState::Active.as_str().to_string(),
            mfa_enrolled: false,
            failed_login_count: 0,
            locked_until_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// A tenant-less principal, e.g. the bootstrap master admin. Carries
    /// system roles rather than tenant roles.
    pub fn new_system_user(username: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            tenant_id: None,
            principal_type: PrincipalType::System.as_str().to_string(),
            username,
            email,
            email_verified: true,
            display_name: None,
            user_state_code: UserState::Active.as_str().to_string(),
            mfa_enrolled: false,
            failed_login_count: 0,
            locked_until_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.user_state_code == UserState::Active.as_str()
    }

    pub fn is_system_principal(&self) -> bool {
        self.tenant_id.is_none()
    }

    pub fn is_locked(&self) -> bool {
        self.user_state_code == UserState::Locked.as_str()
            || self.locked_until_utc.map(|t| t > Utc::now()).unwrap_or(false)
    }

    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

#[derive(Debug, Deserialize, ToSchema, validator::Validate)]
pub struct RegisterUserRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 12))]
    pub password: String,
    pub display_name: Option<String>,
}

/// Tenant is never carried in the body: a tenant principal's tenant comes
/// from the `X-Tenant-ID` header on this unauthenticated call (post-login,
/// it comes from the token claim instead).
#[derive(Debug, Deserialize, ToSchema, validator::Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub principal_type: String,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub user_state_code: String,
    pub mfa_enrolled: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            tenant_id: u.tenant_id,
            principal_type: u.principal_type,
            username: u.username,
            email: u.email,
            email_verified: u.email_verified,
            display_name: u.display_name,
            user_state_code: u.user_state_code,
            mfa_enrolled: u.mfa_enrolled,
            created_utc: u.created_utc,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl TokenResponse {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            token_type: "Bearer".to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum AuthResponse {
    Tokens(TokenResponse),
    MfaRequired { mfa_token: String, methods: Vec<String> },
}
