//! Audit event model - append-only security and compliance log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    UserRegistered,
    UserLogin,
    UserLoginFailed,
    UserLogout,
    UserPasswordChanged,
    UserEmailVerified,
    UserSuspended,
    UserReactivated,
    UserDeactivated,
    UserMfaEnrolled,
    UserMfaReset,
    TokenIssued,
    TokenRefreshed,
    TokenReused,
    TokenRevoked,
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    PermissionAssigned,
    PermissionRevoked,
    CapabilityChanged,
    InvitationCreated,
    InvitationAccepted,
    InvitationRevoked,
    WebhookSubscribed,
    WebhookDeliveryFailed,
    AuthzDenied,
    IdentityLinked,
    IdentityUnlinked,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::UserRegistered => "user_registered",
            AuditEventType::UserLogin => "user_login",
            AuditEventType::UserLoginFailed => "user_login_failed",
            AuditEventType::UserLogout => "user_logout",
            AuditEventType::UserPasswordChanged => "user_password_changed",
            AuditEventType::UserEmailVerified => "user_email_verified",
            AuditEventType::UserSuspended => "user_suspended",
            AuditEventType::UserReactivated => "user_reactivated",
            AuditEventType::UserDeactivated => "user_deactivated",
            AuditEventType::UserMfaEnrolled => "user_mfa_enrolled",
            AuditEventType::UserMfaReset => "user_mfa_reset",
            AuditEventType::TokenIssued => "token_issued",
            AuditEventType::TokenRefreshed => "token_refreshed",
            AuditEventType::TokenReused => "token_reused",
            AuditEventType::TokenRevoked => "token_revoked",
            AuditEventType::RoleCreated => "role_created",
            AuditEventType::RoleUpdated => "role_updated",
            AuditEventType::RoleDeleted => "role_deleted",
            AuditEventType::PermissionAssigned => "permission_assigned",
            AuditEventType::PermissionRevoked => "permission_revoked",
            AuditEventType::CapabilityChanged => "capability_changed",
            AuditEventType::InvitationCreated => "invitation_created",
            AuditEventType::InvitationAccepted => "invitation_accepted",
            AuditEventType::InvitationRevoked => "invitation_revoked",
            AuditEventType::WebhookSubscribed => "webhook_subscribed",
            AuditEventType::WebhookDeliveryFailed => "webhook_delivery_failed",
            AuditEventType::AuthzDenied => "authz_denied",
            AuditEventType::IdentityLinked => "identity_linked",
            AuditEventType::IdentityUnlinked => "identity_unlinked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "info",
            AuditSeverity::Warning => "warning",
            AuditSeverity::Critical => "critical",
        }
    }

    /// `Critical` events must be durably persisted before the triggering
    /// request is allowed to return a response.
    pub fn is_security_critical(&self) -> bool {
        matches!(self, AuditSeverity::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    Success,
    Failure,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Success => "success",
            AuditResult::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub actor_user_id: Option<Uuid>,
    pub event_type_code: String,
    pub result_code: String,
    pub severity_code: String,
    pub target_type: Option<String>,
    pub target_id: Option<Uuid>,
    pub reason: Option<String>,
    pub event_data: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl AuditEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Option<Uuid>,
        actor_user_id: Option<Uuid>,
        event_type: AuditEventType,
        result: AuditResult,
        severity: AuditSeverity,
        target_type: Option<String>,
        target_id: Option<Uuid>,
        reason: Option<String>,
        event_data: Option<serde_json::Value>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            tenant_id,
            actor_user_id,
            event_type_code: event_type.as_str().to_string(),
            result_code: result.as_str().to_string(),
            severity_code: severity.as_str().to_string(),
            target_type,
            target_id,
            reason,
            event_data,
            ip_address,
            user_agent,
            created_utc: Utc::now(),
        }
    }

    pub fn is_security_critical(&self) -> bool {
        self.severity_code == AuditSeverity::Critical.as_str()
    }
}

#[derive(Debug, Serialize)]
pub struct AuditEventResponse {
    pub event_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub actor_user_id: Option<Uuid>,
    pub event_type_code: String,
    pub result_code: String,
    pub severity_code: String,
    pub target_type: Option<String>,
    pub target_id: Option<Uuid>,
    pub reason: Option<String>,
    pub event_data: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(e: AuditEvent) -> Self {
        Self {
            event_id: e.event_id,
            tenant_id: e.tenant_id,
            actor_user_id: e.actor_user_id,
            event_type_code: e.event_type_code,
            result_code: e.result_code,
            severity_code: e.severity_code,
            target_type: e.target_type,
            target_id: e.target_id,
            reason: e.reason,
            event_data: e.event_data,
            created_utc: e.created_utc,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub tenant_id: Option<Uuid>,
    pub actor_user_id: Option<Uuid>,
    pub event_type: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<Uuid>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
