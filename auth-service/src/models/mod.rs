//! Data models for auth-service.
//!
//! PostgreSQL-backed models implementing:
//! - A single principal table spanning tenant users and system principals
//! - Credential storage (password hash plus sealed MFA material)
//! - Tenant-scoped and system-wide RBAC (roles, permissions, wildcard keys)
//! - A three-layer capability chain (system catalog, tenant entitlement, user state)
//! - Rotation-chained refresh sessions
//! - Append-only audit events with result and severity
//! - Webhook subscriptions and their delivery attempts

pub mod audit_event;
pub mod capability;
pub mod credential;
pub mod identity_link;
pub mod invitation;
pub mod refresh_session;
pub mod role;
pub mod tenant;
pub mod user;
pub mod webhook;

pub use audit_event::{
    AuditEvent, AuditEventResponse, AuditEventType, AuditQueryParams, AuditResult, AuditSeverity,
};
pub use capability::{
    CapabilityResolution, SetTenantCapabilityRequest, SetUserCapabilityRequest, SystemCapability,
    TenantCapability, TenantFeatureEnablement, UserCapabilityState,
};
pub use credential::{Credential, CredentialState, MfaEnrollResponse};
pub use identity_link::{FederatedIdentity, FederatedIdentityResponse, LinkIdentityRequest, UnlinkIdentityRequest};
pub use invitation::{
    AcceptInvitationRequest, CreateInvitationRequest, Invitation, InvitationResponse,
    InvitationState,
};
pub use refresh_session::{RefreshSession, SessionInfo};
pub use role::{
    AssignPermissionRequest, CreateRoleRequest, Permission, Role, RolePermission, RoleResponse,
    RoleWithPermissions, SystemRole, SystemRolePermission, UserRole, UserSystemRole,
};
pub use tenant::{CreateTenantRequest, Tenant, TenantResponse, TenantState};
pub use user::{
    AuthResponse, LoginRequest, PrincipalType, RegisterUserRequest, TokenResponse, User,
    UserResponse, UserState,
};
pub use webhook::{
    CreateWebhookRequest, DeliveryState, WebhookDelivery, WebhookResponse, WebhookSubscription,
    MAX_DELIVERY_ATTEMPTS, RETRY_SCHEDULE_SECS,
};
