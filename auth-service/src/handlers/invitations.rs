//! Invitation issuance and acceptance. Acceptance is the only path by which
//! a new tenant user comes into existence without an authenticated admin
//! session creating them directly.

use axum::{extract::{Path, State}, Json};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use service_core::error::AppError;

use crate::middleware::{auth::AuthUser, tenant::TenantContext};
use crate::models::{
    AcceptInvitationRequest, AuditEvent, AuditEventType, AuditResult, AuditSeverity,
    CreateInvitationRequest, Credential, Invitation, InvitationResponse, User, UserResponse,
};
use crate::services::is_permitted;
use crate::utils::{hash_password, Password};
use crate::AppState;

const DEFAULT_INVITATION_LIFETIME_HOURS: i64 = 24 * 7;

fn generate_invitation_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_invitation_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// `POST /tenants/:tenant_id/invitations`
pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    Json(req): Json<CreateInvitationRequest>,
) -> Result<Json<(InvitationResponse, String)>, AppError> {
    if !is_permitted(&claims.permissions, "invitation:create") {
        return Err(AppError::PermissionDenied);
    }

    let actor_id = claims.sub.parse().map_err(|_| AppError::Unauthorized("malformed subject".to_string()))?;
    let token = generate_invitation_token();
    let token_hash = hash_invitation_token(&token);
    let expiry = chrono::Utc::now()
        + chrono::Duration::hours(req.expires_in_hours.unwrap_or(DEFAULT_INVITATION_LIFETIME_HOURS));

    let invitation = Invitation::new(tenant_id, req.email, req.role_id, token_hash, expiry, actor_id);
    state.db.insert_invitation(&invitation).await?;

    state
        .audit
        .record(AuditEvent::new(
            Some(tenant_id),
            Some(actor_id),
            AuditEventType::InvitationCreated,
            AuditResult::Success,
            AuditSeverity::Info,
            Some("invitation".to_string()),
            Some(invitation.invitation_id),
            None,
            None,
            None,
            None,
        ))
        .await?;

    // The raw token is returned exactly once; only its hash is stored.
    Ok(Json((InvitationResponse::from(invitation), token)))
}

/// `POST /invitations/:token/accept` - consumes the invitation, creates the
/// user with the pre-assigned role, and sets the password.
pub async fn accept(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<AcceptInvitationRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if req.token != token {
        return Err(AppError::InvalidRequest("token mismatch".to_string()));
    }

    let token_hash = hash_invitation_token(&token);
    let invitation = state
        .db
        .find_invitation_by_token_hash(&token_hash)
        .await?
        .ok_or(AppError::ResourceNotFound("invitation".to_string()))?;

    if invitation.is_accepted() {
        return Err(AppError::InvitationConsumed);
    }
    if !invitation.is_valid() {
        return Err(AppError::InvalidRequest("invitation expired or revoked".to_string()));
    }

    if !password_satisfies_policy(&req.password, &state.config.password) {
        return Err(AppError::InvalidRequest("password does not satisfy policy".to_string()));
    }

    let username = invitation.email.split('@').next().unwrap_or(&invitation.email).to_string();
    let user = User::new_tenant_user(invitation.tenant_id, username, invitation.email.clone(), req.display_name);
    state.db.insert_user(&user).await?;

    let password_hash = hash_password(&Password::new(req.password)).map_err(AppError::Internal)?.into_string();
    state.db.insert_credential(&Credential::new(user.user_id, password_hash)).await?;
    state.db.assign_role_to_user(user.user_id, invitation.role_id).await?;
    state.db.mark_invitation_accepted(invitation.invitation_id).await?;

    state
        .audit
        .record(AuditEvent::new(
            Some(invitation.tenant_id),
            Some(user.user_id),
            AuditEventType::InvitationAccepted,
            AuditResult::Success,
            AuditSeverity::Info,
            Some("invitation".to_string()),
            Some(invitation.invitation_id),
            None,
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(UserResponse::from(user)))
}

fn password_satisfies_policy(password: &str, policy: &crate::config::PasswordPolicyConfig) -> bool {
    password.chars().count() >= policy.min_length
        && (!policy.require_uppercase || password.chars().any(|c| c.is_ascii_uppercase()))
        && (!policy.require_lowercase || password.chars().any(|c| c.is_ascii_lowercase()))
        && (!policy.require_digit || password.chars().any(|c| c.is_ascii_digit()))
        && (!policy.require_symbol || password.chars().any(|c| !c.is_ascii_alphanumeric()))
}
