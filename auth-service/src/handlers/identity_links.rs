//! Federated identity linking: binds an external IdP subject
//! `(provider, external_id)` to the caller's own account. Run against an
//! already-authenticated session, mirroring MFA enrollment.

use axum::{extract::{Path, State}, Json};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::auth::AuthUser;
use crate::models::{
    AuditEvent, AuditEventType, AuditResult, AuditSeverity, FederatedIdentity,
    FederatedIdentityResponse, LinkIdentityRequest, UnlinkIdentityRequest,
};
use crate::AppState;

/// `POST /auth/identities` - link a federated subject to the caller. The
/// first link for an account becomes primary; later links are explicitly
/// opted in via a separate "make primary" action (not yet exposed) and
/// default to non-primary.
pub async fn link(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<LinkIdentityRequest>,
) -> Result<Json<FederatedIdentityResponse>, AppError> {
    let user_id: Uuid = claims.sub.parse().map_err(|_| AppError::Unauthorized("malformed subject".to_string()))?;

    if state.db.find_federated_identity_by_subject(&req.provider, &req.external_id).await?.is_some() {
        return Err(AppError::InvalidRequest("identity already linked to an account".to_string()));
    }

    let existing = state.db.find_federated_identities_for_user(user_id).await?;
    let identity = FederatedIdentity::new(user_id, req.provider, req.external_id, existing.is_empty());
    state.db.insert_federated_identity(&identity).await?;

    let user = state.db.find_user_by_id(user_id).await?.ok_or(AppError::AuthenticationFailed)?;
    state
        .audit
        .record(AuditEvent::new(
            user.tenant_id,
            Some(user_id),
            AuditEventType::IdentityLinked,
            AuditResult::Success,
            AuditSeverity::Warning,
            Some("federated_identity".to_string()),
            Some(identity.federated_identity_id),
            None,
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(FederatedIdentityResponse::from(identity)))
}

/// `DELETE /auth/identities/:identity_id` - unlink a federated subject from
/// the caller's account. Requires a reason, carried into the audit record.
pub async fn unlink(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(identity_id): Path<Uuid>,
    Json(req): Json<UnlinkIdentityRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id: Uuid = claims.sub.parse().map_err(|_| AppError::Unauthorized("malformed subject".to_string()))?;
    if req.reason.trim().is_empty() {
        return Err(AppError::AuditReasonRequired);
    }

    let identity = state
        .db
        .find_federated_identity_by_id(identity_id)
        .await?
        .ok_or(AppError::ResourceNotFound("federated_identity".to_string()))?;
    if identity.user_id != user_id {
        return Err(AppError::PermissionDenied);
    }

    state.db.delete_federated_identity(identity_id).await?;

    let user = state.db.find_user_by_id(user_id).await?.ok_or(AppError::AuthenticationFailed)?;
    state
        .audit
        .record(AuditEvent::new(
            user.tenant_id,
            Some(user_id),
            AuditEventType::IdentityUnlinked,
            AuditResult::Success,
            AuditSeverity::Warning,
            Some("federated_identity".to_string()),
            Some(identity_id),
            Some(req.reason),
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
