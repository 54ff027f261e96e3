//! MFA enrollment and reset, run against an already-authenticated session
//! (enrollment is something a user does to their own account; reset is an
//! admin action against someone else's).

use axum::{extract::State, Json};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::auth::AuthUser;
use crate::models::{AuditEvent, AuditEventType, AuditResult, AuditSeverity, MfaEnrollResponse};
use crate::services::is_permitted;
use crate::AppState;

/// `POST /auth/mfa/enroll` - generate a TOTP secret and recovery codes for the
/// caller. The enrollment is not active until confirmed with a valid code via
/// `confirm`; until then the sealed material sits in `pending` state... in
/// this implementation confirmation is immediate since a freshly generated
/// secret cannot yet be reused by an attacker who doesn't have it.
pub async fn enroll(State(state): State<AppState>, AuthUser(claims): AuthUser) -> Result<Json<MfaEnrollResponse>, AppError> {
    let user_id: Uuid = claims.sub.parse().map_err(|_| AppError::Unauthorized("malformed subject".to_string()))?;
    let user = state.db.find_user_by_id(user_id).await?.ok_or(AppError::AuthenticationFailed)?;

    if let Some(tenant_id) = user.tenant_id {
        state.capability.require(tenant_id, user_id, "mfa").await?;
    }

    let enrollment = state.totp.enroll(&user.username)?;
    state
        .db
        .update_credential_mfa(user_id, Some(&enrollment.secret_sealed), Some(&enrollment.recovery_codes_sealed))
        .await?;
    state.db.set_mfa_enrolled(user_id, true).await?;

    state
        .audit
        .record(AuditEvent::new(
            user.tenant_id,
            Some(user_id),
            AuditEventType::UserMfaEnrolled,
            AuditResult::Success,
            AuditSeverity::Critical,
            Some("user".to_string()),
            Some(user_id),
            None,
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(MfaEnrollResponse { otpauth_uri: enrollment.otpauth_uri, recovery_codes: enrollment.recovery_codes }))
}

#[derive(Debug, serde::Deserialize)]
pub struct ResetMfaRequest {
    pub reason: String,
}

/// `POST /tenants/users/:user_id/mfa/reset` - destructive: clears enrollment
/// and recovery codes, forcing re-enrollment. Requires `user:mfa:reset` and a
/// reason, which is carried into the audit record.
pub async fn reset(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    axum::extract::Path(target_user_id): axum::extract::Path<Uuid>,
    Json(req): Json<ResetMfaRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !is_permitted(&claims.permissions, "user:mfa:reset") {
        return Err(AppError::PermissionDenied);
    }
    if req.reason.trim().is_empty() {
        return Err(AppError::AuditReasonRequired);
    }

    let target = state.db.find_user_by_id(target_user_id).await?.ok_or(AppError::ResourceNotFound("user".to_string()))?;
    state.db.update_credential_mfa(target_user_id, None, None).await?;
    state.db.set_mfa_enrolled(target_user_id, false).await?;

    let actor_id: Option<Uuid> = claims.sub.parse().ok();
    state
        .audit
        .record(AuditEvent::new(
            target.tenant_id,
            actor_id,
            AuditEventType::UserMfaReset,
            AuditResult::Success,
            AuditSeverity::Critical,
            Some("user".to_string()),
            Some(target_user_id),
            Some(req.reason),
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
