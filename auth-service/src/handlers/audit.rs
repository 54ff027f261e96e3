//! Read-only access to the audit trail. Listing is scoped to the caller's
//! tenant unless the caller is a system principal.

use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::middleware::auth::AuthUser;
use crate::models::{AuditEventResponse, AuditQueryParams};
use crate::services::is_permitted;
use crate::AppState;

/// `GET /audit/events`
pub async fn list(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(mut params): Query<AuditQueryParams>,
) -> Result<Json<Vec<AuditEventResponse>>, AppError> {
    if !is_permitted(&claims.permissions, "audit:read") {
        return Err(AppError::PermissionDenied);
    }

    // Tenant principals can only ever see their own tenant's trail, no
    // matter what tenant_id they pass.
    if claims.principal_type != "system" {
        let tenant_id = claims
            .tenant_id
            .as_deref()
            .ok_or(AppError::TenantRequired)?
            .parse()
            .map_err(|_| AppError::TenantRequired)?;
        params.tenant_id = Some(tenant_id);
    }
    if params.limit.map(|l| l > 500).unwrap_or(false) {
        params.limit = Some(500);
    }

    let events = state.db.find_audit_events(&params).await?;
    Ok(Json(events.into_iter().map(AuditEventResponse::from).collect()))
}
