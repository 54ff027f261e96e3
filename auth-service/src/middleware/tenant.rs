//! Tenant context middleware for multi-tenancy support.
//!
//! Extracts the tenant ID carried in the access token's claims (set at
//! issuance time from the user's `tenant_id`) and makes it available to
//! handlers that need to scope a query to the caller's tenant. System
//! principals carry no tenant ID; handlers that require one should use
//! `TenantContext` as an extractor rather than reading claims directly.

use service_core::{
    axum::{
        async_trait,
        extract::{FromRequestParts, Request},
        http::request::Parts,
        middleware::Next,
        response::Response,
    },
    error::AppError,
};
use uuid::Uuid;

use crate::services::AccessTokenClaims;

/// Tenant context extracted from an authenticated request.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: Uuid,
}

/// Runs after `auth_middleware`. Reads the `AccessTokenClaims` already placed
/// in request extensions and, when the token carries a tenant ID, inserts a
/// `TenantContext` so handlers can extract it directly.
pub async fn tenant_context_middleware(mut request: Request, next: Next) -> Response {
    let tenant_context = request
        .extensions()
        .get::<AccessTokenClaims>()
        .and_then(|claims| claims.tenant_id.as_deref())
        .and_then(|id| Uuid::parse_str(id).ok())
        .map(|tenant_id| TenantContext { tenant_id });

    if let Some(ctx) = tenant_context {
        request.extensions_mut().insert(ctx);
    }

    next.run(request).await
}

/// Extractor for `TenantContext`. Rejects with `AppError::TenantRequired`
/// when the caller's token carries no tenant (e.g. a system principal hitting
/// a tenant-scoped route).
#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .copied()
            .ok_or(AppError::TenantRequired)
    }
}
