use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};
use service_core::error::AppError;

use crate::{
    services::{AccessTokenClaims, TokenBlacklist},
    AppState,
};

/// Requires a valid, non-revoked access token. On success, inserts the
/// decoded `AccessTokenClaims` into request extensions for downstream
/// extractors and middleware (`TenantContext`, `AuthUser`).
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    let claims = state
        .jwt
        .validate_access_token(token)
        .map_err(|_| AppError::Unauthorized("invalid or expired token".to_string()))?;

    if state.redis.is_blacklisted(&claims.jti).await.unwrap_or(true) {
        return Err(AppError::Unauthorized("token has been revoked".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Extractor to pull the authenticated principal's claims in a handler.
pub struct AuthUser(pub AccessTokenClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<AccessTokenClaims>()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("auth claims missing from request extensions")))?;

        Ok(AuthUser(claims.clone()))
    }
}
