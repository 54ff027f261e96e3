//! Headless multi-tenant identity and access management service.
//!
//! Provides tenant-scoped authentication, RBAC, a three-layer capability
//! model, MFA, invitations, audit logging and webhook delivery over HTTP.

pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::AuthConfig;
use crate::handlers::{audit, auth, capabilities, identity_links, invitations, jwks, mfa, roles, tenants, users, webhooks};
use crate::middleware::{auth_middleware, rate_limit_middleware, tenant_context_middleware};
use crate::services::{AuditService, CapabilityService, Database, EmailProvider, JwtService, TokenBlacklist, TotpService, WebhookDispatcher};
use service_core::error::AppError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub db: Database,
    pub email: Arc<dyn EmailProvider>,
    pub jwt: JwtService,
    pub redis: Arc<dyn TokenBlacklist>,
    pub totp: TotpService,
    pub capability: CapabilityService,
    pub audit: AuditService,
    pub webhooks: Arc<WebhookDispatcher>,
}

/// Build the application router.
///
/// Routes split into a public group (no bearer token required) and a
/// protected group wrapped in `auth_middleware`, which populates the
/// `AccessTokenClaims` extension that `AuthUser`/`TenantContext` read.
pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/.well-known/jwks.json", get(jwks::get))
        .route("/auth/login", post(auth::login))
        .route("/auth/mfa/verify", post(auth::verify_mfa))
        .route("/auth/refresh", post(auth::refresh))
        .route("/tenants/:tenant_id", get(tenants::get))
        .route("/invitations/:token/accept", post(invitations::accept))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    let protected_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/mfa/enroll", post(mfa::enroll))
        .route("/auth/identities", post(identity_links::link))
        .route("/auth/identities/:identity_id", delete(identity_links::unlink))
        .route("/tenants", post(tenants::create))
        .route("/tenants/:tenant_id/suspend", post(tenants::suspend))
        .route("/tenants/:tenant_id/reactivate", post(tenants::reactivate))
        .route("/tenants/:tenant_id/roles", post(roles::create))
        .route("/tenants/:tenant_id/roles", get(roles::list))
        .route("/tenants/:tenant_id/invitations", post(invitations::create))
        .route("/tenants/:tenant_id/webhooks", post(webhooks::create))
        .route("/tenants/:tenant_id/webhooks", get(webhooks::list))
        .route("/tenants/:tenant_id/capabilities/:capability_key", get(capabilities::resolve_for_caller))
        .route("/tenants/:tenant_id/capabilities/:capability_key", put(capabilities::set_tenant_capability))
        .route("/tenants/:tenant_id/capabilities/:capability_key/user", put(capabilities::set_user_capability))
        .route("/tenants/users/:user_id/roles", post(roles::assign_role))
        .route("/tenants/users/:user_id/roles/:role_id", delete(roles::revoke_role))
        .route("/tenants/users/:user_id/mfa/reset", post(mfa::reset))
        .route("/tenants/users/:user_id/suspend", post(users::suspend))
        .route("/tenants/users/:user_id/activate", post(users::activate))
        .route("/roles/:role_id", get(roles::get))
        .route("/roles/:role_id/permissions", post(roles::assign_permission))
        .route("/audit/events", get(audit::list))
        .route_layer(from_fn(tenant_context_middleware))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(CorsLayer::permissive());

    Ok(app)
}

/// Liveness probe.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await?;
    state.redis.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::Internal(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "checks": {
            "postgresql": "up",
            "redis": "up"
        }
    })))
}

/// Readiness probe - distinguishes "process is up" from "can serve traffic".
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, (axum::http::StatusCode, String)> {
    if let Err(e) = state.db.health_check().await {
        return Err((axum::http::StatusCode::SERVICE_UNAVAILABLE, format!("PostgreSQL not ready: {e}")));
    }
    if let Err(e) = state.redis.health_check().await {
        return Err((axum::http::StatusCode::SERVICE_UNAVAILABLE, format!("Redis not ready: {e}")));
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "service": state.config.service_name,
        "checks": {
            "postgresql": "up",
            "redis": "up"
        }
    })))
}
