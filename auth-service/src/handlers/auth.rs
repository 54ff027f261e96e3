//! Authentication endpoints: registration, credential login, the MFA
//! step-up, refresh rotation and logout.

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap},
    Json,
};
use service_core::error::AppError;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::middleware::{auth::AuthUser, tenant::TenantContext};
use crate::models::{
    AuditEventType, AuditResult, AuditSeverity, AuthResponse, AuditEvent, Credential, LoginRequest,
    RegisterUserRequest, TokenResponse, User, UserResponse,
};
use crate::services::{is_permitted, TokenGrant};
use crate::utils::{hash_password, verify_password, Password, ValidatedJson};
use crate::AppState;

/// Request metadata captured for audit trails; never trusted for access
/// decisions beyond rate-limit bucketing.
struct RequestContext {
    ip_address: Option<String>,
    user_agent: Option<String>,
}

fn request_context(headers: &HeaderMap, addr: &SocketAddr) -> RequestContext {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    RequestContext { ip_address: Some(ip_address), user_agent }
}

fn password_satisfies_policy(password: &str, policy: &crate::config::PasswordPolicyConfig) -> bool {
    if password.chars().count() < policy.min_length {
        return false;
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        return false;
    }
    if policy.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
        return false;
    }
    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    if policy.require_symbol && !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        return false;
    }
    true
}

/// Resolve the full grant (roles, permissions, amr) for an authenticated
/// user and mint an access/refresh token pair. Does not persist a refresh
/// session - callers decide whether the session starts a new chain
/// (`new_root`) or continues one (`rotate_from`).
async fn mint_tokens(state: &AppState, user: &User, amr: &[String]) -> Result<(TokenResponse, String), AppError> {
    let (roles, permissions, system_roles, system_permissions) = if user.is_system_principal() {
        let system_roles = state.db.get_user_system_role_labels(user.user_id).await?;
        let system_permissions = state.db.get_user_system_permission_keys(user.user_id).await?;
        (vec![], vec![], system_roles, system_permissions)
    } else {
        let roles = state.db.get_user_role_labels(user.user_id).await?;
        let permissions = state.db.get_user_permission_keys(user.user_id).await?;
        (roles, permissions, vec![], vec![])
    };

    let grant = TokenGrant {
        user_id: user.user_id,
        tenant_id: user.tenant_id,
        principal_type: &user.principal_type,
        email: user.email.clone(),
        username: user.username.clone(),
        roles,
        permissions,
        system_roles,
        system_permissions,
        amr: amr.to_vec(),
    };

    let (access_token, refresh_token) = state.jwt.generate_token_pair(&grant).map_err(AppError::Internal)?;
    let token_hash = crate::services::JwtService::hash_refresh_token(&refresh_token);
    let response = TokenResponse::new(access_token, refresh_token, state.jwt.access_token_expiry_seconds());
    Ok((response, token_hash))
}

/// Mint tokens and start a fresh refresh session chain. `remember_me`
/// doubles the refresh session's lifetime, capped at the configured
/// remember-me ceiling.
async fn issue_tokens(state: &AppState, user: &User, amr: Vec<String>, remember_me: bool) -> Result<TokenResponse, AppError> {
    let (tokens, token_hash) = mint_tokens(state, user, &amr).await?;

    let session = crate::models::RefreshSession::new_root(
        user.user_id,
        token_hash,
        amr.iter().any(|f| f == "totp"),
        remember_me,
        state.jwt.refresh_token_expiry_days_for(remember_me),
    );
    state.db.insert_refresh_session(&session).await?;

    Ok(tokens)
}

/// `POST /tenants/users` - an authenticated tenant admin creates a user
/// directly within their tenant. Self-service signup happens only through
/// invitation acceptance (see `handlers::invitation`), since tenant
/// membership is never inferred from an unauthenticated request.
pub async fn register(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    TenantContext { tenant_id }: TenantContext,
    ValidatedJson(req): ValidatedJson<RegisterUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if !is_permitted(&claims.permissions, "user:create") {
        return Err(AppError::PermissionDenied);
    }

    if !password_satisfies_policy(&req.password, &state.config.password) {
        return Err(AppError::InvalidRequest("password does not satisfy policy".to_string()));
    }

    if state.db.find_user_by_username_in_tenant(tenant_id, &req.username).await?.is_some() {
        return Err(AppError::InvalidRequest("username already in use".to_string()));
    }

    let user = User::new_tenant_user(tenant_id, req.username, req.email, req.display_name);
    state.db.insert_user(&user).await?;

    let password_hash = hash_password(&Password::new(req.password)).map_err(AppError::Internal)?.into_string();
    state.db.insert_credential(&Credential::new(user.user_id, password_hash)).await?;

    state
        .audit
        .record(AuditEvent::new(
            Some(tenant_id),
            Some(user.user_id),
            AuditEventType::UserRegistered,
            AuditResult::Success,
            AuditSeverity::Info,
            Some("user".to_string()),
            Some(user.user_id),
            None,
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(UserResponse::from(user)))
}

/// `POST /auth/login` - credential verification plus, when MFA is enrolled,
/// issuance of an intermediate MFA challenge instead of tokens.
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ctx = request_context(&headers, &addr);

    let tenant_slug = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::TenantRequired)?;

    let tenant = state
        .db
        .find_tenant_by_slug(tenant_slug)
        .await?
        .ok_or(AppError::AuthenticationFailed)?;

    if !tenant.is_active() {
        return Err(AppError::AuthenticationFailed);
    }

    let user = state
        .db
        .find_user_by_username_in_tenant(tenant.tenant_id, &req.username)
        .await?
        .ok_or(AppError::AuthenticationFailed)?;

    if !user.is_active() || user.is_locked() {
        return Err(AppError::AuthenticationFailed);
    }

    let credential = state.db.find_credential(user.user_id).await?.ok_or(AppError::AuthenticationFailed)?;
    if !credential.is_active() {
        return Err(AppError::AuthenticationFailed);
    }

    let password = Password::new(req.password.clone());
    let hash = crate::utils::PasswordHashString::new(credential.password_hash.clone());
    if verify_password(&password, &hash).is_err() {
        state
            .db
            .record_login_failure(user.user_id, state.config.lockout.threshold as i32, state.config.lockout.duration_minutes)
            .await?;
        state
            .audit
            .record(AuditEvent::new(
                user.tenant_id,
                Some(user.user_id),
                AuditEventType::UserLoginFailed,
                AuditResult::Failure,
                AuditSeverity::Warning,
                Some("user".to_string()),
                Some(user.user_id),
                None,
                None,
                ctx.ip_address.clone(),
                ctx.user_agent.clone(),
            ))
            .await?;
        return Err(AppError::AuthenticationFailed);
    }

    state.db.reset_login_failures(user.user_id).await?;

    // MFA is required when the tenant has switched the `mfa` feature on
    // tenant-wide, or the principal is individually enrolled.
    let tenant_mandates_mfa = state.capability.resolve(tenant.tenant_id, user.user_id, "mfa").await?.tenant_enabled;

    if tenant_mandates_mfa && !credential.has_mfa() {
        return Err(AppError::MfaRequired);
    }

    if credential.has_mfa() {
        let mfa_token = state
            .redis
            .create_mfa_session(user.user_id, &["pwd".to_string()], req.remember_me)
            .await
            .map_err(AppError::Internal)?;
        return Ok(Json(AuthResponse::MfaRequired { mfa_token, methods: vec!["totp".to_string()] }));
    }

    let tokens = issue_tokens(&state, &user, vec!["pwd".to_string()], req.remember_me).await?;

    state
        .audit
        .record(AuditEvent::new(
            user.tenant_id,
            Some(user.user_id),
            AuditEventType::UserLogin,
            AuditResult::Success,
            AuditSeverity::Info,
            Some("user".to_string()),
            Some(user.user_id),
            None,
            None,
            ctx.ip_address,
            ctx.user_agent,
        ))
        .await?;

    Ok(Json(AuthResponse::Tokens(tokens)))
}

#[derive(Debug, serde::Deserialize)]
pub struct VerifyMfaRequest {
    pub mfa_token: String,
    pub code: String,
}

/// `POST /auth/mfa/verify` - redeem an MFA challenge session with a TOTP code
/// or a recovery code, completing login.
pub async fn verify_mfa(
    State(state): State<AppState>,
    Json(req): Json<VerifyMfaRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let (user_id, mut amr, remember_me) = state
        .redis
        .consume_mfa_session(&req.mfa_token)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::MfaInvalid)?;

    let user = state.db.find_user_by_id(user_id).await?.ok_or(AppError::AuthenticationFailed)?;
    let credential = state.db.find_credential(user_id).await?.ok_or(AppError::AuthenticationFailed)?;
    let secret_sealed = credential.mfa_secret_sealed.as_deref().ok_or(AppError::MfaInvalid)?;

    let code_ok = state.totp.verify_code(secret_sealed, &req.code)?;
    if code_ok {
        amr.push("totp".to_string());
        let tokens = issue_tokens(&state, &user, amr, remember_me).await?;
        return Ok(Json(tokens));
    }

    if let Some(recovery_sealed) = credential.mfa_recovery_codes_sealed.as_deref() {
        let (matched, remaining_sealed) = state.totp.verify_and_consume_recovery_code(recovery_sealed, &req.code)?;
        if matched {
            state.db.update_credential_mfa(user_id, Some(secret_sealed), Some(&remaining_sealed)).await?;
            amr.push("recovery_code".to_string());
            let tokens = issue_tokens(&state, &user, amr, remember_me).await?;
            return Ok(Json(tokens));
        }
    }

    Err(AppError::MfaInvalid)
}

#[derive(Debug, serde::Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /auth/refresh` - rotate a refresh session. Presenting a token that
/// has already been rotated or revoked is treated as a reuse signal: the
/// entire session chain for the user is revoked and every outstanding access
/// token for that user becomes unverifiable once it expires naturally (access
/// tokens are not individually tracked unless explicitly revoked).
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token_hash = crate::services::JwtService::hash_refresh_token(&req.refresh_token);
    let session = state
        .db
        .find_refresh_session_by_hash(&token_hash)
        .await?
        .ok_or(AppError::Unauthorized("invalid refresh token".to_string()))?;

    if session.is_revoked() || session.is_rotated() {
        state.db.revoke_all_user_sessions(session.user_id).await?;
        state
            .audit
            .record(AuditEvent::new(
                None,
                Some(session.user_id),
                AuditEventType::TokenReused,
                AuditResult::Failure,
                AuditSeverity::Critical,
                Some("refresh_session".to_string()),
                Some(session.session_id),
                None,
                None,
                None,
                None,
            ))
            .await?;
        return Err(AppError::Unauthorized("refresh token reuse detected".to_string()));
    }

    if session.is_expired() {
        return Err(AppError::Unauthorized("refresh token expired".to_string()));
    }

    let user = state.db.find_user_by_id(session.user_id).await?.ok_or(AppError::AuthenticationFailed)?;
    if !user.is_active() {
        return Err(AppError::AuthenticationFailed);
    }

    let amr = if session.mfa_verified { vec!["pwd".to_string(), "totp".to_string()] } else { vec!["pwd".to_string()] };
    let (tokens, new_hash) = mint_tokens(&state, &user, &amr).await?;

    let new_session = crate::models::RefreshSession::rotate_from(
        &session,
        new_hash,
        state.jwt.refresh_token_expiry_days_for(session.remember_me),
    );
    state.db.insert_refresh_session(&new_session).await?;
    state.db.mark_session_rotated(session.session_id).await?;

    state
        .audit
        .record(AuditEvent::new(
            user.tenant_id,
            Some(user.user_id),
            AuditEventType::TokenRefreshed,
            AuditResult::Success,
            AuditSeverity::Info,
            Some("refresh_session".to_string()),
            Some(new_session.session_id),
            None,
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(tokens))
}

/// `POST /auth/logout` - revoke the caller's current access token (by
/// blacklisting its jti until natural expiry) and, when a refresh token is
/// supplied, its refresh session.
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ttl = (claims.exp - chrono::Utc::now().timestamp()).max(1);
    state.redis.blacklist_token(&claims.jti, ttl).await.map_err(AppError::Internal)?;

    if let Some(Json(req)) = body {
        let token_hash = crate::services::JwtService::hash_refresh_token(&req.refresh_token);
        if let Some(session) = state.db.find_refresh_session_by_hash(&token_hash).await? {
            state.db.revoke_refresh_session(session.session_id).await?;
        }
    }

    let user_id = claims.sub.parse::<Uuid>().ok();
    let tenant_id = claims.tenant_id.as_deref().and_then(|s| s.parse::<Uuid>().ok());
    state
        .audit
        .record(AuditEvent::new(
            tenant_id,
            user_id,
            AuditEventType::UserLogout,
            AuditResult::Success,
            AuditSeverity::Info,
            Some("user".to_string()),
            user_id,
            None,
            None,
            None,
            None,
        ))
        .await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
