//! Category-aware rate limiting, keyed by client IP and, once authenticated,
//! by principal. Limits and windows come from `RateLimitConfig`; the actual
//! counters live in Redis so they hold across replicas.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::{config::RateLimitCategory, services::AccessTokenClaims, AppState};

/// Paths that never count against a quota - they're polled far more often
/// than any human or client action and carry no abuse surface of their own.
fn is_exempt(path: &str) -> bool {
    matches!(path, "/health" | "/ready" | "/.well-known/jwks.json")
}

fn classify(path: &str) -> &'static str {
    if path.starts_with("/auth/login") || path.starts_with("/auth/refresh") || path.starts_with("/auth/register") {
        "auth"
    } else if path.contains("/mfa/") {
        "sensitive"
    } else if path.starts_with("/tenants") || path.starts_with("/roles") || path.starts_with("/audit") {
        "admin"
    } else {
        "general"
    }
}

fn category_limits<'a>(config: &'a crate::config::RateLimitConfig, category: &str) -> &'a RateLimitCategory {
    match category {
        "auth" => &config.auth,
        "sensitive" => &config.sensitive,
        "admin" => &config.admin,
        _ => &config.general,
    }
}

fn client_ip(req: &Request) -> Option<String> {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip().to_string()))
}

struct LimitOutcome {
    allowed: bool,
    limit: u32,
    remaining: u32,
}

async fn check(state: &AppState, category: &str, scope: &str, key: &str, limit: u32, window_seconds: i64) -> Result<LimitOutcome, AppError> {
    let (allowed, count) = state
        .redis
        .check_rate_limit(&format!("{category}:{scope}"), key, limit, window_seconds)
        .await
        .map_err(AppError::Internal)?;
    Ok(LimitOutcome { allowed, limit, remaining: limit.saturating_sub(count) })
}

fn apply_headers(response: &mut Response, outcome: &LimitOutcome, window_seconds: i64) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(outcome.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(outcome.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(window_seconds.max(0) as u64));
}

/// Checks the caller's IP against the category's IP ceiling, then - once
/// `auth_middleware` has run and a principal is known - the per-user
/// ceiling. Either one tripping yields `429` with `Retry-After` and
/// `X-RateLimit-*` headers; the most restrictive check's numbers win.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, AppError> {
    let path = req.uri().path().to_string();
    if is_exempt(&path) {
        return Ok(next.run(req).await);
    }

    let category = classify(&path);
    let limits = category_limits(&state.config.rate_limit, category);
    let window_seconds = state.config.rate_limit.window_seconds;

    let ip_outcome = match client_ip(&req) {
        Some(ip) => Some(check(&state, category, "ip", &ip, limits.ip_rpm, window_seconds).await?),
        None => {
            tracing::warn!("could not determine client ip for rate limiting");
            None
        }
    };

    if let Some(outcome) = &ip_outcome {
        if !outcome.allowed {
            let mut response = AppError::RateLimitExceeded { retry_after_secs: window_seconds.max(0) as u64 }.into_response();
            apply_headers(&mut response, outcome, window_seconds);
            return Ok(response);
        }
    }

    let user_outcome = match req.extensions().get::<AccessTokenClaims>() {
        Some(claims) => Some(check(&state, category, "user", &claims.sub, limits.user_rpm, window_seconds).await?),
        None => None,
    };

    if let Some(outcome) = &user_outcome {
        if !outcome.allowed {
            let mut response = AppError::RateLimitExceeded { retry_after_secs: window_seconds.max(0) as u64 }.into_response();
            apply_headers(&mut response, outcome, window_seconds);
            return Ok(response);
        }
    }

    let mut response = next.run(req).await;
    if let Some(outcome) = user_outcome.as_ref().or(ip_outcome.as_ref()) {
        apply_headers(&mut response, outcome, window_seconds);
    }
    Ok(response)
}
