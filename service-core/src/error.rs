//! Error taxonomy shared by every handler and service in the workspace.
//!
//! Every variant carries its own machine-readable `code` (the error
//! taxonomy from the specification) and maps to exactly one HTTP status.
//! Handlers should prefer constructing the most specific variant; avoid
//! `Internal` unless the failure truly has no caller-actionable meaning.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Opaque cover for credential mismatch, lockout, inactive principal,
    /// suspended tenant. Never reveals which of these applies.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("mfa required")]
    MfaRequired,

    #[error("mfa invalid")]
    MfaInvalid,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("forbidden")]
    Forbidden,

    #[error("tenant required")]
    TenantRequired,

    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("tenant inactive")]
    TenantInactive,

    #[error("tenant not found")]
    TenantNotFound,

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("secret already retrieved")]
    SecretAlreadyRetrieved,

    #[error("last owner protected")]
    LastOwnerProtected,

    #[error("permission namespace violation")]
    PermissionNamespaceViolation,

    #[error("audit reason required")]
    AuditReasonRequired,

    #[error("feature not enabled")]
    FeatureNotEnabled,

    #[error("invitation consumed")]
    InvitationConsumed,

    #[error("validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("cache error")]
    Redis(#[from] redis::RedisError),

    #[error("token error")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// The taxonomy code from the specification's error design.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationFailed => "authentication_failed",
            AppError::MfaRequired => "mfa_required",
            AppError::MfaInvalid => "mfa_invalid",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::PermissionDenied => "permission_denied",
            AppError::Forbidden => "forbidden",
            AppError::TenantRequired => "tenant_required",
            AppError::TenantMismatch => "tenant_mismatch",
            AppError::TenantInactive => "tenant_inactive",
            AppError::TenantNotFound => "tenant_not_found",
            AppError::ResourceNotFound(_) => "resource_not_found",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            AppError::SecretAlreadyRetrieved => "secret_already_retrieved",
            AppError::LastOwnerProtected => "last_owner_protected",
            AppError::PermissionNamespaceViolation => "permission_namespace_violation",
            AppError::AuditReasonRequired => "audit_reason_required",
            AppError::FeatureNotEnabled => "feature_not_enabled",
            AppError::InvitationConsumed => "invitation_consumed",
            AppError::ValidationError(_) => "invalid_request",
            AppError::Database(_) => "internal_server_error",
            AppError::Redis(_) => "internal_server_error",
            AppError::Token(_) => "unauthorized",
            AppError::Internal(_) => "internal_server_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationFailed
            | AppError::MfaRequired
            | AppError::MfaInvalid
            | AppError::Unauthorized(_)
            | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied
            | AppError::Forbidden
            | AppError::TenantMismatch
            | AppError::TenantInactive
            | AppError::FeatureNotEnabled => StatusCode::FORBIDDEN,
            AppError::TenantRequired | AppError::InvalidRequest(_) | AppError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::TenantNotFound | AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AuditReasonRequired
            | AppError::LastOwnerProtected
            | AppError::PermissionNamespaceViolation
            | AppError::InvitationConsumed => StatusCode::CONFLICT,
            AppError::SecretAlreadyRetrieved => StatusCode::GONE,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_)
        ) {
            tracing::error!(error = %self, "internal error surfaced to client");
        }

        let status = self.status();
        let code = self.code();
        let retry_after = match &self {
            AppError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let message = match &self {
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut res = (status, Json(ErrorBody { error: code, message, details: None })).into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}
