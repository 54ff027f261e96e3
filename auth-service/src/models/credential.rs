//! Credential model - password hash plus optional sealed MFA material for a principal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    Active,
    Disabled,
}

impl CredentialState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialState::Active => "active",
            CredentialState::Disabled => "disabled",
        }
    }
}

/// Credential entity: one row per principal. `mfa_secret_sealed` holds an
/// AES-GCM sealed TOTP shared secret; `mfa_recovery_codes_sealed` holds a
/// sealed JSON array of single-use recovery code hashes.
#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    pub user_id: Uuid,
    pub password_hash: String,
    pub password_updated_utc: DateTime<Utc>,
    pub mfa_secret_sealed: Option<Vec<u8>>,
    pub mfa_recovery_codes_sealed: Option<Vec<u8>>,
    pub state_code: String,
    pub created_utc: DateTime<Utc>,
}

impl Credential {
    pub fn new(user_id: Uuid, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            password_hash,
            password_updated_utc: now,
            mfa_secret_sealed: None,
            mfa_recovery_codes_sealed: None,
            state_code: CredentialState::Active.as_str().to_string(),
            created_utc: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state_code == CredentialState::Active.as_str()
    }

    pub fn has_mfa(&self) -> bool {
        self.mfa_secret_sealed.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct MfaEnrollResponse {
    pub otpauth_uri: String,
    pub recovery_codes: Vec<String>,
}
