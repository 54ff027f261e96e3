//! Refresh session model - one row per issued refresh token, chained by
//! `parent_session_id` so that reuse of a rotated-out token is detectable.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct RefreshSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub parent_session_id: Option<Uuid>,
    pub token_hash_text: String,
    pub mfa_verified: bool,
    /// Whether the login that started this chain requested `remember_me`;
    /// carried through rotation so a remembered session keeps its extended
    /// lifetime across refreshes instead of reverting to the default TTL.
    pub remember_me: bool,
    pub expiry_utc: DateTime<Utc>,
    pub rotated_utc: Option<DateTime<Utc>>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl RefreshSession {
    pub fn new_root(user_id: Uuid, token_hash: String, mfa_verified: bool, remember_me: bool, expiry_days: i64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            parent_session_id: None,
            token_hash_text: token_hash,
            mfa_verified,
            remember_me,
            expiry_utc: Utc::now() + Duration::days(expiry_days),
            rotated_utc: None,
            revoked_utc: None,
            created_utc: Utc::now(),
        }
    }

    pub fn rotate_from(parent: &RefreshSession, token_hash: String, expiry_days: i64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: parent.user_id,
            parent_session_id: Some(parent.session_id),
            token_hash_text: token_hash,
            mfa_verified: parent.mfa_verified,
            remember_me: parent.remember_me,
            expiry_utc: Utc::now() + Duration::days(expiry_days),
            rotated_utc: None,
            revoked_utc: None,
            created_utc: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.revoked_utc.is_none() && self.rotated_utc.is_none() && self.expiry_utc > Utc::now()
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }

    pub fn is_rotated(&self) -> bool {
        self.rotated_utc.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub is_current: bool,
}

impl From<RefreshSession> for SessionInfo {
    fn from(s: RefreshSession) -> Self {
        Self {
            session_id: s.session_id,
            created_utc: s.created_utc,
            expiry_utc: s.expiry_utc,
            is_current: false,
        }
    }
}
