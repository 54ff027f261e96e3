//! Invitation model - user invitations with a pre-assigned role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationState {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InvitationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationState::Pending => "pending",
            InvitationState::Accepted => "accepted",
            InvitationState::Expired => "expired",
            InvitationState::Revoked => "revoked",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role_id: Uuid,
    pub token_hash: String,
    pub state_code: String,
    pub expiry_utc: DateTime<Utc>,
    pub accepted_utc: Option<DateTime<Utc>>,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl Invitation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        email: String,
        role_id: Uuid,
        token_hash: String,
        expiry_utc: DateTime<Utc>,
        created_by_user_id: Uuid,
    ) -> Self {
        Self {
            invitation_id: Uuid::new_v4(),
            tenant_id,
            email,
            role_id,
            token_hash,
            state_code: InvitationState::Pending.as_str().to_string(),
            expiry_utc,
            accepted_utc: None,
            created_by_user_id,
            created_utc: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state_code == InvitationState::Pending.as_str() && Utc::now() < self.expiry_utc
    }

    pub fn is_accepted(&self) -> bool {
        self.state_code == InvitationState::Accepted.as_str()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry_utc
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role_id: Uuid,
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub invitation_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role_id: Uuid,
    pub state_code: String,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl From<Invitation> for InvitationResponse {
    fn from(i: Invitation) -> Self {
        Self {
            invitation_id: i.invitation_id,
            tenant_id: i.tenant_id,
            email: i.email,
            role_id: i.role_id,
            state_code: i.state_code,
            expiry_utc: i.expiry_utc,
            created_utc: i.created_utc,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub token: String,
    pub password: String,
    pub display_name: Option<String>,
}
