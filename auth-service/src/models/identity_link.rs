//! Federated identity model - binds a `(provider, external_id)` subject
//! from an external IdP to a local principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct FederatedIdentity {
    pub federated_identity_id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub external_id: String,
    pub is_primary: bool,
    pub created_utc: DateTime<Utc>,
}

impl FederatedIdentity {
    pub fn new(user_id: Uuid, provider: String, external_id: String, is_primary: bool) -> Self {
        Self {
            federated_identity_id: Uuid::new_v4(),
            user_id,
            provider,
            external_id,
            is_primary,
            created_utc: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LinkIdentityRequest {
    pub provider: String,
    pub external_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UnlinkIdentityRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct FederatedIdentityResponse {
    pub federated_identity_id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub external_id: String,
    pub is_primary: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<FederatedIdentity> for FederatedIdentityResponse {
    fn from(f: FederatedIdentity) -> Self {
        Self {
            federated_identity_id: f.federated_identity_id,
            user_id: f.user_id,
            provider: f.provider,
            external_id: f.external_id,
            is_primary: f.is_primary,
            created_utc: f.created_utc,
        }
    }
}
