//! Webhook subscription and delivery models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct WebhookSubscription {
    pub webhook_id: Uuid,
    pub tenant_id: Uuid,
    pub target_url: String,
    pub signing_secret: String,
    pub event_types: Vec<String>,
    pub enabled: bool,
    pub created_utc: DateTime<Utc>,
}

impl WebhookSubscription {
    pub fn new(tenant_id: Uuid, target_url: String, signing_secret: String, event_types: Vec<String>) -> Self {
        Self {
            webhook_id: Uuid::new_v4(),
            tenant_id,
            target_url,
            signing_secret,
            event_types,
            enabled: true,
            created_utc: Utc::now(),
        }
    }

    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.enabled && (self.event_types.iter().any(|e| e == "*" || e == event_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Delivered,
    Failed,
    Abandoned,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Failed => "failed",
            DeliveryState::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct WebhookDelivery {
    pub delivery_id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub state_code: String,
    pub attempt_count: i32,
    pub next_attempt_utc: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Exponential backoff schedule: 10s, 30s, 2min, 10min, 1h. Delivery is
/// abandoned after the fifth attempt.
pub const RETRY_SCHEDULE_SECS: [i64; 5] = [10, 30, 120, 600, 3600];
pub const MAX_DELIVERY_ATTEMPTS: i32 = 5;

impl WebhookDelivery {
    pub fn new(webhook_id: Uuid, event_type: String, payload: serde_json::Value) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            webhook_id,
            event_type,
            payload,
            state_code: DeliveryState::Pending.as_str().to_string(),
            attempt_count: 0,
            next_attempt_utc: Some(Utc::now()),
            last_error: None,
            created_utc: Utc::now(),
        }
    }

    pub fn next_backoff(attempt_count: i32) -> Option<chrono::Duration> {
        let idx = usize::try_from(attempt_count).ok()?;
        RETRY_SCHEDULE_SECS.get(idx).map(|secs| chrono::Duration::seconds(*secs))
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= MAX_DELIVERY_ATTEMPTS
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub target_url: String,
    pub event_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub webhook_id: Uuid,
    pub tenant_id: Uuid,
    pub target_url: String,
    pub event_types: Vec<String>,
    pub enabled: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<WebhookSubscription> for WebhookResponse {
    fn from(w: WebhookSubscription) -> Self {
        Self {
            webhook_id: w.webhook_id,
            tenant_id: w.tenant_id,
            target_url: w.target_url,
            event_types: w.event_types,
            enabled: w.enabled,
            created_utc: w.created_utc,
        }
    }
}
