//! Webhook delivery dispatch. Deliveries are written to a durable queue at
//! the moment an event fires and picked up by `dispatch_due`, which callers
//! run on a timer. Each tick makes one attempt per due delivery; failures are
//! rescheduled onto the fixed backoff ladder in `models::webhook` rather than
//! retried in-process, so a slow or hanging target can't stall the tick.

use std::time::Duration;

use reqwest::Client;
use service_core::error::AppError;
use service_core::utils::signature::sign_payload;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::webhook::{DeliveryState, MAX_DELIVERY_ATTEMPTS};
use crate::models::{WebhookDelivery, WebhookSubscription};
use crate::services::Database;

const DELIVERY_TIMEOUT_SECS: u64 = 10;
const DISPATCH_BATCH_SIZE: i64 = 50;

#[derive(Clone)]
pub struct WebhookDispatcher {
    db: Database,
    client: Client,
}

impl WebhookDispatcher {
    pub fn new(db: Database) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()?;
        Ok(Self { db, client })
    }

    /// Queue a delivery for every webhook subscribed to `event_type`. Call
    /// this from inside the request that raised the event; the actual HTTP
    /// send happens later, off the request's critical path.
    pub async fn enqueue(&self, event_type: &str, payload: serde_json::Value) -> Result<(), AppError> {
        let subscriptions = self.db.find_webhooks_subscribed_to(event_type).await?;
        for subscription in subscriptions {
            let delivery = WebhookDelivery::new(subscription.webhook_id, event_type.to_string(), payload.clone());
            self.db.insert_webhook_delivery(&delivery).await?;
        }
        Ok(())
    }

    /// Attempt every due delivery once. Intended to be called on a fixed
    /// interval (e.g. every few seconds) by a background task in `main`.
    pub async fn dispatch_due(&self) -> Result<usize, AppError> {
        let due = self.db.find_due_webhook_deliveries(DISPATCH_BATCH_SIZE).await?;
        let attempted = due.len();

        for delivery in due {
            self.attempt_delivery(delivery).await;
        }

        Ok(attempted)
    }

    async fn attempt_delivery(&self, delivery: WebhookDelivery) {
        let webhook = match self.db.find_webhook_by_id(delivery.webhook_id).await {
            Ok(Some(w)) => w,
            Ok(None) => {
                warn!(delivery_id = %delivery.delivery_id, "webhook subscription no longer exists, abandoning delivery");
                let _ = self
                    .db
                    .update_webhook_delivery_outcome(delivery.delivery_id, DeliveryState::Abandoned.as_str(), delivery.attempt_count, None, Some("subscription deleted"))
                    .await;
                return;
            }
            Err(e) => {
                error!(error = %e, delivery_id = %delivery.delivery_id, "failed to look up webhook subscription");
                return;
            }
        };

        let result = self.send(&webhook, &delivery).await;
        let attempt_count = delivery.attempt_count + 1;

        match result {
            Ok(()) => {
                info!(delivery_id = %delivery.delivery_id, webhook_id = %webhook.webhook_id, "webhook delivered");
                let _ = self
                    .db
                    .update_webhook_delivery_outcome(delivery.delivery_id, DeliveryState::Delivered.as_str(), attempt_count, None, None)
                    .await;
            }
            Err(e) => {
                let exhausted = attempt_count >= MAX_DELIVERY_ATTEMPTS;
                let (state, next_attempt) = if exhausted {
                    (DeliveryState::Abandoned, None)
                } else {
                    let backoff = WebhookDelivery::next_backoff(delivery.attempt_count)
                        .unwrap_or_else(|| chrono::Duration::seconds(3600));
                    (DeliveryState::Failed, Some(chrono::Utc::now() + backoff))
                };

                warn!(
                    delivery_id = %delivery.delivery_id,
                    webhook_id = %webhook.webhook_id,
                    attempt = attempt_count,
                    exhausted,
                    error = %e,
                    "webhook delivery attempt failed"
                );

                let _ = self
                    .db
                    .update_webhook_delivery_outcome(delivery.delivery_id, state.as_str(), attempt_count, next_attempt, Some(&e.to_string()))
                    .await;
            }
        }
    }

    async fn send(&self, webhook: &WebhookSubscription, delivery: &WebhookDelivery) -> Result<(), anyhow::Error> {
        let body = serde_json::to_vec(&delivery.payload)?;
        let signature = sign_payload(&webhook.signing_secret, &body)?;

        let response = self
            .client
            .post(&webhook.target_url)
            .header("X-Webhook-Signature", format!("sha256={signature}"))
            .header("X-Webhook-Event", &delivery.event_type)
            .header("X-Webhook-Id", delivery.delivery_id.to_string())
            .body(body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("target responded with status {}", response.status()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_is_exhausted_after_max_attempts() {
        let mut delivery = WebhookDelivery::new(Uuid::new_v4(), "user_login".to_string(), serde_json::json!({}));
        delivery.attempt_count = MAX_DELIVERY_ATTEMPTS;
        assert!(delivery.is_exhausted());
    }
}
