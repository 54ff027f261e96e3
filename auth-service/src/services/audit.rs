//! Audit event dispatch. `Critical` events (session revocation, token reuse,
//! lockouts) are written durably before the triggering handler responds;
//! everything else is logged in the background so the audit trail never adds
//! latency to the happy path.

use service_core::error::AppError;
use tracing::error;

use crate::models::AuditEvent;
use crate::services::Database;

#[derive(Clone)]
pub struct AuditService {
    db: Database,
}

impl AuditService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record an event, blocking on the write when it is security-critical.
    /// Non-critical events are dispatched to a background task so a slow
    /// audit insert never delays the response that triggered it.
    pub async fn record(&self, event: AuditEvent) -> Result<(), AppError> {
        if event.is_security_critical() {
            return self.db.insert_audit_event(&event).await;
        }

        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = db.insert_audit_event(&event).await {
                error!(error = %e, event_type = %event.event_type_code, "failed to persist audit event");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::models::{AuditEventType, AuditResult, AuditSeverity};
    use super::*;

    #[test]
    fn critical_events_are_flagged_for_synchronous_write() {
        let event = AuditEvent::new(
            None,
            None,
            AuditEventType::TokenReused,
            AuditResult::Failure,
            AuditSeverity::Critical,
            None,
            None,
            Some("refresh token reuse detected".to_string()),
            None,
            None,
            None,
        );
        assert!(event.is_security_critical());
    }

    #[test]
    fn info_events_are_not_flagged_critical() {
        let event = AuditEvent::new(
            None,
            None,
            AuditEventType::UserLogin,
            AuditResult::Success,
            AuditSeverity::Info,
            None,
            None,
            None,
            None,
            None,
            None,
        );
        assert!(!event.is_security_critical());
    }
}
