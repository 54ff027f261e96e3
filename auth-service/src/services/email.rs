//! Email delivery - an external collaborator interface. auth-service issues
//! verification and invitation links; it never renders end-user UI for them.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use service_core::error::AppError;
use std::time::Duration;

use crate::config::GmailConfig;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;

    async fn send_invitation_email(
        &self,
        to_email: &str,
        invitation_token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &GmailConfig) -> Result<Self, anyhow::Error> {
        let creds = Credentials::new(config.user.clone(), config.app_password.clone());

        let mailer = SmtpTransport::relay("smtp.gmail.com")?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!("Email service initialized with Gmail SMTP");

        Ok(Self {
            mailer,
            from_email: config.user.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        let email = Message::builder()
            .from(self.from_email.parse().map_err(|e| AppError::Internal(anyhow::anyhow!("{e}")))?)
            .to(to_email.parse().map_err(|e| AppError::Internal(anyhow::anyhow!("{e}")))?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::Internal(anyhow::anyhow!("{e}")))?;

        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to spawn email task: {e}")))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "email delivery failed");
                Err(AppError::Internal(anyhow::anyhow!("failed to send email: {e}")))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let link = format!("{}/auth/verify-email?token={}", base_url, verification_token);
        let html = format!("<p>Verify your email: <a href=\"{link}\">{link}</a></p>");
        let plain = format!("Verify your email: {link}");
        self.send_email(to_email, "Verify your email", &plain, &html).await
    }

    async fn send_invitation_email(
        &self,
        to_email: &str,
        invitation_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let link = format!("{}/invitations/accept?token={}", base_url, invitation_token);
        let html = format!("<p>You've been invited. Accept: <a href=\"{link}\">{link}</a></p>");
        let plain = format!("You've been invited. Accept: {link}");
        self.send_email(to_email, "You've been invited", &plain, &html).await
    }
}

/// In-memory stand-in used in tests and in environments without SMTP configured.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_verification_email(&self, to_email: &str, token: &str, _base_url: &str) -> Result<(), AppError> {
        self.sent.lock().unwrap().push((to_email.to_string(), token.to_string()));
        Ok(())
    }

    async fn send_invitation_email(&self, to_email: &str, token: &str, _base_url: &str) -> Result<(), AppError> {
        self.sent.lock().unwrap().push((to_email.to_string(), token.to_string()));
        Ok(())
    }
}
