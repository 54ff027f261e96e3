//! Services layer for auth-service.
//!
//! Provides business logic services for authentication, authorization,
//! and other core functionality.

mod audit;
mod capability;
mod database;
mod email;
mod jwt;
mod notification_client;
mod permission;
pub mod redis;
mod totp;
mod webhook;

pub use audit::AuditService;
pub use capability::CapabilityService;
pub use database::Database;
pub use email::{EmailProvider, EmailService, MockEmailService};
pub use jwt::{AccessTokenClaims, Jwk, Jwks, JwtService, TokenGrant};
pub use notification_client::{NotificationClient, NotificationClientConfig};
pub use permission::is_permitted;
pub use redis::{MockBlacklist, RedisService, TokenBlacklist};
pub use totp::{TotpEnrollment, TotpService};
pub use webhook::WebhookDispatcher;
