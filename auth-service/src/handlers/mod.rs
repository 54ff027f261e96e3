//! HTTP handlers for auth-service.

pub mod audit;
pub mod auth;
pub mod capabilities;
pub mod identity_links;
pub mod invitations;
pub mod jwks;
pub mod mfa;
pub mod roles;
pub mod tenants;
pub mod users;
pub mod webhooks;
