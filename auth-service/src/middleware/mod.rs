pub mod auth;
pub mod rate_limit;
pub mod tenant;

pub use auth::{auth_middleware, AuthUser};
pub use rate_limit::rate_limit_middleware;
pub use tenant::{tenant_context_middleware, TenantContext};
