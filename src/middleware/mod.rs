pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, AuthPrincipal};
pub use rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter};
