pub mod audit;
pub mod auth;
pub mod authz;
pub mod database;
pub mod jwt;

pub use audit::AuditLogger;
pub use auth::{AuthService, ClientMeta, LoginOutcome};
pub use database::Database;
pub use jwt::{Claims, TokenPair, TokenService, TokenType};
