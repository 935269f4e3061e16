pub mod audit;
pub mod principal;
pub mod reset_token;
pub mod session;

pub use audit::{AuditEntry, LoginHistory, LoginStatus};
pub use principal::{Principal, PrincipalKind, PrincipalRow, PrincipalSummary};
pub use reset_token::ResetToken;
pub use session::{ActiveSession, SessionInfo};
