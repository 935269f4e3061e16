//! Active session model - one row per issued token pair.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A recorded session. `jti` and `refresh_jti` are each globally unique and
/// never reused.
#[derive(Debug, Clone, FromRow)]
pub struct ActiveSession {
    pub id: i32,
    pub user_id: i32,
    pub user_type: String,
    pub jti: String,
    pub refresh_jti: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
}

impl ActiveSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Effective means not revoked, not expired, and not pre-dating a global
    /// invalidation for the principal (checked by the caller, which holds the
    /// principal's `jwt_invalidated_at`).
    pub fn is_effective(&self) -> bool {
        !self.is_revoked && !self.is_expired()
    }
}

/// Session info for the device listing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionInfo {
    pub id: i32,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
}

impl SessionInfo {
    pub fn from_session(session: &ActiveSession, current_jti: &str) -> Self {
        Self {
            id: session.id,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            created_at: session.created_at,
            is_current: session.jti == current_jti,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration, revoked: bool) -> ActiveSession {
        ActiveSession {
            id: 1,
            user_id: 7,
            user_type: "coach".into(),
            jti: "access-jti".into(),
            refresh_jti: "refresh-jti".into(),
            ip_address: Some("127.0.0.1".into()),
            user_agent: Some("test-agent".into()),
            created_at: Utc::now(),
            expires_at: Utc::now() + expires_in,
            is_revoked: revoked,
        }
    }

    #[test]
    fn test_effective_session() {
        assert!(session(Duration::days(7), false).is_effective());
    }

    #[test]
    fn test_revoked_session_not_effective() {
        assert!(!session(Duration::days(7), true).is_effective());
    }

    #[test]
    fn test_expired_session_not_effective() {
        assert!(!session(Duration::seconds(-1), false).is_effective());
    }

    #[test]
    fn test_current_session_flag() {
        let s = session(Duration::days(7), false);
        assert!(SessionInfo::from_session(&s, "access-jti").is_current);
        assert!(!SessionInfo::from_session(&s, "other-jti").is_current);
    }
}
