//! Principal model - the unified view over the owner/coach/student tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// The kind of principal. Each kind is backed by its own table; email
/// resolution on login follows the precedence owner > coach > student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Owner,
    Coach,
    Student,
}

impl PrincipalKind {
    /// Resolution order for emails that exist across kinds.
    pub const PRECEDENCE: [PrincipalKind; 3] = [
        PrincipalKind::Owner,
        PrincipalKind::Coach,
        PrincipalKind::Student,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Owner => "owner",
            PrincipalKind::Coach => "coach",
            PrincipalKind::Student => "student",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            PrincipalKind::Owner => "owners",
            PrincipalKind::Coach => "coaches",
            PrincipalKind::Student => "students",
        }
    }
}

impl std::str::FromStr for PrincipalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(PrincipalKind::Owner),
            "coach" => Ok(PrincipalKind::Coach),
            "student" => Ok(PrincipalKind::Student),
            other => Err(format!("Invalid principal kind: {}", other)),
        }
    }
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common auth columns shared by the three principal tables.
#[derive(Debug, Clone, FromRow)]
pub struct PrincipalRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub password_hash: String,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub jwt_invalidated_at: Option<DateTime<Utc>>,
}

/// An authenticated identity of a specific kind. Identity is `(kind, id)`.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i32,
    pub kind: PrincipalKind,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub password_hash: String,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub jwt_invalidated_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn from_row(kind: PrincipalKind, row: PrincipalRow) -> Self {
        Self {
            id: row.id,
            kind,
            name: row.name,
            email: row.email,
            role: row.role,
            status: row.status,
            password_hash: row.password_hash,
            failed_login_attempts: row.failed_login_attempts,
            locked_until: row.locked_until,
            jwt_invalidated_at: row.jwt_invalidated_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    /// A principal is locked while `locked_until` lies in the future.
    pub fn is_locked(&self) -> bool {
        self.locked_until.is_some_and(|until| until > Utc::now())
    }

    /// Tokens issued before this instant are rejected by the authorization
    /// gate (global invalidation from logout-all or password reset).
    pub fn token_issued_before_invalidation(&self, iat: i64) -> bool {
        self.jwt_invalidated_at
            .is_some_and(|cutoff| iat < cutoff.timestamp())
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id,
            user_type: self.kind,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// Sanitized principal view returned to clients (no hash, no lockout state).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrincipalSummary {
    pub id: i32,
    #[serde(rename = "userType")]
    pub user_type: PrincipalKind,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn principal(locked_until: Option<DateTime<Utc>>) -> Principal {
        Principal {
            id: 1,
            kind: PrincipalKind::Owner,
            name: "Test Owner".into(),
            email: "owner@test.com".into(),
            role: "owner".into(),
            status: "active".into(),
            password_hash: "$argon2id$stub".into(),
            failed_login_attempts: 0,
            locked_until,
            jwt_invalidated_at: None,
        }
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in PrincipalKind::PRECEDENCE {
            assert_eq!(kind.as_str().parse::<PrincipalKind>().unwrap(), kind);
        }
        assert!("admin".parse::<PrincipalKind>().is_err());
    }

    #[test]
    fn test_precedence_order() {
        assert_eq!(
            PrincipalKind::PRECEDENCE,
            [
                PrincipalKind::Owner,
                PrincipalKind::Coach,
                PrincipalKind::Student
            ]
        );
    }

    #[test]
    fn test_lock_expires() {
        let locked = principal(Some(Utc::now() + Duration::hours(1)));
        assert!(locked.is_locked());

        let expired = principal(Some(Utc::now() - Duration::seconds(1)));
        assert!(!expired.is_locked());

        assert!(!principal(None).is_locked());
    }

    #[test]
    fn test_global_invalidation_cutoff() {
        let mut p = principal(None);
        let now = Utc::now();
        p.jwt_invalidated_at = Some(now);

        assert!(p.token_issued_before_invalidation(now.timestamp() - 10));
        assert!(!p.token_issued_before_invalidation(now.timestamp() + 10));
    }

    #[test]
    fn test_summary_omits_sensitive_fields() {
        let p = principal(None);
        let json = serde_json::to_value(p.summary()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("locked_until").is_none());
        assert_eq!(json["userType"], "owner");
    }
}
