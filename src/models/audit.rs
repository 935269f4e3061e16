//! Append-only trails: audit log entries and login history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Outcome recorded in login history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Success,
    Failed,
}

impl LoginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStatus::Success => "success",
            LoginStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LoginHistory {
    pub id: i32,
    pub user_id: i32,
    pub user_type: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A single audit record for a sensitive mutation.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: i32,
    pub role: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<i32>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

impl AuditEntry {
    pub fn new(
        user_id: i32,
        role: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            role: role.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            old_values: None,
            new_values: None,
            ip_address: None,
        }
    }

    pub fn resource_id(mut self, id: i32) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn ip_address(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_status_strings() {
        assert_eq!(LoginStatus::Success.as_str(), "success");
        assert_eq!(LoginStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_audit_entry_builder() {
        let entry = AuditEntry::new(3, "owner", "session_revoked", "active_session")
            .resource_id(42)
            .ip_address(Some("10.0.0.1".into()));

        assert_eq!(entry.user_id, 3);
        assert_eq!(entry.resource_id, Some(42));
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(entry.old_values.is_none());
    }
}
