//! Best-effort audit logging. Writes happen off the request path; a failed
//! audit insert is logged and swallowed, never surfaced to the client.

use crate::models::AuditEntry;
use crate::services::database::Database;

#[derive(Clone)]
pub struct AuditLogger {
    db: Database,
}

impl AuditLogger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fire-and-forget. The request returns without waiting on the insert.
    pub fn emit(&self, entry: AuditEntry) {
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(err) = db.insert_audit(&entry).await {
                tracing::warn!(
                    error = %err,
                    action = %entry.action,
                    user_id = entry.user_id,
                    "Failed to write audit log entry"
                );
            }
        });
    }
}
