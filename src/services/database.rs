//! Postgres repository. All SQL lives here; services above this layer never
//! touch the pool directly.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    ActiveSession, AuditEntry, LoginHistory, LoginStatus, Principal, PrincipalKind, PrincipalRow,
    ResetToken,
};

const PRINCIPAL_COLUMNS: &str = "id, name, email, role, status, password_hash, \
     failed_login_attempts, locked_until, jwt_invalidated_at";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- principals -------------------------------------------------------

    /// Look up an email across the three principal tables in precedence
    /// order. The first hit wins.
    pub async fn find_principal_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Principal>, AppError> {
        for kind in PrincipalKind::PRECEDENCE {
            let sql = format!(
                "SELECT {} FROM {} WHERE email = $1",
                PRINCIPAL_COLUMNS,
                kind.table_name()
            );
            let row = sqlx::query_as::<_, PrincipalRow>(&sql)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

            if let Some(row) = row {
                return Ok(Some(Principal::from_row(kind, row)));
            }
        }
        Ok(None)
    }

    /// Kind-scoped email lookup, used by password reset where the token pins
    /// the account kind and precedence must not apply.
    pub async fn find_principal_by_kind_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<Principal>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE email = $1",
            PRINCIPAL_COLUMNS,
            kind.table_name()
        );
        let row = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Principal::from_row(kind, r)))
    }

    pub async fn find_principal(
        &self,
        kind: PrincipalKind,
        id: i32,
    ) -> Result<Option<Principal>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            PRINCIPAL_COLUMNS,
            kind.table_name()
        );
        let row = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Principal::from_row(kind, r)))
    }

    /// Record one failed login attempt and, when the threshold is hit, set
    /// the lock in the same statement. Returns the new attempt count.
    pub async fn register_failed_attempt(
        &self,
        kind: PrincipalKind,
        id: i32,
        max_attempts: i32,
        lock_hours: i32,
    ) -> Result<i32, AppError> {
        let sql = format!(
            "UPDATE {} \
             SET failed_login_attempts = failed_login_attempts + 1, \
                 locked_until = CASE \
                     WHEN failed_login_attempts + 1 >= $2 \
                     THEN now() + make_interval(hours => $3) \
                     ELSE locked_until \
                 END \
             WHERE id = $1 \
             RETURNING failed_login_attempts",
            kind.table_name()
        );
        let (attempts,): (i32,) = sqlx::query_as(&sql)
            .bind(id)
            .bind(max_attempts)
            .bind(lock_hours)
            .fetch_one(&self.pool)
            .await?;

        Ok(attempts)
    }

    pub async fn clear_failed_attempts(
        &self,
        kind: PrincipalKind,
        id: i32,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET failed_login_attempts = 0, locked_until = NULL WHERE id = $1",
            kind.table_name()
        );
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Set the global invalidation cutoff; tokens issued earlier stop working.
    pub async fn set_jwt_invalidated(
        &self,
        kind: PrincipalKind,
        id: i32,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET jwt_invalidated_at = $2 WHERE id = $1",
            kind.table_name()
        );
        sqlx::query(&sql).bind(id).bind(at).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn update_password_hash(
        &self,
        kind: PrincipalKind,
        id: i32,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET password_hash = $2 WHERE id = $1",
            kind.table_name()
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- sessions ---------------------------------------------------------

    pub async fn record_session(
        &self,
        user_id: i32,
        kind: PrincipalKind,
        jti: &str,
        refresh_jti: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO active_sessions \
             (user_id, user_type, jti, refresh_jti, ip_address, user_agent, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(jti)
        .bind(refresh_jti)
        .bind(ip_address)
        .bind(user_agent)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Live sessions for one principal, newest first. Expired rows are purged
    /// on the way; sessions created before `invalidated_after` are skipped.
    pub async fn list_sessions(
        &self,
        user_id: i32,
        kind: PrincipalKind,
        invalidated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActiveSession>, AppError> {
        sqlx::query("DELETE FROM active_sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;

        let sessions = sqlx::query_as::<_, ActiveSession>(
            "SELECT * FROM active_sessions \
             WHERE user_id = $1 AND user_type = $2 AND is_revoked = FALSE \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(invalidated_after)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Fetch a session by row id only if it belongs to the given principal.
    pub async fn get_session_owned(
        &self,
        session_id: i32,
        user_id: i32,
        kind: PrincipalKind,
    ) -> Result<Option<ActiveSession>, AppError> {
        let session = sqlx::query_as::<_, ActiveSession>(
            "SELECT * FROM active_sessions WHERE id = $1 AND user_id = $2 AND user_type = $3",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn find_session_by_jti(&self, jti: &str) -> Result<Option<ActiveSession>, AppError> {
        let session =
            sqlx::query_as::<_, ActiveSession>("SELECT * FROM active_sessions WHERE jti = $1")
                .bind(jti)
                .fetch_optional(&self.pool)
                .await?;

        Ok(session)
    }

    pub async fn find_session_by_refresh_jti(
        &self,
        refresh_jti: &str,
    ) -> Result<Option<ActiveSession>, AppError> {
        let session = sqlx::query_as::<_, ActiveSession>(
            "SELECT * FROM active_sessions WHERE refresh_jti = $1",
        )
        .bind(refresh_jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn mark_session_revoked(&self, session_id: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE active_sessions SET is_revoked = TRUE WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rotate a refresh session in one transaction: revoke the old row, push
    /// the old refresh jti into the revocation store, and record the new
    /// session carrying over the device metadata.
    #[allow(clippy::too_many_arguments)]
    pub async fn rotate_session(
        &self,
        old: &ActiveSession,
        new_jti: &str,
        new_refresh_jti: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE active_sessions SET is_revoked = TRUE WHERE id = $1")
            .bind(old.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO revoked_tokens (jti, user_id, user_type, expires_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (jti) DO NOTHING",
        )
        .bind(&old.refresh_jti)
        .bind(old.user_id)
        .bind(&old.user_type)
        .bind(old.expires_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO active_sessions \
             (user_id, user_type, jti, refresh_jti, ip_address, user_agent, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(old.user_id)
        .bind(&old.user_type)
        .bind(new_jti)
        .bind(new_refresh_jti)
        .bind(ip_address.or(old.ip_address.as_deref()))
        .bind(user_agent.or(old.user_agent.as_deref()))
        .bind(new_expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    // ---- revocation store -------------------------------------------------

    /// Idempotent: revoking an already-revoked jti is a no-op. The owning
    /// principal is recorded alongside for audit queries.
    pub async fn insert_revoked(
        &self,
        jti: &str,
        user_id: i32,
        kind: PrincipalKind,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO revoked_tokens (jti, user_id, user_type, expires_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(user_id)
        .bind(kind.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, AppError> {
        let (revoked,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }

    /// Drop revocation rows whose tokens have expired anyway. Returns the
    /// number of rows removed.
    pub async fn prune_revoked(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ---- password reset ---------------------------------------------------

    /// Store a reset token hash, replacing any outstanding token for the same
    /// account. One live token per account.
    pub async fn insert_reset_token(
        &self,
        token_hash: &str,
        email: &str,
        kind: PrincipalKind,
        ttl_minutes: i64,
    ) -> Result<(), AppError> {
        let expires_at = Utc::now() + Duration::minutes(ttl_minutes);
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_reset_tokens WHERE email = $1 AND user_type = $2")
            .bind(email)
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO password_reset_tokens (token_hash, email, user_type, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(token_hash)
        .bind(email)
        .bind(kind.as_str())
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn find_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<ResetToken>, AppError> {
        let token = sqlx::query_as::<_, ResetToken>(
            "SELECT id, token_hash, email, user_type, expires_at \
             FROM password_reset_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Drop reset tokens past their expiry. Returns the number of rows
    /// removed.
    pub async fn prune_reset_tokens(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Single use: delete on consumption. Returns false if the row was
    /// already gone (concurrent consumption).
    pub async fn delete_reset_token(&self, id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- history and audit ------------------------------------------------

    pub async fn insert_login_history(
        &self,
        user_id: i32,
        kind: PrincipalKind,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        status: LoginStatus,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO login_history (user_id, user_type, ip_address, user_agent, status) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(ip_address)
        .bind(user_agent)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_login_history(&self, limit: i64) -> Result<Vec<LoginHistory>, AppError> {
        let rows = sqlx::query_as::<_, LoginHistory>(
            "SELECT id, user_id, user_type, ip_address, user_agent, status, created_at \
             FROM login_history ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn insert_audit(&self, entry: &AuditEntry) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO audit_logs \
             (user_id, role, action, resource_type, resource_id, old_values, new_values, ip_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.user_id)
        .bind(&entry.role)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(entry.resource_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .bind(&entry.ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- roster scope -----------------------------------------------------

    /// True when the student belongs to any batch assigned to the coach.
    pub async fn coach_has_student(
        &self,
        coach_id: i32,
        student_id: i32,
    ) -> Result<bool, AppError> {
        let (assigned,): (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                 SELECT 1 FROM batches b \
                 JOIN batch_students bs ON bs.batch_id = b.id \
                 WHERE b.assigned_coach_id = $1 AND bs.student_id = $2)",
        )
        .bind(coach_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(assigned)
    }
}
