//! Authentication flows: login with lockout, refresh rotation with theft
//! detection, logout, session management and password lifecycle.

use chrono::{DateTime, Utc};

use crate::config::SecurityConfig;
use crate::error::AppError;
use crate::middleware::auth::AuthPrincipal;
use crate::models::{
    ActiveSession, AuditEntry, LoginStatus, Principal, PrincipalKind, ResetToken, SessionInfo,
};
use crate::services::audit::AuditLogger;
use crate::services::database::Database;
use crate::services::jwt::{Claims, TokenPair, TokenService, TokenType};
use crate::utils::{
    hash_password, validate_password_complexity, verify_password, Password, PasswordHashString,
};

/// Request metadata threaded through the flows for history and audit rows.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct LoginOutcome {
    pub principal: Principal,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    tokens: TokenService,
    audit: AuditLogger,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(
        db: Database,
        tokens: TokenService,
        audit: AuditLogger,
        security: SecurityConfig,
    ) -> Self {
        Self {
            db,
            tokens,
            audit,
            security,
        }
    }

    /// Authenticate an email/password pair and open a session.
    ///
    /// Credential failures are indistinguishable to the caller regardless of
    /// whether the email exists. Lockout and disabled states are reported
    /// explicitly since the caller has proven nothing yet but the account
    /// owner needs an actionable message.
    pub async fn login(&self, email: &str, password: &str, meta: &ClientMeta) -> Result<LoginOutcome, AppError> {
        let mut principal = match self.db.find_principal_by_email(email).await? {
            Some(p) => p,
            None => return Err(AppError::InvalidCredentials),
        };

        if principal.is_locked() {
            self.record_login(&principal, meta, LoginStatus::Failed).await;
            return Err(AppError::AccountLocked);
        }

        // A lapsed lock restarts failure counting from zero; otherwise the
        // stale counter would re-lock on the very next failure.
        if principal.locked_until.is_some() {
            self.db
                .clear_failed_attempts(principal.kind, principal.id)
                .await?;
            principal.failed_login_attempts = 0;
            principal.locked_until = None;
        }

        if !principal.is_active() {
            self.record_login(&principal, meta, LoginStatus::Failed).await;
            return Err(AppError::AccountDisabled);
        }

        if !self.verify_blocking(password, &principal.password_hash).await? {
            let attempts = self
                .db
                .register_failed_attempt(
                    principal.kind,
                    principal.id,
                    self.security.lockout_max_failed_attempts,
                    self.security.lockout_duration_hours,
                )
                .await?;

            self.record_login(&principal, meta, LoginStatus::Failed).await;

            if attempts >= self.security.lockout_max_failed_attempts {
                tracing::warn!(
                    user_id = principal.id,
                    user_type = %principal.kind,
                    attempts,
                    "Account locked after repeated failed logins"
                );
                self.audit.emit(
                    AuditEntry::new(
                        principal.id,
                        principal.role.clone(),
                        "account_locked",
                        principal.kind.table_name(),
                    )
                    .resource_id(principal.id)
                    .ip_address(meta.ip_address.clone()),
                );
            }

            return Err(AppError::InvalidCredentials);
        }

        if principal.failed_login_attempts > 0 {
            self.db
                .clear_failed_attempts(principal.kind, principal.id)
                .await?;
        }

        let tokens = self.tokens.mint_pair(&principal)?;
        self.db
            .record_session(
                principal.id,
                principal.kind,
                &tokens.access_jti,
                &tokens.refresh_jti,
                meta.ip_address.as_deref(),
                meta.user_agent.as_deref(),
                Utc::now() + self.tokens.refresh_ttl(),
            )
            .await?;

        self.record_login(&principal, meta, LoginStatus::Success).await;

        tracing::info!(
            user_id = principal.id,
            user_type = %principal.kind,
            "Login successful"
        );

        Ok(LoginOutcome { principal, tokens })
    }

    /// Rotate a refresh token. The presented token is consumed; a second
    /// presentation of the same token is treated as theft and kills every
    /// session for the principal.
    pub async fn refresh(&self, refresh_token: &str, meta: &ClientMeta) -> Result<TokenPair, AppError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;

        let session = match self.db.find_session_by_refresh_jti(&claims.jti).await? {
            Some(s) => s,
            None => return Err(AppError::TokenInvalid),
        };

        if session.is_revoked || self.db.is_revoked(&claims.jti).await? {
            self.handle_refresh_reuse(&claims, &session).await?;
            return Err(AppError::TokenRevoked);
        }

        if session.is_expired() {
            return Err(AppError::TokenExpired);
        }

        let kind: PrincipalKind = session
            .user_type
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;

        let principal = self
            .db
            .find_principal(kind, session.user_id)
            .await?
            .ok_or(AppError::TokenInvalid)?;

        if !principal.is_active() {
            return Err(AppError::AccountDisabled);
        }

        if principal.token_issued_before_invalidation(claims.iat) {
            return Err(AppError::TokenRevoked);
        }

        let tokens = self.tokens.mint_pair(&principal)?;
        self.db
            .rotate_session(
                &session,
                &tokens.access_jti,
                &tokens.refresh_jti,
                meta.ip_address.as_deref(),
                meta.user_agent.as_deref(),
                Utc::now() + self.tokens.refresh_ttl(),
            )
            .await?;

        Ok(tokens)
    }

    /// A rotated-out refresh token came back. Someone other than the rightful
    /// session holder has it, so invalidate everything for the principal.
    async fn handle_refresh_reuse(
        &self,
        claims: &Claims,
        session: &ActiveSession,
    ) -> Result<(), AppError> {
        tracing::warn!(
            user_id = session.user_id,
            user_type = %session.user_type,
            jti = %claims.jti,
            "Rotated refresh token presented again, revoking all sessions"
        );

        let kind: PrincipalKind = session
            .user_type
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;

        self.db
            .set_jwt_invalidated(kind, session.user_id, Utc::now())
            .await?;

        self.audit.emit(
            AuditEntry::new(
                session.user_id,
                kind.as_str(),
                "refresh_token_reuse",
                "active_session",
            )
            .resource_id(session.id),
        );

        Ok(())
    }

    /// End the current session. The presented access jti always dies; the
    /// session row and its refresh jti are revoked alongside, so the refresh
    /// half stops working whether or not the body carried it.
    pub async fn logout(
        &self,
        actor: &AuthPrincipal,
        refresh_token: Option<&str>,
        access_exp: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.db
            .insert_revoked(&actor.jti, actor.id, actor.kind, access_exp)
            .await?;

        if let Some(session) = self.db.find_session_by_jti(&actor.jti).await? {
            self.db.mark_session_revoked(session.id).await?;
            self.db
                .insert_revoked(&session.refresh_jti, actor.id, actor.kind, session.expires_at)
                .await?;
        }

        // A supplied refresh token may belong to a pair whose session row is
        // already gone; revoke it too. An unusable token does not fail the
        // logout.
        if let Some(refresh_token) = refresh_token {
            match self.tokens.verify(refresh_token, TokenType::Refresh) {
                Ok(claims) => {
                    let refresh_exp =
                        DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
                    self.db
                        .insert_revoked(&claims.jti, actor.id, actor.kind, refresh_exp)
                        .await?;
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Ignoring unusable refresh token on logout");
                }
            }
        }

        tracing::info!(user_id = actor.id, user_type = %actor.kind, "Logged out");
        Ok(())
    }

    /// Invalidate every token issued to the principal before this instant.
    pub async fn logout_all(&self, actor: &AuthPrincipal) -> Result<(), AppError> {
        self.db
            .set_jwt_invalidated(actor.kind, actor.id, Utc::now())
            .await?;

        self.audit.emit(
            AuditEntry::new(actor.id, actor.role.clone(), "logout_all", actor.kind.table_name())
                .resource_id(actor.id),
        );

        tracing::info!(user_id = actor.id, user_type = %actor.kind, "All sessions revoked");
        Ok(())
    }

    /// Device listing: live sessions for the caller, the one matching the
    /// presented access token flagged as current.
    pub async fn list_sessions(&self, actor: &AuthPrincipal) -> Result<Vec<SessionInfo>, AppError> {
        let cutoff = self
            .db
            .find_principal(actor.kind, actor.id)
            .await?
            .and_then(|p| p.jwt_invalidated_at);

        let sessions = self.db.list_sessions(actor.id, actor.kind, cutoff).await?;

        Ok(sessions
            .iter()
            .map(|s| SessionInfo::from_session(s, &actor.jti))
            .collect())
    }

    /// Revoke one of the caller's sessions by row id. Idempotent; revoking an
    /// already-revoked session succeeds quietly.
    pub async fn revoke_session(
        &self,
        actor: &AuthPrincipal,
        session_id: i32,
        meta: &ClientMeta,
    ) -> Result<(), AppError> {
        let session = self
            .db
            .get_session_owned(session_id, actor.id, actor.kind)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if !session.is_revoked {
            self.db.mark_session_revoked(session.id).await?;
            self.db
                .insert_revoked(&session.jti, actor.id, actor.kind, session.expires_at)
                .await?;
            self.db
                .insert_revoked(&session.refresh_jti, actor.id, actor.kind, session.expires_at)
                .await?;

            self.audit.emit(
                AuditEntry::new(actor.id, actor.role.clone(), "session_revoked", "active_session")
                    .resource_id(session.id)
                    .ip_address(meta.ip_address.clone()),
            );
        }

        Ok(())
    }

    /// Start a password reset. The response never reveals whether the email
    /// exists; when it does, a single-use token is stored hashed and handed
    /// to the delivery layer.
    pub async fn forgot_password(&self, email: &str, meta: &ClientMeta) -> Result<(), AppError> {
        let principal = match self.db.find_principal_by_email(email).await? {
            Some(p) if p.is_active() => p,
            _ => return Ok(()),
        };

        let raw = ResetToken::generate_raw();
        self.db
            .insert_reset_token(
                &ResetToken::hash_raw(&raw),
                &principal.email,
                principal.kind,
                self.security.reset_token_expiry_minutes,
            )
            .await?;

        // Delivery is out-of-band; only the operator-facing log sees the raw
        // token, and only at debug level.
        tracing::debug!(
            user_id = principal.id,
            user_type = %principal.kind,
            reset_token = %raw,
            "Password reset token issued"
        );

        self.audit.emit(
            AuditEntry::new(
                principal.id,
                principal.role.clone(),
                "password_reset_requested",
                principal.kind.table_name(),
            )
            .resource_id(principal.id)
            .ip_address(meta.ip_address.clone()),
        );

        Ok(())
    }

    /// Complete a password reset with a previously issued token. Consumes the
    /// token and invalidates every outstanding session.
    pub async fn reset_password(
        &self,
        email: &str,
        kind: PrincipalKind,
        raw_token: &str,
        new_password: &str,
        meta: &ClientMeta,
    ) -> Result<(), AppError> {
        validate_password_complexity(new_password)?;

        let token = self
            .db
            .find_reset_token(&ResetToken::hash_raw(raw_token))
            .await?
            .ok_or(AppError::BadRequest("Invalid or expired reset token".to_string()))?;

        // Expired rows are deleted as soon as they are encountered.
        if token.is_expired() {
            self.db.delete_reset_token(token.id).await?;
            return Err(AppError::BadRequest(
                "Invalid or expired reset token".to_string(),
            ));
        }

        if !token.matches(email, kind.as_str()) {
            return Err(AppError::BadRequest(
                "Invalid or expired reset token".to_string(),
            ));
        }

        // Single use; a concurrent consumer losing this race gets the same
        // invalid-token error.
        if !self.db.delete_reset_token(token.id).await? {
            return Err(AppError::BadRequest(
                "Invalid or expired reset token".to_string(),
            ));
        }

        let principal = self
            .db
            .find_principal_by_kind_email(kind, email)
            .await?
            .ok_or(AppError::BadRequest("Invalid or expired reset token".to_string()))?;

        let hash = self.hash_blocking(new_password).await?;
        self.db
            .update_password_hash(principal.kind, principal.id, hash.as_str())
            .await?;
        self.db
            .clear_failed_attempts(principal.kind, principal.id)
            .await?;
        self.db
            .set_jwt_invalidated(principal.kind, principal.id, Utc::now())
            .await?;

        self.audit.emit(
            AuditEntry::new(
                principal.id,
                principal.role.clone(),
                "password_reset",
                principal.kind.table_name(),
            )
            .resource_id(principal.id)
            .ip_address(meta.ip_address.clone()),
        );

        tracing::info!(
            user_id = principal.id,
            user_type = %principal.kind,
            "Password reset completed"
        );

        Ok(())
    }

    /// Authenticated password change. Requires the current password and, on
    /// success, invalidates every session including the caller's.
    pub async fn change_password(
        &self,
        actor: &AuthPrincipal,
        old_password: &str,
        new_password: &str,
        meta: &ClientMeta,
    ) -> Result<(), AppError> {
        let principal = self
            .db
            .find_principal(actor.kind, actor.id)
            .await?
            .ok_or(AppError::Unauthorized("Account no longer exists".to_string()))?;

        // A bad old password is a request problem, not a credential failure;
        // the caller is already authenticated.
        if !self.verify_blocking(old_password, &principal.password_hash).await? {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        validate_password_complexity(new_password)?;

        let hash = self.hash_blocking(new_password).await?;
        self.db
            .update_password_hash(principal.kind, principal.id, hash.as_str())
            .await?;
        self.db
            .set_jwt_invalidated(principal.kind, principal.id, Utc::now())
            .await?;

        self.audit.emit(
            AuditEntry::new(
                principal.id,
                principal.role.clone(),
                "password_changed",
                principal.kind.table_name(),
            )
            .resource_id(principal.id)
            .ip_address(meta.ip_address.clone()),
        );

        tracing::info!(
            user_id = principal.id,
            user_type = %principal.kind,
            "Password changed"
        );

        Ok(())
    }

    // Argon2 is CPU-bound; keep it off the async worker threads.

    async fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = Password::new(password.to_string());
        let hash = PasswordHashString::new(hash.to_string());

        tokio::task::spawn_blocking(move || verify_password(&password, &hash).is_ok())
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Verification task failed: {}", e)))
    }

    async fn hash_blocking(&self, password: &str) -> Result<PasswordHashString, AppError> {
        let password = Password::new(password.to_string());

        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
            .map_err(AppError::Internal)
    }

    async fn record_login(&self, principal: &Principal, meta: &ClientMeta, status: LoginStatus) {
        if let Err(err) = self
            .db
            .insert_login_history(
                principal.id,
                principal.kind,
                meta.ip_address.as_deref(),
                meta.user_agent.as_deref(),
                status,
            )
            .await
        {
            tracing::warn!(error = %err, "Failed to record login history");
        }
    }
}
