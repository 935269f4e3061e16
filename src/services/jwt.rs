use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::AppError;
use crate::models::{Principal, PrincipalKind};

/// Token mint and verifier. Issues HS256-signed access/refresh tokens, each
/// carrying a fresh random jti.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Discriminator between the two halves of a token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both token types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal ID, stringified)
    pub sub: String,
    /// Which principal table the subject lives in
    pub user_type: PrincipalKind,
    pub email: String,
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Unique token identifier, never reused
    pub jti: String,
}

impl Claims {
    pub fn principal_id(&self) -> Result<i32, AppError> {
        self.sub.parse().map_err(|_| AppError::TokenInvalid)
    }
}

/// A freshly minted access/refresh pair plus the jtis recorded in the
/// session registry.
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_jti: String,
    pub refresh_jti: String,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    /// Mint one token of the given type with a fresh jti.
    pub fn mint(
        &self,
        principal: &Principal,
        token_type: TokenType,
    ) -> Result<(String, String), AppError> {
        let now = Utc::now();
        let exp = match token_type {
            TokenType::Access => now + Duration::minutes(self.access_token_expiry_minutes),
            TokenType::Refresh => now + Duration::days(self.refresh_token_expiry_days),
        };
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: principal.id.to_string(),
            user_type: principal.kind,
            email: principal.email.clone(),
            role: principal.role.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type,
            jti: jti.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))?;

        Ok((token, jti))
    }

    /// Mint a full access+refresh pair with independent jtis.
    pub fn mint_pair(&self, principal: &Principal) -> Result<TokenPair, AppError> {
        let (access_token, access_jti) = self.mint(principal, TokenType::Access)?;
        let (refresh_token, refresh_jti) = self.mint(principal, TokenType::Refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_jti,
            refresh_jti,
        })
    }

    /// Validate signature and expiry, then check the `type` claim.
    ///
    /// Revocation is deliberately not consulted here; callers go through the
    /// revocation store.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                    _ => AppError::TokenInvalid,
                }
            })?;

        if token_data.claims.token_type != expected {
            return Err(AppError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Access token expiry in seconds (for client info).
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    /// Refresh token lifetime; sessions are recorded with this expiry.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_expiry_days)
    }
}
