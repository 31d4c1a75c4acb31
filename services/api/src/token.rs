//! services/api/src/token.rs
//!
//! Issues and validates the signed session tokens handed out at login and
//! registration.
//!
//! Tokens are HS256 JWTs carrying `{"id": <user id>, "exp": <unix seconds>}`.
//! Nothing is stored server side: a token is valid while its signature
//! verifies and the current time is strictly before `exp`.

use bookstore_core::EntityId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: EntityId,
    pub exp: i64,
}

/// Why a token was refused. Only logged; clients always see a plain 401.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("authorization header is not of the form 'Bearer <token>'")]
    MalformedHeader,
    #[error("token could not be parsed")]
    MalformedToken,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Signs tokens with the current secret and verifies them against the current
/// and, when configured, the previous secret.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_keys: Vec<DecodingKey>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], previous_secret: Option<&[u8]>, ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Signing("secret must be non-empty".to_string()));
        }

        let mut decoding_keys = vec![DecodingKey::from_secret(secret)];
        if let Some(previous) = previous_secret.filter(|s| !s.is_empty()) {
            decoding_keys.push(DecodingKey::from_secret(previous));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_keys,
            ttl,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TokenError> {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.jwt_previous_secret.as_deref().map(str::as_bytes),
            Duration::hours(config.token_ttl_hours),
        )
    }

    pub fn issue(&self, user_id: EntityId) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: EntityId, now: DateTime<Utc>) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing("token lifetime overflows the clock".to_string()))?;
        let claims = Claims {
            id: user_id,
            exp: expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validates a raw `Authorization` header value and returns the user id.
    pub fn validate(&self, authorization: &str) -> Result<EntityId, TokenError> {
        self.validate_at(authorization, Utc::now())
    }

    pub fn validate_at(&self, authorization: &str, now: DateTime<Utc>) -> Result<EntityId, TokenError> {
        let parts: Vec<&str> = authorization.split("Bearer ").collect();
        if parts.len() != 2 {
            return Err(TokenError::MalformedHeader);
        }
        self.verify_at(parts[1], now)
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<EntityId, TokenError> {
        // Expiry is checked by hand below so the boundary is exact (no leeway)
        // and follows the supplied clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        for key in &self.decoding_keys {
            match decode::<Claims>(token, key, &validation) {
                Ok(data) => {
                    if now.timestamp() >= data.claims.exp {
                        return Err(TokenError::Expired);
                    }
                    return Ok(data.claims.id);
                }
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => continue,
                Err(e) => return Err(classify(e.kind())),
            }
        }
        Err(TokenError::BadSignature)
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::MalformedToken,
    }
}
